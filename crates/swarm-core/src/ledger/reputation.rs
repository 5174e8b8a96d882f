//! Reputation
//!
//! Scores derived from wallets: plain reward or wealth, or an aggregate of
//! the rolling settlement history under one of four weightings.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How an agent's standing is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReputationMetric {
    Reward,
    Wealth,
    /// Count of winning minus losing settlements
    SignOnly,
    /// Sum of settlement outcomes
    #[default]
    Difference,
    /// Outcomes weighted linearly towards the most recent
    RecencyWeighted,
    /// Outcomes discounted geometrically by their age
    AgeDecayed,
}

impl ReputationMetric {
    pub fn is_history(&self) -> bool {
        !matches!(self, ReputationMetric::Reward | ReputationMetric::Wealth)
    }
}

/// Aggregates a settlement history (oldest first) into a single score.
///
/// `Reward` and `Wealth` are not history metrics and fall back to the raw sum.
pub fn history_score(history: &VecDeque<f64>, metric: ReputationMetric, age_decay: f64) -> f64 {
    let n = history.len();
    if n == 0 {
        return 0.0;
    }
    match metric {
        ReputationMetric::SignOnly => history
            .iter()
            .map(|x| if *x > 0.0 { 1.0 } else if *x < 0.0 { -1.0 } else { 0.0 })
            .sum(),
        ReputationMetric::RecencyWeighted => history
            .iter()
            .enumerate()
            .map(|(i, x)| x * (i + 1) as f64 / n as f64)
            .sum(),
        ReputationMetric::AgeDecayed => history
            .iter()
            .enumerate()
            .map(|(i, x)| x * age_decay.powi((n - 1 - i) as i32))
            .sum(),
        ReputationMetric::Difference | ReputationMetric::Reward | ReputationMetric::Wealth => {
            history.iter().sum()
        }
    }
}

/// Maps history reputation to an escrow multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StakeSchedule {
    pub enabled: bool,
    pub metric: ReputationMetric,
    pub slope: f64,
    pub floor: f64,
    pub ceiling: f64,
    pub age_decay: f64,
}

impl Default for StakeSchedule {
    fn default() -> Self {
        Self {
            enabled: true,
            metric: ReputationMetric::Difference,
            slope: 1.0,
            floor: 1.0,
            ceiling: 3.0,
            age_decay: 0.9,
        }
    }
}

impl StakeSchedule {
    /// Multiplier for a given history score; agents in good standing stake the base amount.
    pub fn coefficient(&self, score: f64) -> f64 {
        if !self.enabled || score >= 0.0 {
            return 1.0;
        }
        let raw = 1.0 + self.slope * score.abs();
        raw.clamp(self.floor, self.ceiling.max(self.floor))
    }

    /// Multiplier for an agent with the given settlement history.
    pub fn coefficient_for(&self, history: &VecDeque<f64>) -> f64 {
        let metric = if self.metric.is_history() {
            self.metric
        } else {
            ReputationMetric::Difference
        };
        self.coefficient(history_score(history, metric, self.age_decay))
    }
}
