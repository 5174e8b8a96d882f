//! Motion Model
//!
//! Heading noise, per-agent drift and Lévy-walk exploration draws.
//!
//! Agents dead-reckon with the displacement they *intend*; the world moves
//! them by the noisy one. The gap between the two is what makes beliefs
//! drift away from the truth.

use bevy_ecs::prelude::*;
use rand::Rng;
use rand_distr::{Cauchy, Distribution, Normal, Pareto};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::signed_turn;

/// Per-move angular noise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoiseModel {
    #[default]
    None,
    Uniform,
    Gaussian,
}

/// Noise parameters (the `[agent.noise]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub model: NoiseModel,
    /// Mean of the per-agent systematic heading bias, degrees
    pub drift_mean: f64,
    pub drift_sd: f64,
    /// Spread of the per-move heading noise, degrees
    pub step_sd: f64,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            model: NoiseModel::Gaussian,
            drift_mean: 0.0,
            drift_sd: 2.0,
            step_sd: 5.0,
        }
    }
}

/// Exploration parameters (the `[agent.exploration]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationSettings {
    /// Pareto shape of straight-run lengths
    pub levy_exponent: f64,
    pub max_levy_steps: u32,
    /// Wrapped-Cauchy concentration of turn angles, in [0, 1)
    pub crw_factor: f64,
}

impl Default for ExplorationSettings {
    fn default() -> Self {
        Self {
            levy_exponent: 1.5,
            max_levy_steps: 50,
            crw_factor: 0.9,
        }
    }
}

impl ExplorationSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levy_exponent <= 0.0 {
            return Err(ConfigError::Invalid(
                "agent.exploration.levy_exponent must be positive".to_string(),
            ));
        }
        if self.max_levy_steps == 0 {
            return Err(ConfigError::Invalid(
                "agent.exploration.max_levy_steps must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.crw_factor) {
            return Err(ConfigError::Invalid(
                "agent.exploration.crw_factor must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resource: the run's noise and exploration draws
#[derive(Resource, Debug, Clone, Default)]
pub struct MotionModel {
    pub noise: NoiseSettings,
    pub exploration: ExplorationSettings,
}

impl MotionModel {
    pub fn new(noise: NoiseSettings, exploration: ExplorationSettings) -> Self {
        Self { noise, exploration }
    }

    /// Systematic heading bias for a newly spawned agent.
    pub fn sample_drift(&self, rng: &mut impl Rng) -> f64 {
        if self.noise.model == NoiseModel::None {
            return 0.0;
        }
        Normal::new(self.noise.drift_mean, self.noise.drift_sd)
            .map(|normal| normal.sample(rng))
            .unwrap_or(self.noise.drift_mean)
    }

    /// Angle by which the world rotates an agent's intended displacement this move.
    pub fn heading_noise(&self, drift: f64, rng: &mut impl Rng) -> f64 {
        let spread = self.noise.step_sd.abs();
        match self.noise.model {
            NoiseModel::None => 0.0,
            NoiseModel::Uniform if spread > 0.0 => drift + rng.gen_range(-spread..spread),
            NoiseModel::Gaussian => {
                drift
                    + Normal::new(0.0, spread)
                        .map(|normal| normal.sample(rng))
                        .unwrap_or(0.0)
            }
            NoiseModel::Uniform => drift,
        }
    }

    /// Turn taken at the start of an exploration run, in (-180, 180].
    pub fn sample_turn(&self, rng: &mut impl Rng) -> f64 {
        let rho = self.exploration.crw_factor;
        if rho >= 1.0 {
            return 0.0;
        }
        if rho <= 0.0 {
            return signed_turn(0.0, rng.gen_range(0.0..360.0));
        }
        let scale = -rho.ln();
        let radians = Cauchy::new(0.0, scale)
            .map(|cauchy| cauchy.sample(rng))
            .unwrap_or(0.0);
        signed_turn(0.0, radians.to_degrees())
    }

    /// Length of the next straight exploration run, in ticks.
    pub fn sample_levy_steps(&self, rng: &mut impl Rng) -> u32 {
        let max = self.exploration.max_levy_steps.max(1);
        let steps = Pareto::new(1.0, self.exploration.levy_exponent)
            .map(|pareto| pareto.sample(rng))
            .unwrap_or(1.0);
        if !steps.is_finite() {
            return max;
        }
        (steps.ceil() as u32).clamp(1, max)
    }
}
