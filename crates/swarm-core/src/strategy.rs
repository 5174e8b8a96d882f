//! Combine Strategies
//!
//! Fusion of an agent's own belief with a bought one. The bought belief is
//! always composed with the buyer to seller offset first.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use swarm_events::Location;

use crate::navigation::Target;

/// Configured fusion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    WeightedAverageAge,
    ReputationWeighted,
    RunningReputationWeighted,
}

impl StrategyKind {
    /// True for rules that weigh by reputation; they fall back to age
    /// weighting for buyers without ledger access.
    pub fn uses_reputation(&self) -> bool {
        !matches!(self, StrategyKind::WeightedAverageAge)
    }
}

/// Reputations of the two parties, when the behavior may see them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reputations {
    pub mine: f64,
    pub seller: f64,
}

/// Per-agent fusion state
#[derive(Debug, Clone, PartialEq)]
pub enum CombineStrategy {
    WeightedAverageAge,
    ReputationWeighted,
    /// Keeps the accumulated weight behind each belief instead of its history
    RunningReputationWeighted { weights: [f64; 2] },
}

impl CombineStrategy {
    pub fn from_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::WeightedAverageAge => CombineStrategy::WeightedAverageAge,
            StrategyKind::ReputationWeighted => CombineStrategy::ReputationWeighted,
            StrategyKind::RunningReputationWeighted => {
                CombineStrategy::RunningReputationWeighted { weights: [0.0; 2] }
            }
        }
    }

    /// Fuses `bought` (still in the seller-relative position) into `mine`.
    pub fn combine(
        &mut self,
        location: Location,
        mine: &Target,
        bought: &Target,
        offset: DVec2,
        reputations: Option<Reputations>,
    ) -> Target {
        let composed = bought.translated(offset);
        match (self, reputations) {
            (CombineStrategy::WeightedAverageAge, _) | (_, None) => weighted_average_age(mine, &composed),
            (CombineStrategy::ReputationWeighted, Some(reps)) => {
                reputation_weighted(mine, &composed, reps.mine, reps.seller)
            }
            (CombineStrategy::RunningReputationWeighted { weights }, Some(reps)) => {
                let slot = &mut weights[location.index()];
                let incoming = positive_weight(reps.seller);
                if !mine.valid {
                    *slot = incoming;
                    return fresh(&composed);
                }
                let accumulated = if *slot > 0.0 {
                    *slot
                } else {
                    positive_weight(reps.mine)
                };
                let total = accumulated + incoming;
                *slot = total;
                Target {
                    relative_position: (mine.relative_position * accumulated
                        + composed.relative_position * incoming)
                        / total,
                    age: mine.age.min(composed.age),
                    valid: true,
                }
            }
        }
    }
}

fn fresh(composed: &Target) -> Target {
    Target {
        valid: true,
        ..*composed
    }
}

fn positive_weight(reputation: f64) -> f64 {
    reputation.max(0.0) + 1e-3
}

/// Average weighted against age: the older belief counts for less.
pub fn weighted_average_age(mine: &Target, composed: &Target) -> Target {
    if !mine.valid {
        return fresh(composed);
    }
    let mine_age = f64::from(mine.age);
    let their_age = f64::from(composed.age);
    let own_weight = (their_age + 1.0) / (mine_age + their_age + 2.0);
    Target {
        relative_position: mine.relative_position * own_weight
            + composed.relative_position * (1.0 - own_weight),
        age: mine.age.min(composed.age),
        valid: true,
    }
}

/// Average weighted by the two parties' relative reputation.
pub fn reputation_weighted(mine: &Target, composed: &Target, my_reputation: f64, seller_reputation: f64) -> Target {
    if !mine.valid {
        return fresh(composed);
    }
    let own = positive_weight(my_reputation);
    let theirs = positive_weight(seller_reputation);
    let own_weight = own / (own + theirs);
    Target {
        relative_position: mine.relative_position * own_weight
            + composed.relative_position * (1.0 - own_weight),
        age: mine.age.min(composed.age),
        valid: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::assert_close;

    #[test]
    fn test_invalid_belief_is_replaced() {
        let mut strategy = CombineStrategy::WeightedAverageAge;
        let mine = Target::unknown();
        let bought = Target::new(DVec2::new(1.0, 1.0)).with_age(3);
        let fused = strategy.combine(Location::Food, &mine, &bought, DVec2::new(4.0, 0.0), None);
        assert_close(fused.relative_position, DVec2::new(5.0, 1.0));
        assert_eq!(fused.age, 3);
        assert!(fused.valid);
    }

    #[test]
    fn test_older_belief_gets_less_weight() {
        let mine = Target::new(DVec2::new(0.0, 0.0)).with_age(8);
        let composed = Target::new(DVec2::new(10.0, 0.0)).with_age(0);
        let fused = weighted_average_age(&mine, &composed);
        // own weight (0 + 1) / (8 + 0 + 2) = 0.1
        assert_close(fused.relative_position, DVec2::new(9.0, 0.0));
        assert_eq!(fused.age, 0);
    }

    #[test]
    fn test_equal_ages_average_evenly() {
        let mine = Target::new(DVec2::new(2.0, 0.0)).with_age(4);
        let composed = Target::new(DVec2::new(4.0, 2.0)).with_age(4);
        assert_close(weighted_average_age(&mine, &composed).relative_position, DVec2::new(3.0, 1.0));
    }

    #[test]
    fn test_reputation_weighting_favors_richer_party() {
        let mine = Target::new(DVec2::ZERO);
        let composed = Target::new(DVec2::new(10.0, 0.0));
        let fused = reputation_weighted(&mine, &composed, 1.0, 3.0);
        assert!(fused.relative_position.x > 7.0 && fused.relative_position.x < 7.6);
    }

    #[test]
    fn test_reputation_strategy_falls_back_to_age_without_ledger() {
        let mut strategy = CombineStrategy::ReputationWeighted;
        let mine = Target::new(DVec2::ZERO).with_age(8);
        let bought = Target::new(DVec2::new(10.0, 0.0));
        let fused = strategy.combine(Location::Nest, &mine, &bought, DVec2::ZERO, None);
        assert_close(fused.relative_position, DVec2::new(9.0, 0.0));
    }

    #[test]
    fn test_running_weights_accumulate() {
        let mut strategy = CombineStrategy::from_kind(StrategyKind::RunningReputationWeighted);
        let reps = Reputations {
            mine: 1.0,
            seller: 1.0,
        };
        let first = strategy.combine(
            Location::Nest,
            &Target::unknown(),
            &Target::new(DVec2::new(10.0, 0.0)),
            DVec2::ZERO,
            Some(reps),
        );
        assert_close(first.relative_position, DVec2::new(10.0, 0.0));

        let second = strategy.combine(Location::Nest, &first, &Target::new(DVec2::ZERO), DVec2::ZERO, Some(reps));
        assert_close(second.relative_position, DVec2::new(5.0, 0.0));

        // Two equal contributions are now behind the belief, so a third pulls it by a third
        let third = strategy.combine(
            Location::Nest,
            &second,
            &Target::new(DVec2::new(20.0, 0.0)),
            DVec2::ZERO,
            Some(reps),
        );
        assert_close(third.relative_position, DVec2::new(10.0, 0.0));
        match strategy {
            CombineStrategy::RunningReputationWeighted { weights } => {
                assert!((weights[Location::Nest.index()] - 3.003).abs() < 1e-9);
                assert_eq!(weights[Location::Food.index()], 0.0);
            }
            _ => panic!("strategy changed kind"),
        }
    }
}
