//! Behaviors
//!
//! An agent's decision layer: a shared foraging template, a buying policy
//! and a selling policy, composed per behavior class.
//!
//! Classes form a closed registry resolved when the configuration loads.

pub mod buying;
pub mod pending;
pub mod selling;
pub mod template;

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use swarm_events::Location;

use crate::error::ConfigError;
use crate::ledger::ReputationMetric;
use crate::market::session::{CommunicationSession, InformationMode};
use crate::motion::MotionModel;
use crate::navigation::{NavigationTable, Target};
use crate::strategy::{CombineStrategy, StrategyKind};

pub use buying::{
    CarefulBuying, Flow, NaiveBuying, PurchasePolicy, Quote, ReputationRankingBuying,
    ReputationThresholdBuying, ScepticalBuying, WealthWeightedBuying,
};
pub use pending::{disagreement, PendingPool};
pub use selling::SalePolicy;
pub use template::{ForagingState, ForagingTemplate, Step, Surroundings};

/// Every behavior a configuration may name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BehaviorClass {
    NaiveBehavior,
    SaboteurBehavior,
    FreeRiderBehavior,
    CarefulBehavior,
    SaboteurCarefulBehavior,
    ScepticalBehavior,
    ScaboteurBehavior,
    FreeRiderScepticalBehavior,
    ReputationThresholdBehavior,
    SaboteurReputationThresholdBehavior,
    ReputationRankingBehavior,
    SaboteurReputationRankingBehavior,
    WealthWeightedBehavior,
    SaboteurWealthWeightedBehavior,
}

/// Buying half of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuyingKind {
    Naive,
    Careful,
    Sceptical,
    ReputationThreshold,
    ReputationRanking,
    WealthWeighted,
}

/// Selling half of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SellingKind {
    Honest,
    Saboteur,
    FreeRider,
}

impl BehaviorClass {
    pub const ALL: [BehaviorClass; 14] = [
        BehaviorClass::NaiveBehavior,
        BehaviorClass::SaboteurBehavior,
        BehaviorClass::FreeRiderBehavior,
        BehaviorClass::CarefulBehavior,
        BehaviorClass::SaboteurCarefulBehavior,
        BehaviorClass::ScepticalBehavior,
        BehaviorClass::ScaboteurBehavior,
        BehaviorClass::FreeRiderScepticalBehavior,
        BehaviorClass::ReputationThresholdBehavior,
        BehaviorClass::SaboteurReputationThresholdBehavior,
        BehaviorClass::ReputationRankingBehavior,
        BehaviorClass::SaboteurReputationRankingBehavior,
        BehaviorClass::WealthWeightedBehavior,
        BehaviorClass::SaboteurWealthWeightedBehavior,
    ];

    fn parts(&self) -> (BuyingKind, SellingKind) {
        use BehaviorClass::*;
        match self {
            NaiveBehavior => (BuyingKind::Naive, SellingKind::Honest),
            SaboteurBehavior => (BuyingKind::Naive, SellingKind::Saboteur),
            FreeRiderBehavior => (BuyingKind::Naive, SellingKind::FreeRider),
            CarefulBehavior => (BuyingKind::Careful, SellingKind::Honest),
            SaboteurCarefulBehavior => (BuyingKind::Careful, SellingKind::Saboteur),
            ScepticalBehavior => (BuyingKind::Sceptical, SellingKind::Honest),
            ScaboteurBehavior => (BuyingKind::Sceptical, SellingKind::Saboteur),
            FreeRiderScepticalBehavior => (BuyingKind::Sceptical, SellingKind::FreeRider),
            ReputationThresholdBehavior => (BuyingKind::ReputationThreshold, SellingKind::Honest),
            SaboteurReputationThresholdBehavior => {
                (BuyingKind::ReputationThreshold, SellingKind::Saboteur)
            }
            ReputationRankingBehavior => (BuyingKind::ReputationRanking, SellingKind::Honest),
            SaboteurReputationRankingBehavior => (BuyingKind::ReputationRanking, SellingKind::Saboteur),
            WealthWeightedBehavior => (BuyingKind::WealthWeighted, SellingKind::Honest),
            SaboteurWealthWeightedBehavior => (BuyingKind::WealthWeighted, SellingKind::Saboteur),
        }
    }

    /// True for classes that sell honest information.
    pub fn is_honest(&self) -> bool {
        self.parts().1 == SellingKind::Honest
    }

    /// Whether the class's buyers may read the ledger.
    pub fn information_mode(&self) -> InformationMode {
        match self.parts().0 {
            BuyingKind::ReputationThreshold | BuyingKind::ReputationRanking | BuyingKind::WealthWeighted => {
                InformationMode::Global
            }
            BuyingKind::Naive | BuyingKind::Careful | BuyingKind::Sceptical => InformationMode::Local,
        }
    }

    pub fn name(&self) -> &'static str {
        use BehaviorClass::*;
        match self {
            NaiveBehavior => "NaiveBehavior",
            SaboteurBehavior => "SaboteurBehavior",
            FreeRiderBehavior => "FreeRiderBehavior",
            CarefulBehavior => "CarefulBehavior",
            SaboteurCarefulBehavior => "SaboteurCarefulBehavior",
            ScepticalBehavior => "ScepticalBehavior",
            ScaboteurBehavior => "ScaboteurBehavior",
            FreeRiderScepticalBehavior => "FreeRiderScepticalBehavior",
            ReputationThresholdBehavior => "ReputationThresholdBehavior",
            SaboteurReputationThresholdBehavior => "SaboteurReputationThresholdBehavior",
            ReputationRankingBehavior => "ReputationRankingBehavior",
            SaboteurReputationRankingBehavior => "SaboteurReputationRankingBehavior",
            WealthWeightedBehavior => "WealthWeightedBehavior",
            SaboteurWealthWeightedBehavior => "SaboteurWealthWeightedBehavior",
        }
    }
}

impl fmt::Display for BehaviorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional per-class knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorParams {
    /// Degrees a saboteur rotates the information it sells
    pub rotation_angle: f64,
    pub scepticism_threshold: f64,
    pub pending_capacity: usize,
    pub required_peers: usize,
    pub batch_size: usize,
    /// Fraction of the ledger a seller must rank within
    pub rank_fraction: f64,
    /// Falls back to the payment metric when unset
    pub reputation_metric: Option<ReputationMetric>,
}

impl Default for BehaviorParams {
    fn default() -> Self {
        Self {
            rotation_angle: 90.0,
            scepticism_threshold: 0.25,
            pending_capacity: 4,
            required_peers: 2,
            batch_size: 3,
            rank_fraction: 0.5,
            reputation_metric: None,
        }
    }
}

/// One `[[behaviors]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSpec {
    pub class_name: BehaviorClass,
    pub population_size: usize,
    #[serde(default)]
    pub parameters: BehaviorParams,
}

impl BehaviorSpec {
    pub fn new(class_name: BehaviorClass, population_size: usize) -> Self {
        Self {
            class_name,
            population_size,
            parameters: BehaviorParams::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.parameters;
        if p.scepticism_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "{}: scepticism_threshold must be positive",
                self.class_name
            )));
        }
        if p.pending_capacity == 0 || p.batch_size == 0 {
            return Err(ConfigError::Invalid(format!(
                "{}: pending_capacity and batch_size must be at least 1",
                self.class_name
            )));
        }
        if p.required_peers < 2 {
            return Err(ConfigError::Invalid(format!(
                "{}: required_peers must be at least 2",
                self.class_name
            )));
        }
        if !(p.rank_fraction > 0.0 && p.rank_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "{}: rank_fraction must be in (0, 1]",
                self.class_name
            )));
        }
        Ok(())
    }
}

/// Component: the decision layer of one agent
#[derive(Component, Debug)]
pub struct Behavior {
    class: BehaviorClass,
    template: ForagingTemplate,
    purchase: Box<dyn PurchasePolicy>,
    sale: SalePolicy,
    strategy: CombineStrategy,
}

impl Behavior {
    pub fn new(class: BehaviorClass, params: &BehaviorParams, strategy: StrategyKind) -> Self {
        let (buying, selling) = class.parts();
        let purchase: Box<dyn PurchasePolicy> = match buying {
            BuyingKind::Naive => Box::new(NaiveBuying),
            BuyingKind::Careful => Box::new(CarefulBuying::new(params.batch_size)),
            BuyingKind::Sceptical => Box::new(ScepticalBuying::new(
                params.scepticism_threshold,
                params.pending_capacity,
                params.required_peers,
            )),
            BuyingKind::ReputationThreshold => Box::new(ReputationThresholdBuying::new(
                params.rank_fraction,
                params.reputation_metric,
            )),
            BuyingKind::ReputationRanking => {
                Box::new(ReputationRankingBuying::new(params.reputation_metric))
            }
            BuyingKind::WealthWeighted => Box::new(WealthWeightedBuying),
        };
        let sale = match selling {
            SellingKind::Honest => SalePolicy::Honest,
            SellingKind::Saboteur => SalePolicy::Saboteur {
                rotation: params.rotation_angle,
            },
            SellingKind::FreeRider => SalePolicy::FreeRider,
        };
        Self {
            class,
            template: ForagingTemplate::new(),
            purchase,
            sale,
            strategy: CombineStrategy::from_kind(strategy),
        }
    }

    pub fn from_spec(spec: &BehaviorSpec, strategy: StrategyKind) -> Self {
        Self::new(spec.class_name, &spec.parameters, strategy)
    }

    pub fn class(&self) -> BehaviorClass {
        self.class
    }

    pub fn state(&self) -> ForagingState {
        self.template.state()
    }

    pub fn sale_policy(&self) -> SalePolicy {
        self.sale
    }

    pub fn information_mode(&self) -> InformationMode {
        self.purchase.information_mode()
    }

    /// What this agent would sell about `location`.
    pub fn decide_sale(&self, navigation: &NavigationTable, location: Location) -> Option<Target> {
        self.sale.sell_info(navigation, location)
    }

    /// Runs the buying policy for both locations against a copy of the table.
    ///
    /// The returned table is staged until the movement phase.
    pub fn decide_purchase(
        &mut self,
        navigation: &NavigationTable,
        session: &mut CommunicationSession<'_>,
    ) -> NavigationTable {
        let mut staged = navigation.clone();
        for location in Location::ALL {
            self.purchase
                .buy_info(location, &mut staged, session, &mut self.strategy);
        }
        staged
    }

    /// Runs the foraging template, then dead-reckons every belief through the step.
    pub fn decide_movement(
        &mut self,
        navigation: &mut NavigationTable,
        surroundings: &Surroundings,
        motion: &MotionModel,
        rng: &mut impl Rng,
    ) -> Step {
        let step = self.template.step(navigation, surroundings, motion, rng);
        navigation.apply_motion(step.displacement);
        navigation.apply_rotation(step.turn);
        self.purchase.dead_reckon(step.displacement, step.turn);
        self.purchase.age();
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    #[test]
    fn test_registry_covers_every_class() {
        for class in BehaviorClass::ALL {
            let behavior = Behavior::new(class, &BehaviorParams::default(), StrategyKind::default());
            assert_eq!(behavior.class(), class);
            assert_eq!(behavior.sale_policy().is_honest(), class.is_honest());
        }
    }

    #[test]
    fn test_information_modes() {
        let params = BehaviorParams::default();
        let naive = Behavior::new(BehaviorClass::NaiveBehavior, &params, StrategyKind::default());
        let ranked = Behavior::new(
            BehaviorClass::SaboteurReputationRankingBehavior,
            &params,
            StrategyKind::default(),
        );
        assert_eq!(naive.information_mode(), InformationMode::Local);
        assert_eq!(ranked.information_mode(), InformationMode::Global);
    }

    #[test]
    fn test_class_mode_matches_built_policy() {
        for class in BehaviorClass::ALL {
            let behavior = Behavior::new(class, &BehaviorParams::default(), StrategyKind::default());
            assert_eq!(class.information_mode(), behavior.information_mode(), "{}", class);
        }
    }

    #[test]
    fn test_saboteur_uses_configured_rotation() {
        let params = BehaviorParams {
            rotation_angle: 45.0,
            ..BehaviorParams::default()
        };
        let behavior = Behavior::new(BehaviorClass::ScaboteurBehavior, &params, StrategyKind::default());
        assert_eq!(behavior.sale_policy(), SalePolicy::Saboteur { rotation: 45.0 });

        let mut table = NavigationTable::new();
        table.replace(Location::Food, Target::new(DVec2::new(2.0, 0.0)));
        let sold = behavior.decide_sale(&table, Location::Food).unwrap();
        assert!((sold.relative_position - DVec2::new(2.0_f64.sqrt(), 2.0_f64.sqrt())).length() < 1e-9);
    }

    #[test]
    fn test_class_names_round_trip_through_serde() {
        let spec: BehaviorSpec = serde_json::from_str(
            r#"{"class_name": "FreeRiderScepticalBehavior", "population_size": 3}"#,
        )
        .unwrap();
        assert_eq!(spec.class_name, BehaviorClass::FreeRiderScepticalBehavior);
        assert_eq!(spec.parameters, BehaviorParams::default());
        assert_eq!(spec.class_name.to_string(), "FreeRiderScepticalBehavior");
    }

    #[test]
    fn test_unknown_class_is_rejected() {
        let result: Result<BehaviorSpec, _> =
            serde_json::from_str(r#"{"class_name": "EvalBehavior", "population_size": 3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_spec_validation() {
        let mut spec = BehaviorSpec::new(BehaviorClass::ScepticalBehavior, 5);
        assert!(spec.validate().is_ok());
        spec.parameters.required_peers = 1;
        assert!(spec.validate().is_err());
    }
}
