//! Configuration System
//!
//! Loads a run description from TOML. Every table has documented defaults,
//! so a file only needs to name what it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use swarm_events::Location;

use crate::behavior::{BehaviorClass, BehaviorSpec};
use crate::components::world::Arena;
use crate::error::ConfigError;
use crate::ledger::PaymentConfig;
use crate::market::pricing::MarketConfig;
use crate::market::session::InformationMode;
use crate::motion::{ExplorationSettings, NoiseSettings};
use crate::strategy::StrategyKind;

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// How bought information is fused into beliefs
    pub combine_strategy: StrategyKind,
    pub simulation: SimulationSettings,
    pub arena: Arena,
    pub agent: AgentSettings,
    pub behaviors: Vec<BehaviorSpec>,
    pub payment: PaymentConfig,
    pub market: MarketConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            combine_strategy: StrategyKind::default(),
            simulation: SimulationSettings::default(),
            arena: Arena::default(),
            agent: AgentSettings::default(),
            behaviors: vec![
                BehaviorSpec::new(BehaviorClass::NaiveBehavior, 24),
                BehaviorSpec::new(BehaviorClass::SaboteurBehavior, 1),
            ],
            payment: PaymentConfig::default(),
            market: MarketConfig::default(),
        }
    }
}

impl SimConfig {
    /// Loads and validates a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses and validates a configuration string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.agent.validate()?;
        self.payment.validate()?;
        self.market.validate()?;

        if !(self.arena.width > 0.0 && self.arena.height > 0.0) {
            return Err(ConfigError::Invalid("arena dimensions must be positive".to_string()));
        }
        for location in Location::ALL {
            if !self.arena.zone_fits(location) {
                return Err(ConfigError::Invalid(format!(
                    "the {} zone does not fit inside the arena",
                    location
                )));
            }
        }
        if self.agent.radius * 2.0 >= self.arena.width.min(self.arena.height) {
            return Err(ConfigError::Invalid("agent radius is too large for the arena".to_string()));
        }

        if self.behaviors.is_empty() {
            return Err(ConfigError::Invalid("at least one behavior entry is required".to_string()));
        }
        for spec in &self.behaviors {
            if spec.population_size == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} has an empty population",
                    spec.class_name
                )));
            }
            spec.validate()?;
        }
        Ok(())
    }

    /// Classes that cannot see reputations and so fuse by age under a
    /// reputation-weighted combine strategy, newcomers included.
    pub fn reputation_fallbacks(&self) -> Vec<BehaviorClass> {
        if !self.combine_strategy.uses_reputation() {
            return Vec::new();
        }
        let mut classes: Vec<BehaviorClass> = self
            .behaviors
            .iter()
            .chain(self.simulation.newcomers.iter().map(|newcomers| &newcomers.spec))
            .map(|spec| spec.class_name)
            .filter(|class| class.information_mode() == InformationMode::Local)
            .collect();
        classes.sort();
        classes.dedup();
        classes
    }

    /// Number of agents spawned at start.
    pub fn population(&self) -> usize {
        self.behaviors.iter().map(|spec| spec.population_size).sum()
    }
}

/// Seed selection: a fixed integer or the keyword "random"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedSetting {
    Fixed(u64),
    Keyword(String),
}

impl Default for SeedSetting {
    fn default() -> Self {
        SeedSetting::Fixed(42)
    }
}

impl SeedSetting {
    pub const RANDOM: &'static str = "random";

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            SeedSetting::Fixed(_) => Ok(()),
            SeedSetting::Keyword(word) if word == Self::RANDOM => Ok(()),
            SeedSetting::Keyword(word) => Err(ConfigError::Invalid(format!(
                "simulation.seed must be an integer or \"random\", got \"{}\"",
                word
            ))),
        }
    }

    /// The concrete seed for this run; "random" draws from entropy.
    pub fn resolve(&self) -> u64 {
        match self {
            SeedSetting::Fixed(seed) => *seed,
            SeedSetting::Keyword(_) => rand::random(),
        }
    }
}

/// Agents appended after the main run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewcomerSpec {
    #[serde(flatten)]
    pub spec: BehaviorSpec,
    /// Extra ticks run once the newcomers have arrived
    pub ticks: u64,
}

/// The `[simulation]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub ticks: u64,
    pub seed: SeedSetting,
    /// Ticks between evolution samples; 0 disables sampling
    pub sampling_interval: u64,
    pub newcomers: Option<NewcomerSpec>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            ticks: 2000,
            seed: SeedSetting::default(),
            sampling_interval: 100,
            newcomers: None,
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.seed.validate()?;
        if let Some(newcomers) = &self.newcomers {
            if newcomers.spec.population_size == 0 {
                return Err(ConfigError::Invalid(
                    "simulation.newcomers has an empty population".to_string(),
                ));
            }
            newcomers.spec.validate()?;
        }
        Ok(())
    }
}

/// The `[agent]` table: physical and radio parameters shared by all agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub speed: f64,
    pub radius: f64,
    pub communication_radius: f64,
    pub communication_cooldown: u32,
    pub communication_stop_time: u32,
    pub noise: NoiseSettings,
    pub exploration: ExplorationSettings,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            speed: 3.0,
            radius: 2.0,
            communication_radius: 30.0,
            communication_cooldown: 10,
            communication_stop_time: 2,
            noise: NoiseSettings::default(),
            exploration: ExplorationSettings::default(),
        }
    }
}

impl AgentSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.speed > 0.0 && self.radius > 0.0) {
            return Err(ConfigError::Invalid(
                "agent.speed and agent.radius must be positive".to_string(),
            ));
        }
        if self.communication_radius < 0.0 {
            return Err(ConfigError::Invalid(
                "agent.communication_radius must be non-negative".to_string(),
            ));
        }
        if self.communication_stop_time > self.communication_cooldown {
            return Err(ConfigError::Invalid(
                "agent.communication_stop_time cannot exceed communication_cooldown".to_string(),
            ));
        }
        if self.noise.drift_sd < 0.0 || self.noise.step_sd < 0.0 {
            return Err(ConfigError::Invalid(
                "agent.noise spreads must be non-negative".to_string(),
            ));
        }
        self.exploration.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PaymentSystem;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.population(), 25);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = SimConfig::from_str(
            r#"
            combine_strategy = "reputation_weighted"

            [simulation]
            ticks = 50
            seed = "random"

            [payment]
            system = "delayed_payment"

            [[behaviors]]
            class_name = "ScepticalBehavior"
            population_size = 5

            [behaviors.parameters]
            scepticism_threshold = 0.4
            "#,
        )
        .unwrap();

        assert_eq!(config.combine_strategy, StrategyKind::ReputationWeighted);
        assert_eq!(config.simulation.ticks, 50);
        assert_eq!(config.simulation.seed, SeedSetting::Keyword("random".to_string()));
        assert_eq!(config.payment.system, PaymentSystem::DelayedPayment);
        assert_eq!(config.behaviors.len(), 1);
        assert_eq!(config.behaviors[0].parameters.scepticism_threshold, 0.4);
        assert_eq!(config.behaviors[0].parameters.pending_capacity, 4);
        assert_eq!(config.agent, AgentSettings::default());
    }

    #[test]
    fn test_unknown_class_rejected_at_load() {
        let result = SimConfig::from_str(
            r#"
            [[behaviors]]
            class_name = "TelepathicBehavior"
            population_size = 3
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_empty_population_rejected() {
        let mut config = SimConfig::default();
        config.behaviors[0].population_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_seed_keyword_must_be_random() {
        assert!(SeedSetting::Keyword("sometimes".to_string()).validate().is_err());
        assert!(SeedSetting::Keyword("random".to_string()).validate().is_ok());
        assert_eq!(SeedSetting::Fixed(7).resolve(), 7);
    }

    #[test]
    fn test_zone_outside_arena_rejected() {
        let mut config = SimConfig::default();
        config.arena.food.x = config.arena.width;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_newcomers_table() {
        let config = SimConfig::from_str(
            r#"
            [simulation.newcomers]
            class_name = "SaboteurBehavior"
            population_size = 2
            ticks = 100
            "#,
        )
        .unwrap();
        let newcomers = config.simulation.newcomers.unwrap();
        assert_eq!(newcomers.spec.class_name, BehaviorClass::SaboteurBehavior);
        assert_eq!(newcomers.spec.population_size, 2);
        assert_eq!(newcomers.ticks, 100);
    }

    #[test]
    fn test_reputation_fallbacks_list_local_classes() {
        let mut config = SimConfig::default();
        assert!(config.reputation_fallbacks().is_empty());

        config.combine_strategy = StrategyKind::RunningReputationWeighted;
        config.behaviors.push(BehaviorSpec::new(BehaviorClass::ReputationRankingBehavior, 3));
        config.behaviors.push(BehaviorSpec::new(BehaviorClass::NaiveBehavior, 2));
        config.simulation.newcomers = Some(NewcomerSpec {
            spec: BehaviorSpec::new(BehaviorClass::ScepticalBehavior, 2),
            ticks: 10,
        });
        assert_eq!(
            config.reputation_fallbacks(),
            vec![
                BehaviorClass::NaiveBehavior,
                BehaviorClass::SaboteurBehavior,
                BehaviorClass::ScepticalBehavior,
            ]
        );
    }

    #[test]
    fn test_to_toml_round_trip() {
        let config = SimConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(SimConfig::from_str(&text).unwrap(), config);
    }
}
