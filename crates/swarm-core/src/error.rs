//! Error Types
//!
//! Expected market conditions and configuration failures.

use swarm_events::Location;
use thiserror::Error;

use crate::components::agent::AgentId;

/// Conditions raised by the market, the ledger and the arena.
///
/// `InsufficientFunds`, `NoInformationSold` and `NoLocationSensed` are
/// ordinary outcomes: callers catch them per candidate seller or per cost
/// application and carry on with the tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    #[error("{agent} cannot pay {needed:.4} (holds {available:.4})")]
    InsufficientFunds {
        agent: AgentId,
        needed: f64,
        available: f64,
    },

    #[error("{seller} sold no information about {location}")]
    NoInformationSold { seller: AgentId, location: Location },

    #[error("{location} is not currently sensed")]
    NoLocationSensed { location: Location },

    #[error("negative amount {0} rejected")]
    NegativeAmount(f64),

    #[error("no wallet for {0}")]
    UnknownWallet(AgentId),

    #[error("{0} is not a neighbor in this session")]
    UnknownNeighbor(AgentId),
}

impl MarketError {
    /// True for the conditions that drive control flow rather than signal a defect.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MarketError::InsufficientFunds { .. }
                | MarketError::NoInformationSold { .. }
                | MarketError::NoLocationSensed { .. }
        )
    }
}

/// Errors that can occur while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that end a single run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("report export failed: {0}")]
    Report(#[from] swarm_events::ReportError),
}
