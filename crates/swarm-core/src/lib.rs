//! Swarm Information Market Engine
//!
//! Foraging agents that dead-reckon their way between a food zone and a
//! nest, buying and selling beliefs about both locations. A settlement
//! ledger pays sellers out of the buyers' realized rewards and makes bad
//! information expensive.
//!
//! Public API for the simulation engine.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod behavior;
pub mod components;
pub mod config;
pub mod error;
pub mod geometry;
pub mod ledger;
pub mod market;
pub mod motion;
pub mod navigation;
pub mod output;
pub mod setup;
pub mod simulation;
pub mod strategy;
pub mod systems;

pub use components::*;

pub use behavior::{Behavior, BehaviorClass, BehaviorParams, BehaviorSpec};
pub use config::SimConfig;
pub use error::{ConfigError, MarketError, RunError};
pub use ledger::{PaymentConfig, PaymentDatabase, PaymentSystem, ReputationMetric};
pub use simulation::Simulation;

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
