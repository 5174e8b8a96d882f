//! Shared data types for the swarm information market.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is the boundary between the engine and whatever records or plots
//! the results of a run.

pub mod location;
pub mod report;

pub use location::Location;

pub use report::{
    AgentRecord, EvolutionSample, ReportError, RunReport, TransactionCounts, TransactionTotals,
};
