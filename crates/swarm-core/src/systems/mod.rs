//! ECS Systems
//!
//! The per-tick phases: wallet aging, neighbor discovery, negotiation,
//! movement and the market.

pub mod ledger;
pub mod movement;
pub mod negotiation;
pub mod neighbors;

pub use ledger::{advance_clock, advance_market, age_wallets};
pub use movement::{handle_crossings, movement_phase, sense, WALL_SENSOR_REACH};
pub use negotiation::{negotiation_phase, MarketSnapshot};
pub use neighbors::{build_neighbor_graph, NeighborGraph};
