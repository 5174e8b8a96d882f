//! Transaction records

use serde::{Deserialize, Serialize};
use swarm_events::Location;

use crate::components::agent::AgentId;

/// A completed purchase, consumed by the buyer's next settlement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub buyer_id: AgentId,
    pub seller_id: AgentId,
    pub location: Location,
    /// Bearing of the traded information in the buyer's frame, degrees
    pub relative_angle: f64,
    pub timestep: u64,
}

impl Transaction {
    pub fn new(
        buyer_id: AgentId,
        seller_id: AgentId,
        location: Location,
        relative_angle: f64,
        timestep: u64,
    ) -> Self {
        Self {
            buyer_id,
            seller_id,
            location,
            relative_angle,
            timestep,
        }
    }
}
