//! Agent Components
//!
//! Components for individual foraging agents: identity, body, cargo and
//! communication link.

use bevy_ecs::prelude::*;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::{local_to_world, wrap_degrees};
use crate::navigation::NavigationTable;

/// Unique identifier for an agent
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent_{:04}", self.0)
    }
}

/// Physical state of an agent in the world frame
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub position: DVec2,
    /// Heading in degrees, wrapped to [0, 360)
    pub orientation: f64,
    pub radius: f64,
    /// Top speed per tick
    pub speed: f64,
    /// Systematic heading bias in degrees ("noise_mu")
    pub drift: f64,
}

impl Body {
    pub fn new(position: DVec2, orientation: f64, radius: f64, speed: f64) -> Self {
        Self {
            position,
            orientation: wrap_degrees(orientation),
            radius,
            speed,
            drift: 0.0,
        }
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    /// Moves by a local-frame displacement, then turns by `delta_heading`.
    pub fn advance(&mut self, displacement: DVec2, delta_heading: f64) {
        self.position += local_to_world(displacement, self.orientation);
        self.orientation = wrap_degrees(self.orientation + delta_heading);
    }

    /// Offset from this body to another, in this body's local frame.
    pub fn local_offset_to(&self, other: DVec2) -> DVec2 {
        crate::geometry::world_to_local(other - self.position, self.orientation)
    }
}

/// Cargo and lifetime delivery count
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Forager {
    pub carrying: bool,
    pub items_collected: u32,
}

/// Availability of an agent for trading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CommState {
    #[default]
    Open,
    /// Just traded; the agent halts while processing
    Processing,
    /// Moving again but not yet accepting new trades
    Cooldown,
}

/// Communication radio of an agent
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct CommLink {
    pub radius: f64,
    /// Ticks that must pass between two trades
    pub cooldown: u32,
    /// Ticks the agent stands still after a trade
    pub stop_time: u32,
    state: CommState,
    ticks_since_comm: u32,
}

impl CommLink {
    pub fn new(radius: f64, cooldown: u32, stop_time: u32) -> Self {
        Self {
            radius,
            cooldown,
            stop_time,
            state: CommState::Open,
            ticks_since_comm: cooldown.max(stop_time),
        }
    }

    pub fn state(&self) -> CommState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == CommState::Open
    }

    /// True while the agent is processing a trade and must not move.
    pub fn is_halted(&self) -> bool {
        self.state == CommState::Processing
    }

    /// Resets the cooldown timer after a trade.
    pub fn mark_used(&mut self) {
        self.ticks_since_comm = 0;
        self.recompute();
    }

    /// Advances the timer by one tick.
    pub fn tick(&mut self) {
        self.ticks_since_comm = self.ticks_since_comm.saturating_add(1);
        self.recompute();
    }

    fn recompute(&mut self) {
        self.state = if self.ticks_since_comm < self.stop_time {
            CommState::Processing
        } else if self.ticks_since_comm < self.cooldown {
            CommState::Cooldown
        } else {
            CommState::Open
        };
    }
}

/// Beliefs computed during negotiation, applied in the movement phase
#[derive(Component, Debug, Clone, Default)]
pub struct StagedNavigation(pub Option<NavigationTable>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::assert_close;

    #[test]
    fn test_comm_link_cycle() {
        let mut link = CommLink::new(50.0, 5, 2);
        assert!(link.is_open());

        link.mark_used();
        assert_eq!(link.state(), CommState::Processing);
        assert!(link.is_halted());

        link.tick();
        assert_eq!(link.state(), CommState::Processing);
        link.tick();
        assert_eq!(link.state(), CommState::Cooldown);
        assert!(!link.is_halted());
        link.tick();
        link.tick();
        assert_eq!(link.state(), CommState::Cooldown);
        link.tick();
        assert_eq!(link.state(), CommState::Open);
    }

    #[test]
    fn test_comm_link_without_delays_stays_open() {
        let mut link = CommLink::new(50.0, 0, 0);
        link.mark_used();
        assert!(link.is_open());
    }

    #[test]
    fn test_body_advance_uses_pre_turn_heading() {
        let mut body = Body::new(DVec2::new(10.0, 10.0), 90.0, 1.0, 2.0);
        body.advance(DVec2::new(2.0, 0.0), -90.0);
        assert_close(body.position, DVec2::new(10.0, 12.0));
        assert!(body.orientation.abs() < 1e-9);
    }

    #[test]
    fn test_local_offset() {
        let body = Body::new(DVec2::ZERO, 90.0, 1.0, 1.0);
        assert_close(body.local_offset_to(DVec2::new(0.0, 5.0)), DVec2::new(5.0, 0.0));
    }

    #[test]
    fn test_agent_id_display() {
        assert_eq!(AgentId(7).to_string(), "agent_0007");
    }
}
