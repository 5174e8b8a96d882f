//! Navigation Table
//!
//! Per-agent beliefs about where the points of interest are.
//!
//! Every entry is kept in the owner's *current* local frame. Each tick the
//! owner's intended displacement is subtracted (`apply_motion`) and the
//! result is back-rotated by the heading change (`apply_rotation`), in that
//! order, exactly once.

use bevy_ecs::prelude::*;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use swarm_events::Location;

use crate::geometry::rotate;

/// Belief about one point of interest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Position relative to the owner, in the owner's local frame
    pub relative_position: DVec2,
    /// Ticks since the belief was last refreshed
    pub age: u32,
    pub valid: bool,
}

impl Target {
    pub fn new(relative_position: DVec2) -> Self {
        Self {
            relative_position,
            age: 0,
            valid: true,
        }
    }

    /// An entry the owner knows nothing about.
    pub fn unknown() -> Self {
        Self {
            relative_position: DVec2::ZERO,
            age: 0,
            valid: false,
        }
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = age;
        self
    }

    /// Distance from the owner to the believed position.
    pub fn distance(&self) -> f64 {
        self.relative_position.length()
    }

    /// Copy of this entry rotated by `degrees`.
    pub fn rotated(&self, degrees: f64) -> Self {
        Self {
            relative_position: rotate(self.relative_position, degrees),
            ..*self
        }
    }

    /// Copy of this entry shifted by `offset`.
    pub fn translated(&self, offset: DVec2) -> Self {
        Self {
            relative_position: self.relative_position + offset,
            ..*self
        }
    }

    /// Dead-reckons this entry through one owner step.
    pub fn dead_reckon(&mut self, displacement: DVec2, delta_heading: f64) {
        self.relative_position = rotate(self.relative_position - displacement, -delta_heading);
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::unknown()
    }
}

/// One `Target` per location, single owner
#[derive(Component, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationTable {
    entries: [Target; 2],
}

impl NavigationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: Location) -> Target {
        self.entries[location.index()]
    }

    pub fn set_relative_position(&mut self, location: Location, position: DVec2) {
        self.entries[location.index()].relative_position = position;
    }

    pub fn set_valid(&mut self, location: Location, valid: bool) {
        self.entries[location.index()].valid = valid;
    }

    pub fn set_age(&mut self, location: Location, age: u32) {
        self.entries[location.index()].age = age;
    }

    pub fn replace(&mut self, location: Location, target: Target) {
        self.entries[location.index()] = target;
    }

    /// Refreshes an entry from direct sensing.
    pub fn refresh(&mut self, location: Location, position: DVec2) {
        self.replace(location, Target::new(position));
    }

    /// Ages every entry by one tick.
    pub fn age_all(&mut self) {
        for entry in &mut self.entries {
            entry.age = entry.age.saturating_add(1);
        }
    }

    /// Subtracts the owner's displacement, expressed in the pre-rotation frame.
    pub fn apply_motion(&mut self, displacement: DVec2) {
        for entry in &mut self.entries {
            entry.relative_position -= displacement;
        }
    }

    /// Back-rotates every entry by the owner's heading change.
    pub fn apply_rotation(&mut self, delta_heading: f64) {
        for entry in &mut self.entries {
            entry.relative_position = rotate(entry.relative_position, -delta_heading);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Location, &Target)> {
        Location::ALL.into_iter().zip(self.entries.iter())
    }
}
