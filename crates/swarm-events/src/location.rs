//! Points of Interest
//!
//! The two locations every agent keeps a belief about.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point of interest in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Where items are picked up
    Food,
    /// Where items are deposited and sold
    Nest,
}

impl Location {
    /// All locations in table order.
    pub const ALL: [Location; 2] = [Location::Food, Location::Nest];

    /// Dense index used by per-location arrays.
    pub fn index(self) -> usize {
        match self {
            Location::Food => 0,
            Location::Nest => 1,
        }
    }

    /// The location an agent heads for after finishing at this one.
    pub fn other(self) -> Location {
        match self {
            Location::Food => Location::Nest,
            Location::Nest => Location::Food,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Food => write!(f, "food"),
            Location::Nest => write!(f, "nest"),
        }
    }
}
