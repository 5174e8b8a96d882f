//! World Components
//!
//! The rectangular arena, its two zones and the simulation clock.

use bevy_ecs::prelude::*;
use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use swarm_events::Location;

use crate::components::agent::Body;
use crate::error::MarketError;

/// Circular zone around a point of interest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Zone {
    pub fn new(x: f64, y: f64, radius: f64) -> Self {
        Self { x, y, radius }
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn contains(&self, position: DVec2) -> bool {
        position.distance(self.center()) < self.radius
    }
}

/// Resource: the arena geometry
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
    pub food: Zone,
    pub nest: Zone,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: 500.0,
            height: 500.0,
            food: Zone::new(400.0, 400.0, 40.0),
            nest: Zone::new(100.0, 100.0, 40.0),
        }
    }
}

impl Arena {
    pub fn zone(&self, location: Location) -> &Zone {
        match location {
            Location::Food => &self.food,
            Location::Nest => &self.nest,
        }
    }

    /// True when `position` lies inside the zone of `location`.
    pub fn contains(&self, location: Location, position: DVec2) -> bool {
        self.zone(location).contains(position)
    }

    /// Position of a sensed zone center in the body's local frame.
    pub fn relative_position(&self, location: Location, body: &Body) -> Result<DVec2, MarketError> {
        if !self.contains(location, body.position) {
            return Err(MarketError::NoLocationSensed { location });
        }
        Ok(body.local_offset_to(self.zone(location).center()))
    }

    /// Inward normal of the walls closer than `reach`, if any.
    pub fn wall_normal(&self, position: DVec2, reach: f64) -> Option<DVec2> {
        let mut normal = DVec2::ZERO;
        if position.x < reach {
            normal.x += 1.0;
        }
        if position.x > self.width - reach {
            normal.x -= 1.0;
        }
        if position.y < reach {
            normal.y += 1.0;
        }
        if position.y > self.height - reach {
            normal.y -= 1.0;
        }
        let normal = normal.normalize_or_zero();
        (normal != DVec2::ZERO).then_some(normal)
    }

    /// Keeps a body of `radius` inside the walls.
    pub fn clamp(&self, position: DVec2, radius: f64) -> DVec2 {
        DVec2::new(
            position.x.clamp(radius, (self.width - radius).max(radius)),
            position.y.clamp(radius, (self.height - radius).max(radius)),
        )
    }

    /// Uniform random position at least `radius` away from every wall.
    pub fn random_position(&self, rng: &mut impl Rng, radius: f64) -> DVec2 {
        DVec2::new(
            rng.gen_range(radius..(self.width - radius).max(radius + f64::EPSILON)),
            rng.gen_range(radius..(self.height - radius).max(radius + f64::EPSILON)),
        )
    }

    /// True when the zone lies fully inside the arena.
    pub fn zone_fits(&self, location: Location) -> bool {
        let zone = self.zone(location);
        zone.radius > 0.0
            && zone.x - zone.radius >= 0.0
            && zone.y - zone.radius >= 0.0
            && zone.x + zone.radius <= self.width
            && zone.y + zone.radius <= self.height
    }
}

/// Resource: the current tick
#[derive(Resource, Debug, Clone, Default)]
pub struct SimClock {
    pub tick: u64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }
}
