//! Foraging Template
//!
//! The movement state machine every behavior shares:
//! `Exploring -> SeekingFood -> SeekingNest -> Exploring`.
//!
//! Per tick: age beliefs, refresh what is sensed, transition, pick a
//! displacement, reflect it off walls. The caller dead-reckons afterwards.

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use swarm_events::Location;

use crate::geometry::{bearing, rotate, signed_turn};
use crate::motion::MotionModel;
use crate::navigation::NavigationTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ForagingState {
    #[default]
    Exploring,
    SeekingFood,
    SeekingNest,
}

impl ForagingState {
    fn seeking(location: Location) -> Self {
        match location {
            Location::Food => ForagingState::SeekingFood,
            Location::Nest => ForagingState::SeekingNest,
        }
    }

    pub fn target(&self) -> Option<Location> {
        match self {
            ForagingState::Exploring => None,
            ForagingState::SeekingFood => Some(Location::Food),
            ForagingState::SeekingNest => Some(Location::Nest),
        }
    }
}

/// What an agent perceives this tick, in its local frame
#[derive(Debug, Clone, Default)]
pub struct Surroundings {
    /// Offset to each zone currently sensed
    pub sensed: [Option<DVec2>; 2],
    pub carrying: bool,
    /// Inward normal of a nearby wall
    pub wall_normal: Option<DVec2>,
    /// Standing still while processing a trade
    pub halted: bool,
    pub speed: f64,
    pub radius: f64,
}

/// Intended displacement and heading change, in the pre-turn local frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Step {
    pub displacement: DVec2,
    pub turn: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ForagingTemplate {
    state: ForagingState,
    /// Ticks left in the current straight exploration run
    run_left: u32,
    /// Ticks the agent keeps exploring after bumping into a wall
    wall_escape: u32,
}

impl ForagingTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ForagingState {
        self.state
    }

    pub fn step(
        &mut self,
        navigation: &mut NavigationTable,
        surroundings: &Surroundings,
        motion: &MotionModel,
        rng: &mut impl Rng,
    ) -> Step {
        navigation.age_all();
        for location in Location::ALL {
            if let Some(offset) = surroundings.sensed[location.index()] {
                navigation.refresh(location, offset);
            }
        }

        self.transition(navigation, surroundings, motion, rng);
        if surroundings.halted {
            return Step::default();
        }

        let mut displacement = match self.state.target() {
            Some(location) => {
                let toward = navigation.get(location).relative_position;
                let distance = toward.length();
                if distance > 0.0 {
                    toward / distance * distance.min(surroundings.speed)
                } else {
                    DVec2::ZERO
                }
            }
            None => self.explore(surroundings.speed, motion, rng),
        };

        if let Some(normal) = surroundings.wall_normal {
            let into_wall = displacement.dot(normal);
            if into_wall < 0.0 {
                displacement -= 2.0 * into_wall * normal;
            }
        }

        let turn = if displacement.length_squared() > 0.0 {
            signed_turn(0.0, bearing(displacement))
        } else {
            0.0
        };
        Step { displacement, turn }
    }

    fn explore(&mut self, speed: f64, motion: &MotionModel, rng: &mut impl Rng) -> DVec2 {
        let heading = if self.run_left == 0 {
            self.run_left = motion.sample_levy_steps(rng);
            motion.sample_turn(rng)
        } else {
            0.0
        };
        self.run_left = self.run_left.saturating_sub(1);
        rotate(DVec2::new(speed, 0.0), heading)
    }

    fn transition(
        &mut self,
        navigation: &mut NavigationTable,
        surroundings: &Surroundings,
        motion: &MotionModel,
        rng: &mut impl Rng,
    ) {
        self.wall_escape = self.wall_escape.saturating_sub(1);
        // Heading is the local +x axis
        let facing_wall = surroundings.wall_normal.is_some_and(|normal| normal.x < 0.0);
        let wanted = if surroundings.carrying {
            Location::Nest
        } else {
            Location::Food
        };

        let next = match self.state.target() {
            None => {
                if self.wall_escape == 0 && navigation.get(wanted).valid {
                    ForagingState::seeking(wanted)
                } else {
                    ForagingState::Exploring
                }
            }
            Some(tracked) if tracked != wanted => {
                if navigation.get(wanted).valid {
                    ForagingState::seeking(wanted)
                } else {
                    ForagingState::Exploring
                }
            }
            Some(tracked) => {
                let target = navigation.get(tracked);
                let sensed = surroundings.sensed[tracked.index()].is_some();
                if !target.valid {
                    ForagingState::Exploring
                } else if target.distance() < surroundings.radius && !sensed {
                    tracing::trace!(location = %tracked, "believed target not found");
                    navigation.set_valid(tracked, false);
                    ForagingState::Exploring
                } else if facing_wall {
                    self.wall_escape = motion.sample_levy_steps(rng);
                    ForagingState::Exploring
                } else {
                    self.state
                }
            }
        };

        if next == ForagingState::Exploring && self.state != ForagingState::Exploring {
            self.run_left = 0;
        }
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::assert_close;
    use crate::motion::{NoiseModel, NoiseSettings};
    use crate::navigation::Target;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn quiet_motion() -> MotionModel {
        MotionModel::new(
            NoiseSettings {
                model: NoiseModel::None,
                ..NoiseSettings::default()
            },
            Default::default(),
        )
    }

    fn surroundings() -> Surroundings {
        Surroundings {
            speed: 2.0,
            radius: 1.0,
            ..Surroundings::default()
        }
    }

    #[test]
    fn test_explores_without_beliefs() {
        let mut template = ForagingTemplate::new();
        let mut table = NavigationTable::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let step = template.step(&mut table, &surroundings(), &quiet_motion(), &mut rng);
        assert_eq!(template.state(), ForagingState::Exploring);
        assert!((step.displacement.length() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_seeks_known_food_capped_at_speed() {
        let mut template = ForagingTemplate::new();
        let mut table = NavigationTable::new();
        table.replace(Location::Food, Target::new(DVec2::new(0.0, 10.0)));
        let mut rng = SmallRng::seed_from_u64(1);

        let step = template.step(&mut table, &surroundings(), &quiet_motion(), &mut rng);
        assert_eq!(template.state(), ForagingState::SeekingFood);
        assert_close(step.displacement, DVec2::new(0.0, 2.0));
        assert!((step.turn - 90.0).abs() < 1e-9);
        assert_eq!(table.get(Location::Food).age, 1);
    }

    #[test]
    fn test_sensing_refreshes_belief() {
        let mut template = ForagingTemplate::new();
        let mut table = NavigationTable::new();
        table.replace(Location::Nest, Target::new(DVec2::new(50.0, 0.0)).with_age(30));
        let mut view = surroundings();
        view.sensed[Location::Nest.index()] = Some(DVec2::new(3.0, 4.0));
        let mut rng = SmallRng::seed_from_u64(1);

        template.step(&mut table, &view, &quiet_motion(), &mut rng);
        let nest = table.get(Location::Nest);
        assert_eq!(nest.age, 0);
        assert_eq!(nest.relative_position, DVec2::new(3.0, 4.0));
    }

    #[test]
    fn test_reaching_false_target_invalidates_it() {
        let mut template = ForagingTemplate::new();
        let mut table = NavigationTable::new();
        table.replace(Location::Food, Target::new(DVec2::new(5.0, 0.0)));
        let mut rng = SmallRng::seed_from_u64(1);
        let motion = quiet_motion();

        template.step(&mut table, &surroundings(), &motion, &mut rng);
        assert_eq!(template.state(), ForagingState::SeekingFood);

        table.set_relative_position(Location::Food, DVec2::new(0.5, 0.0));
        template.step(&mut table, &surroundings(), &motion, &mut rng);
        assert_eq!(template.state(), ForagingState::Exploring);
        assert!(!table.get(Location::Food).valid);
    }

    #[test]
    fn test_pickup_switches_to_nest() {
        let mut template = ForagingTemplate::new();
        let mut table = NavigationTable::new();
        table.replace(Location::Food, Target::new(DVec2::new(5.0, 0.0)));
        table.replace(Location::Nest, Target::new(DVec2::new(-80.0, 0.0)));
        let mut rng = SmallRng::seed_from_u64(1);
        let motion = quiet_motion();

        template.step(&mut table, &surroundings(), &motion, &mut rng);
        let mut loaded = surroundings();
        loaded.carrying = true;
        template.step(&mut table, &loaded, &motion, &mut rng);
        assert_eq!(template.state(), ForagingState::SeekingNest);
    }

    #[test]
    fn test_wall_forces_exploration_and_reflects() {
        let mut template = ForagingTemplate::new();
        let mut table = NavigationTable::new();
        table.replace(Location::Food, Target::new(DVec2::new(100.0, 0.0)));
        let mut rng = SmallRng::seed_from_u64(1);
        let motion = quiet_motion();

        template.step(&mut table, &surroundings(), &motion, &mut rng);
        assert_eq!(template.state(), ForagingState::SeekingFood);

        let mut walled = surroundings();
        walled.wall_normal = Some(DVec2::new(-1.0, 0.0));
        let step = template.step(&mut table, &walled, &motion, &mut rng);
        assert_eq!(template.state(), ForagingState::Exploring);
        assert!(step.displacement.x <= 1e-9);
    }

    #[test]
    fn test_halted_agent_still_ages() {
        let mut template = ForagingTemplate::new();
        let mut table = NavigationTable::new();
        table.replace(Location::Food, Target::new(DVec2::new(10.0, 0.0)));
        let mut view = surroundings();
        view.halted = true;
        let mut rng = SmallRng::seed_from_u64(1);

        let step = template.step(&mut table, &view, &quiet_motion(), &mut rng);
        assert_eq!(step, Step::default());
        assert_eq!(table.get(Location::Food).age, 1);
    }
}
