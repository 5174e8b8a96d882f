//! Agent Spawning
//!
//! Places agents at random non-colliding positions, draws their heading and
//! drift, and opens a wallet for each.

use bevy_ecs::prelude::*;
use glam::DVec2;
use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::BTreeMap;

use crate::behavior::{Behavior, BehaviorSpec};
use crate::components::agent::{AgentId, Body, CommLink, Forager, StagedNavigation};
use crate::components::world::Arena;
use crate::config::SimConfig;
use crate::error::ConfigError;
use crate::ledger::PaymentDatabase;
use crate::motion::MotionModel;
use crate::navigation::NavigationTable;
use crate::strategy::StrategyKind;

/// Placement draws before the arena is declared too crowded
pub const MAX_PLACEMENT_ATTEMPTS: usize = 1000;

/// Per-agent parameters shared by every spawned agent
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    pub speed: f64,
    pub radius: f64,
    pub communication_radius: f64,
    pub communication_cooldown: u32,
    pub communication_stop_time: u32,
    pub strategy: StrategyKind,
}

impl SpawnConfig {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            speed: config.agent.speed,
            radius: config.agent.radius,
            communication_radius: config.agent.communication_radius,
            communication_cooldown: config.agent.communication_cooldown,
            communication_stop_time: config.agent.communication_stop_time,
            strategy: config.combine_strategy,
        }
    }
}

/// Draws a position at least two radii away from every occupied one.
fn place_agent(
    arena: &Arena,
    occupied: &[DVec2],
    radius: f64,
    rng: &mut SmallRng,
) -> Result<DVec2, ConfigError> {
    for _ in 0..MAX_PLACEMENT_ATTEMPTS {
        let candidate = arena.random_position(rng, radius);
        if occupied.iter().all(|other| other.distance(candidate) >= 2.0 * radius) {
            return Ok(candidate);
        }
    }
    Err(ConfigError::Invalid(format!(
        "no free spot for another agent of radius {} after {} attempts",
        radius, MAX_PLACEMENT_ATTEMPTS
    )))
}

/// Spawn `spec.population_size` agents with ids starting at `first_id`
pub fn spawn_agents(
    world: &mut World,
    spec: &BehaviorSpec,
    first_id: u32,
    config: &SpawnConfig,
    rng: &mut SmallRng,
) -> Result<Vec<Entity>, ConfigError> {
    let arena = world.resource::<Arena>().clone();
    let motion = world.resource::<MotionModel>().clone();
    let mut bodies = world.query::<&Body>();
    let mut occupied: Vec<DVec2> = bodies.iter(world).map(|body| body.position).collect();

    let mut spawned = Vec::with_capacity(spec.population_size);
    for index in 0..spec.population_size {
        let id = AgentId(first_id + index as u32);
        let position = place_agent(&arena, &occupied, config.radius, rng)?;
        occupied.push(position);

        let orientation = rng.gen_range(0.0..360.0);
        let body = Body::new(position, orientation, config.radius, config.speed)
            .with_drift(motion.sample_drift(rng));

        let entity = world
            .spawn((
                id,
                body,
                Forager::default(),
                CommLink::new(
                    config.communication_radius,
                    config.communication_cooldown,
                    config.communication_stop_time,
                ),
                NavigationTable::new(),
                Behavior::from_spec(spec, config.strategy),
                StagedNavigation::default(),
            ))
            .id();
        world.resource_mut::<PaymentDatabase>().register(id);
        spawned.push(entity);
    }

    tracing::debug!(
        behavior = %spec.class_name,
        count = spawned.len(),
        first_id,
        "spawned agents"
    );
    Ok(spawned)
}

/// Spawn every configured population in order; returns the next free id.
pub fn spawn_population(
    world: &mut World,
    specs: &[BehaviorSpec],
    config: &SpawnConfig,
    rng: &mut SmallRng,
) -> Result<u32, ConfigError> {
    let mut next_id = 0;
    for spec in specs {
        let spawned = spawn_agents(world, spec, next_id, config, rng)?;
        next_id += spawned.len() as u32;
    }
    Ok(next_id)
}

/// Get summary stats for spawned agents
pub fn get_spawn_summary(world: &mut World) -> SpawnSummary {
    let mut total_agents = 0;
    let mut by_behavior: BTreeMap<String, u32> = BTreeMap::new();

    let mut query = world.query::<&Behavior>();
    for behavior in query.iter(world) {
        total_agents += 1;
        *by_behavior.entry(behavior.class().to_string()).or_insert(0) += 1;
    }

    SpawnSummary {
        total_agents,
        by_behavior,
    }
}

/// Summary of spawned agents
#[derive(Debug)]
pub struct SpawnSummary {
    pub total_agents: u32,
    pub by_behavior: BTreeMap<String, u32>,
}

impl std::fmt::Display for SpawnSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total agents: {}", self.total_agents)?;
        for (behavior, count) in &self.by_behavior {
            writeln!(f, "  {}: {}", behavior, count)?;
        }
        Ok(())
    }
}
