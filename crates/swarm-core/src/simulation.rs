//! Simulation Orchestrator
//!
//! Owns the ECS world and the tick schedule of one run.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use swarm_events::RunReport;

use crate::behavior::{BehaviorClass, BehaviorSpec};
use crate::components::agent::{AgentId, Body, Forager};
use crate::components::world::SimClock;
use crate::config::SimConfig;
use crate::error::ConfigError;
use crate::ledger::PaymentDatabase;
use crate::market::pricing::Market;
use crate::motion::MotionModel;
use crate::navigation::NavigationTable;
use crate::output::{build_report, record_stats, StatsCollector};
use crate::setup::{get_spawn_summary, spawn_agents, spawn_population, SpawnConfig, SpawnSummary};
use crate::systems::{
    advance_clock, advance_market, age_wallets, build_neighbor_graph, movement_phase,
    negotiation_phase, NeighborGraph,
};
use crate::SimRng;

/// One seeded run of the swarm
pub struct Simulation {
    world: World,
    schedule: Schedule,
    config: SimConfig,
    seed: u64,
    next_id: u32,
}

impl Simulation {
    /// Validates the configuration, spawns the population and builds the schedule.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let seed = config.simulation.seed.resolve();
        let fallbacks = config.reputation_fallbacks();
        if !fallbacks.is_empty() {
            let classes: Vec<&str> = fallbacks.iter().map(BehaviorClass::name).collect();
            tracing::warn!(
                strategy = ?config.combine_strategy,
                classes = %classes.join(", "),
                "classes without ledger access fuse by age instead of reputation"
            );
        }

        let mut world = World::new();
        world.insert_resource(config.arena.clone());
        world.insert_resource(SimClock::new());
        world.insert_resource(MotionModel::new(
            config.agent.noise.clone(),
            config.agent.exploration.clone(),
        ));
        world.insert_resource(PaymentDatabase::new(config.payment.clone()));
        world.insert_resource(Market::new(&config.market));
        world.insert_resource(NeighborGraph::new());
        world.insert_resource(StatsCollector::new(config.simulation.sampling_interval));

        let mut rng = SmallRng::seed_from_u64(seed);
        let next_id = spawn_population(
            &mut world,
            &config.behaviors,
            &SpawnConfig::from_config(&config),
            &mut rng,
        )?;
        world.insert_resource(SimRng(rng));

        // Snapshot reads happen in negotiation; every write to beliefs and
        // timers lands in movement or at the end of negotiation.
        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                age_wallets,
                build_neighbor_graph,
                negotiation_phase,
                movement_phase,
                advance_market,
                record_stats,
                advance_clock,
            )
                .chain(),
        );

        tracing::info!(
            seed,
            agents = next_id,
            payment = world.resource::<PaymentDatabase>().policy_name(),
            "simulation initialized"
        );

        Ok(Self {
            world,
            schedule,
            config,
            seed,
            next_id,
        })
    }

    /// Runs a single tick.
    pub fn step(&mut self) {
        self.schedule.run(&mut self.world);
    }

    pub fn run_for(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
            let tick = self.tick();
            if tick % 500 == 0 {
                tracing::debug!(
                    tick,
                    holdings = self.ledger().total_holdings(),
                    "progress"
                );
            }
        }
    }

    /// Runs the configured ticks, then the newcomer extension if any.
    pub fn run(&mut self) -> Result<RunReport, ConfigError> {
        tracing::info!(ticks = self.config.simulation.ticks, "run started");
        self.run_for(self.config.simulation.ticks);

        if let Some(newcomers) = self.config.simulation.newcomers.clone() {
            self.add_newcomers(&newcomers.spec)?;
            self.run_for(newcomers.ticks);
        }

        let report = self.report();
        tracing::info!(
            ticks = report.ticks,
            items = report.total_items(),
            holdings = report.total_holdings,
            "run finished"
        );
        Ok(report)
    }

    /// Appends agents mid-run, each with a fresh wallet.
    pub fn add_newcomers(&mut self, spec: &BehaviorSpec) -> Result<Vec<AgentId>, ConfigError> {
        spec.validate()?;
        let spawn = SpawnConfig::from_config(&self.config);
        let first_id = self.next_id;
        let spawned = self.world.resource_scope(|world, mut rng: Mut<SimRng>| {
            spawn_agents(world, spec, first_id, &spawn, &mut rng.0)
        })?;
        self.next_id += spawned.len() as u32;

        tracing::info!(
            behavior = %spec.class_name,
            count = spawned.len(),
            tick = self.tick(),
            "newcomers arrived"
        );
        Ok((first_id..self.next_id).map(AgentId).collect())
    }

    pub fn tick(&self) -> u64 {
        self.world.resource::<SimClock>().tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PaymentDatabase {
        self.world.resource::<PaymentDatabase>()
    }

    pub fn market(&self) -> &Market {
        self.world.resource::<Market>()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn agent_count(&self) -> u32 {
        self.next_id
    }

    pub fn spawn_summary(&mut self) -> SpawnSummary {
        get_spawn_summary(&mut self.world)
    }

    /// Ids of every agent with the given class, ascending.
    pub fn agents_of(&mut self, class: BehaviorClass) -> Vec<AgentId> {
        let mut query = self.world.query::<(&AgentId, &crate::behavior::Behavior)>();
        let mut ids: Vec<AgentId> = query
            .iter(&self.world)
            .filter(|(_, behavior)| behavior.class() == class)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn body(&mut self, id: AgentId) -> Option<Body> {
        let mut query = self.world.query::<(&AgentId, &Body)>();
        query
            .iter(&self.world)
            .find(|(agent, _)| **agent == id)
            .map(|(_, body)| body.clone())
    }

    pub fn forager(&mut self, id: AgentId) -> Option<Forager> {
        let mut query = self.world.query::<(&AgentId, &Forager)>();
        query
            .iter(&self.world)
            .find(|(agent, _)| **agent == id)
            .map(|(_, forager)| forager.clone())
    }

    pub fn navigation(&mut self, id: AgentId) -> Option<NavigationTable> {
        let mut query = self.world.query::<(&AgentId, &NavigationTable)>();
        query
            .iter(&self.world)
            .find(|(agent, _)| **agent == id)
            .map(|(_, navigation)| navigation.clone())
    }

    /// Read-only run summary for the external recorder.
    pub fn report(&mut self) -> RunReport {
        build_report(&mut self.world, self.seed)
    }
}
