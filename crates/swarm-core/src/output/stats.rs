//! Statistics Output
//!
//! Periodic samples of reward and delivery evolution, plus the final run
//! report handed to the external recorder.

use bevy_ecs::prelude::*;
use swarm_events::{AgentRecord, EvolutionSample, RunReport, TransactionCounts, TransactionTotals};

use crate::behavior::Behavior;
use crate::components::agent::{AgentId, Body, Forager};
use crate::components::world::SimClock;
use crate::ledger::PaymentDatabase;

/// Resource to accumulate samples during the run
#[derive(Resource, Debug, Default)]
pub struct StatsCollector {
    pub sampling_interval: u64,
    pub samples: Vec<EvolutionSample>,
}

impl StatsCollector {
    pub fn new(sampling_interval: u64) -> Self {
        Self {
            sampling_interval,
            samples: Vec::new(),
        }
    }

    /// True when `tick` falls on the sampling grid
    pub fn is_due(&self, tick: u64) -> bool {
        self.sampling_interval > 0 && tick % self.sampling_interval == 0
    }

    /// Records rewards and deliveries, indexed in agent id order.
    pub fn record(&mut self, tick: u64, mut agents: Vec<(AgentId, u32)>, ledger: &PaymentDatabase) {
        agents.sort_by_key(|(id, _)| *id);
        let rewards = agents
            .iter()
            .map(|(id, _)| ledger.get_reward(*id).unwrap_or(0.0))
            .collect();
        let items = agents.iter().map(|(_, items)| *items).collect();
        self.samples.push(EvolutionSample { tick, rewards, items });
    }
}

/// System: sample the population on the configured interval
pub fn record_stats(
    clock: Res<SimClock>,
    ledger: Res<PaymentDatabase>,
    mut stats: ResMut<StatsCollector>,
    query: Query<(&AgentId, &Forager)>,
) {
    if !stats.is_due(clock.tick) {
        return;
    }
    let agents = query
        .iter()
        .map(|(id, forager)| (*id, forager.items_collected))
        .collect();
    stats.record(clock.tick, agents, &ledger);
}

/// Builds the run report from the current world.
pub fn build_report(world: &mut World, seed: u64) -> RunReport {
    let mut query = world.query::<(&AgentId, &Body, &Forager, &Behavior)>();
    let mut rows: Vec<(AgentId, f64, u32, String)> = query
        .iter(world)
        .map(|(id, body, forager, behavior)| {
            (*id, body.drift, forager.items_collected, behavior.class().to_string())
        })
        .collect();
    rows.sort_by_key(|(id, ..)| *id);

    let ledger = world.resource::<PaymentDatabase>();
    let mut totals = TransactionTotals {
        refused: ledger.refused(),
        unaffordable: ledger.unaffordable(),
        abandoned_settlements: ledger.abandoned_settlements(),
        ..TransactionTotals::default()
    };
    let agents: Vec<AgentRecord> = rows
        .into_iter()
        .map(|(id, drift, items_collected, behavior)| {
            let transactions = ledger.counts(id).unwrap_or_default();
            totals.counts.accumulate(&transactions);
            AgentRecord {
                agent_id: id.0,
                behavior,
                reward: ledger.get_reward(id).unwrap_or(0.0),
                items_collected,
                drift,
                escrowed_stake: ledger.book().posted_stake(id),
                transactions,
            }
        })
        .collect();

    RunReport {
        seed,
        ticks: world.resource::<SimClock>().tick,
        payment_system: ledger.policy_name().to_string(),
        agents,
        evolution: world.resource::<StatsCollector>().samples.clone(),
        transactions: totals,
        total_injected: ledger.total_injected(),
        total_taxed: ledger.total_taxed(),
        total_holdings: ledger.total_holdings(),
    }
}
