//! Negotiation Phase
//!
//! Every open agent buys from its open neighbors. Sellers answer from a
//! snapshot taken before anyone buys; bought beliefs are staged and only
//! applied in the movement phase, and communication timers restart after
//! the whole phase.

use bevy_ecs::prelude::*;
use std::collections::BTreeSet;
use swarm_events::Location;

use crate::behavior::Behavior;
use crate::components::agent::{AgentId, Body, CommLink, StagedNavigation};
use crate::components::world::SimClock;
use crate::ledger::PaymentDatabase;
use crate::market::session::{CommunicationSession, SellerView};
use crate::navigation::NavigationTable;
use crate::systems::neighbors::NeighborGraph;

/// Pre-tick views of every agent, indexed by id
#[derive(Debug, Default)]
pub struct MarketSnapshot {
    views: Vec<SellerView>,
}

impl MarketSnapshot {
    pub fn capture<'a>(
        agents: impl Iterator<Item = (&'a AgentId, &'a Body, &'a CommLink, &'a NavigationTable, &'a Behavior)>,
    ) -> Self {
        let mut views: Vec<SellerView> = agents
            .map(|(id, body, link, navigation, behavior)| {
                let offers = Location::ALL.map(|location| behavior.decide_sale(navigation, location));
                SellerView::new(*id, body, link.is_open(), navigation.clone(), offers)
            })
            .collect();
        views.sort_by_key(|view| view.id);
        Self { views }
    }

    pub fn get(&self, id: AgentId) -> Option<&SellerView> {
        self.views
            .binary_search_by_key(&id, |view| view.id)
            .ok()
            .map(|index| &self.views[index])
    }
}

type NegotiationQuery<'w, 's> = Query<
    'w,
    's,
    (
        &'static AgentId,
        &'static Body,
        &'static mut CommLink,
        &'static NavigationTable,
        &'static mut Behavior,
        &'static mut StagedNavigation,
    ),
>;

/// System: buying round over the whole population
pub fn negotiation_phase(
    clock: Res<SimClock>,
    graph: Res<NeighborGraph>,
    mut ledger: ResMut<PaymentDatabase>,
    mut agents: NegotiationQuery,
) {
    let snapshot = MarketSnapshot::capture(
        agents
            .iter()
            .map(|(id, body, link, navigation, behavior, _)| (id, body, link, navigation, behavior)),
    );

    let mut ordered: Vec<_> = agents.iter_mut().collect();
    ordered.sort_by_key(|(id, ..)| **id);

    let mut touched: BTreeSet<AgentId> = BTreeSet::new();
    for (id, body, link, navigation, mut behavior, mut staged) in ordered {
        staged.0 = None;
        if !link.is_open() {
            continue;
        }
        let neighbors: Vec<&SellerView> = graph
            .neighbors(*id)
            .iter()
            .filter_map(|neighbor| snapshot.get(*neighbor))
            .collect();
        if neighbors.is_empty() {
            continue;
        }

        let mode = behavior.information_mode();
        let mut session =
            CommunicationSession::new(*id, body, neighbors, &mut ledger, mode, clock.tick);
        if session.is_empty() {
            continue;
        }
        let updated = behavior.decide_purchase(navigation, &mut session);
        touched.extend(session.finish());
        if updated != *navigation {
            staged.0 = Some(updated);
        }
    }

    for (id, _, mut link, _, _, _) in agents.iter_mut() {
        if touched.contains(id) {
            link.mark_used();
        }
    }
    if !touched.is_empty() {
        tracing::debug!(tick = clock.tick, agents = touched.len(), "negotiation round");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{BehaviorClass, BehaviorParams};
    use crate::components::agent::CommState;
    use crate::ledger::PaymentConfig;
    use crate::navigation::Target;
    use crate::strategy::StrategyKind;
    use glam::DVec2;

    fn spawn(world: &mut World, id: u32, position: DVec2, navigation: NavigationTable) {
        world.spawn((
            AgentId(id),
            Body::new(position, 0.0, 1.0, 1.0),
            CommLink::new(50.0, 5, 2),
            navigation,
            Behavior::new(BehaviorClass::NaiveBehavior, &BehaviorParams::default(), StrategyKind::default()),
            StagedNavigation::default(),
        ));
    }

    fn small_world() -> World {
        let mut world = World::new();
        world.insert_resource(SimClock::new());
        let mut ledger = PaymentDatabase::new(PaymentConfig::default());
        for i in 0..3 {
            ledger.register(AgentId(i));
        }
        world.insert_resource(ledger);

        let mut informed = NavigationTable::new();
        informed.replace(Location::Nest, Target::new(DVec2::new(-20.0, 0.0)));
        spawn(&mut world, 0, DVec2::new(10.0, 0.0), NavigationTable::new());
        spawn(&mut world, 1, DVec2::new(20.0, 0.0), informed);
        spawn(&mut world, 2, DVec2::new(0.0, 0.0), NavigationTable::new());

        let mut graph = NeighborGraph::new();
        graph.add(AgentId(0), AgentId(1));
        graph.add(AgentId(2), AgentId(0));
        world.insert_resource(graph);
        world
    }

    fn agent(world: &mut World, id: u32) -> (CommState, NavigationTable, Option<NavigationTable>) {
        let mut query = world.query::<(&AgentId, &CommLink, &NavigationTable, &StagedNavigation)>();
        query
            .iter(world)
            .find(|(agent, ..)| **agent == AgentId(id))
            .map(|(_, link, navigation, staged)| (link.state(), navigation.clone(), staged.0.clone()))
            .unwrap()
    }

    #[test]
    fn test_purchase_is_staged_not_applied() {
        let mut world = small_world();
        let mut schedule = Schedule::default();
        schedule.add_systems(negotiation_phase);
        schedule.run(&mut world);

        let (state, navigation, staged) = agent(&mut world, 0);
        assert_eq!(state, CommState::Processing);
        assert_eq!(navigation, NavigationTable::new());
        let staged = staged.unwrap();
        let nest = staged.get(Location::Nest);
        assert!(nest.valid);
        assert!((nest.relative_position - DVec2::new(-10.0, 0.0)).length() < 1e-9);

        let ledger = world.resource::<PaymentDatabase>();
        assert_eq!(ledger.pending(AgentId(0)).len(), 1);
        assert_eq!(ledger.pending(AgentId(0))[0].seller_id, AgentId(1));
    }

    #[test]
    fn test_later_buyer_sees_pre_tick_snapshot() {
        let mut world = small_world();
        let mut schedule = Schedule::default();
        schedule.add_systems(negotiation_phase);
        schedule.run(&mut world);

        // Agent 0 bought before agent 2 asked, but the snapshot still shows it uninformed
        let (state, navigation, staged) = agent(&mut world, 2);
        assert_eq!(state, CommState::Open);
        assert_eq!(navigation, NavigationTable::new());
        assert!(staged.is_none());
        assert!(world.resource::<PaymentDatabase>().pending(AgentId(2)).is_empty());

        let (seller_state, ..) = agent(&mut world, 1);
        assert_eq!(seller_state, CommState::Processing);
    }

    #[test]
    fn test_busy_agents_do_not_buy() {
        let mut world = small_world();
        let mut query = world.query::<(&AgentId, &mut CommLink)>();
        for (id, mut link) in query.iter_mut(&mut world) {
            if *id == AgentId(0) {
                link.mark_used();
            }
        }

        let mut schedule = Schedule::default();
        schedule.add_systems(negotiation_phase);
        schedule.run(&mut world);

        let (_, _, staged) = agent(&mut world, 0);
        assert!(staged.is_none());
        assert!(world.resource::<PaymentDatabase>().pending(AgentId(0)).is_empty());
        let (seller_state, ..) = agent(&mut world, 1);
        assert_eq!(seller_state, CommState::Open);
    }
}
