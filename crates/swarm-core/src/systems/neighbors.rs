//! Neighbor Discovery
//!
//! Rebuilds who can talk to whom from pairwise distances.

use bevy_ecs::prelude::*;
use std::collections::BTreeMap;

use crate::components::agent::{AgentId, Body, CommLink};

/// Resource: neighbors within each agent's communication radius
#[derive(Resource, Debug, Default)]
pub struct NeighborGraph {
    adjacency: BTreeMap<AgentId, Vec<AgentId>>,
}

impl NeighborGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Neighbors of an agent, in id order
    pub fn neighbors(&self, id: AgentId) -> &[AgentId] {
        self.adjacency
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.adjacency.clear();
    }

    pub fn add(&mut self, id: AgentId, neighbor: AgentId) {
        self.adjacency.entry(id).or_default().push(neighbor);
    }
}

/// System: pairwise distance check against each listener's radius
pub fn build_neighbor_graph(mut graph: ResMut<NeighborGraph>, query: Query<(&AgentId, &Body, &CommLink)>) {
    graph.clear();

    let mut agents: Vec<(AgentId, glam::DVec2, f64)> = query
        .iter()
        .map(|(id, body, link)| (*id, body.position, link.radius))
        .collect();
    agents.sort_by_key(|(id, _, _)| *id);

    for (id, position, radius) in &agents {
        for (other, other_position, _) in &agents {
            if other != id && position.distance(*other_position) <= *radius {
                graph.add(*id, *other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn spawn(world: &mut World, id: u32, position: DVec2, radius: f64) {
        world.spawn((
            AgentId(id),
            Body::new(position, 0.0, 1.0, 1.0),
            CommLink::new(radius, 0, 0),
        ));
    }

    #[test]
    fn test_neighbors_within_own_radius() {
        let mut world = World::new();
        world.insert_resource(NeighborGraph::new());
        spawn(&mut world, 0, DVec2::new(0.0, 0.0), 10.0);
        spawn(&mut world, 1, DVec2::new(8.0, 0.0), 5.0);
        spawn(&mut world, 2, DVec2::new(100.0, 0.0), 500.0);

        let mut schedule = Schedule::default();
        schedule.add_systems(build_neighbor_graph);
        schedule.run(&mut world);

        let graph = world.resource::<NeighborGraph>();
        assert_eq!(graph.neighbors(AgentId(0)), &[AgentId(1)]);
        assert!(graph.neighbors(AgentId(1)).is_empty());
        assert_eq!(graph.neighbors(AgentId(2)), &[AgentId(0), AgentId(1)]);
        assert_eq!(graph.edge_count(), 3);
    }
}
