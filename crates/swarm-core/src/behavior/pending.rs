//! Pending Pool
//!
//! Bought beliefs a sceptical agent refused to commit yet, keyed by the
//! seller so one neighbor can only hold one slot. Entries live in the
//! owner's local frame and are dead-reckoned like the main table.

use glam::DVec2;
use std::collections::BTreeMap;

use crate::components::agent::AgentId;
use crate::navigation::Target;

/// Distance between two beliefs relative to the candidate's own range.
pub fn disagreement(reference: &Target, candidate: &Target) -> f64 {
    let gap = (candidate.relative_position - reference.relative_position).length();
    let norm = candidate.relative_position.length();
    if norm > f64::EPSILON {
        gap / norm
    } else {
        gap
    }
}

#[derive(Debug, Clone, Default)]
pub struct PendingPool {
    entries: BTreeMap<AgentId, Target>,
    capacity: usize,
}

impl PendingPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Parks a belief; a second belief from the same seller replaces the first.
    pub fn park(&mut self, seller: AgentId, target: Target) {
        self.entries.insert(seller, target);
    }

    pub fn get(&self, seller: AgentId) -> Option<&Target> {
        self.entries.get(&seller)
    }

    /// Parked beliefs within `threshold` of the candidate.
    pub fn agreeing(&self, candidate: &Target, threshold: f64) -> Vec<Target> {
        self.entries
            .values()
            .filter(|parked| disagreement(parked, candidate) < threshold)
            .copied()
            .collect()
    }

    /// Parked belief closest to the mean of the pool.
    pub fn central(&self) -> Option<(AgentId, Target)> {
        if self.entries.is_empty() {
            return None;
        }
        let mean = self
            .entries
            .values()
            .fold(DVec2::ZERO, |acc, t| acc + t.relative_position)
            / self.entries.len() as f64;
        self.entries
            .iter()
            .min_by(|(_, a), (_, b)| {
                a.relative_position
                    .distance(mean)
                    .total_cmp(&b.relative_position.distance(mean))
            })
            .map(|(id, t)| (*id, *t))
    }

    /// Empties the pool once a belief has been committed.
    pub fn clear_on_commit(&mut self) {
        self.entries.clear();
    }

    pub fn dead_reckon(&mut self, displacement: DVec2, delta_heading: f64) {
        for target in self.entries.values_mut() {
            target.dead_reckon(displacement, delta_heading);
        }
    }

    pub fn age_all(&mut self) {
        for target in self.entries.values_mut() {
            target.age = target.age.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::assert_close;

    #[test]
    fn test_park_is_keyed_by_seller() {
        let mut pool = PendingPool::new(2);
        pool.park(AgentId(1), Target::new(DVec2::X));
        pool.park(AgentId(1), Target::new(DVec2::Y));
        assert_eq!(pool.len(), 1);
        assert!(!pool.is_full());
        pool.park(AgentId(2), Target::new(DVec2::Y));
        assert!(pool.is_full());
    }

    #[test]
    fn test_central_entry() {
        let mut pool = PendingPool::new(4);
        pool.park(AgentId(1), Target::new(DVec2::new(0.0, 0.0)));
        pool.park(AgentId(2), Target::new(DVec2::new(10.0, 0.0)));
        pool.park(AgentId(3), Target::new(DVec2::new(4.0, 0.0)));
        let (seller, target) = pool.central().unwrap();
        assert_eq!(seller, AgentId(3));
        assert_close(target.relative_position, DVec2::new(4.0, 0.0));
    }

    #[test]
    fn test_agreeing_uses_relative_gap() {
        let mut pool = PendingPool::new(4);
        pool.park(AgentId(1), Target::new(DVec2::new(100.0, 5.0)));
        pool.park(AgentId(2), Target::new(DVec2::new(-100.0, 0.0)));
        let candidate = Target::new(DVec2::new(100.0, 0.0));
        assert_eq!(pool.agreeing(&candidate, 0.25).len(), 1);
    }

    #[test]
    fn test_dead_reckoning_and_clear() {
        let mut pool = PendingPool::new(4);
        pool.park(AgentId(1), Target::new(DVec2::new(10.0, 0.0)));
        pool.dead_reckon(DVec2::new(4.0, 0.0), 90.0);
        pool.age_all();
        let parked = pool.get(AgentId(1)).unwrap();
        assert_close(parked.relative_position, DVec2::new(0.0, -6.0));
        assert_eq!(parked.age, 1);

        pool.clear_on_commit();
        assert!(pool.is_empty());
    }
}
