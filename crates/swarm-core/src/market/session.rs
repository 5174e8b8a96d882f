//! Communication Session
//!
//! Short-lived negotiation context built for one buyer per tick.
//!
//! Sellers are read from a snapshot taken before the negotiation phase, so
//! every buyer sees the same pre-tick market no matter the iteration order.
//! The session never touches an agent's belief table; it only hands the
//! buyer rotated copies and logs the purchases in the ledger.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use swarm_events::Location;

use crate::components::agent::{AgentId, Body};
use crate::error::MarketError;
use crate::geometry::{bearing, world_to_local};
use crate::ledger::{CounterKind, PaymentDatabase};
use crate::market::transaction::Transaction;
use crate::navigation::{NavigationTable, Target};

/// Whether a behavior needs read access to the whole ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InformationMode {
    #[default]
    Local,
    Global,
}

/// Pre-tick view of a potential seller
#[derive(Debug, Clone)]
pub struct SellerView {
    pub id: AgentId,
    pub position: DVec2,
    pub orientation: f64,
    pub comm_open: bool,
    /// Public part of the seller's beliefs: ages and validity
    pub table: NavigationTable,
    /// What the seller would hand over, per location
    pub offers: [Option<Target>; 2],
}

impl SellerView {
    pub fn new(id: AgentId, body: &Body, comm_open: bool, table: NavigationTable, offers: [Option<Target>; 2]) -> Self {
        Self {
            id,
            position: body.position,
            orientation: body.orientation,
            comm_open,
            table,
            offers,
        }
    }

    pub fn offer(&self, location: Location) -> Option<Target> {
        self.offers[location.index()]
    }
}

/// Public information about a seller's belief
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfoMetadata {
    pub age: u32,
    /// Only exposed to behaviors with global ledger access
    pub reputation: Option<f64>,
}

/// A successful purchase as seen by the buyer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Purchase {
    pub seller: AgentId,
    pub location: Location,
    /// Seller's belief rotated into the buyer's heading
    pub bought: Target,
    /// Buyer to seller displacement in the buyer's frame
    pub offset: DVec2,
    pub seller_reputation: Option<f64>,
}

impl Purchase {
    /// The bought belief expressed relative to the buyer.
    pub fn composed(&self) -> Target {
        self.bought.translated(self.offset)
    }
}

/// One buyer's negotiation context for the current tick
pub struct CommunicationSession<'a> {
    buyer: AgentId,
    position: DVec2,
    orientation: f64,
    neighbors: BTreeMap<AgentId, &'a SellerView>,
    ledger: &'a mut PaymentDatabase,
    mode: InformationMode,
    tick: u64,
    traded_with: BTreeSet<AgentId>,
}

impl<'a> CommunicationSession<'a> {
    /// Builds a session from the buyer's neighbors; sellers not `Open` are left out.
    pub fn new(
        buyer: AgentId,
        body: &Body,
        neighbors: impl IntoIterator<Item = &'a SellerView>,
        ledger: &'a mut PaymentDatabase,
        mode: InformationMode,
        tick: u64,
    ) -> Self {
        let neighbors = neighbors
            .into_iter()
            .filter(|view| view.comm_open && view.id != buyer)
            .map(|view| (view.id, view))
            .collect();
        Self {
            buyer,
            position: body.position,
            orientation: body.orientation,
            neighbors,
            ledger,
            mode,
            tick,
            traded_with: BTreeSet::new(),
        }
    }

    pub fn buyer(&self) -> AgentId {
        self.buyer
    }

    pub fn mode(&self) -> InformationMode {
        self.mode
    }

    pub fn neighbor_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.neighbors.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Read access to the ledger, for behaviors that need global information.
    pub fn ledger(&self) -> Option<&PaymentDatabase> {
        match self.mode {
            InformationMode::Global => Some(&*self.ledger),
            InformationMode::Local => None,
        }
    }

    /// Reputation of any agent, when the mode allows it.
    pub fn reputation_of(&self, id: AgentId) -> Option<f64> {
        let ledger = self.ledger()?;
        ledger.reputation(id, ledger.config().reputation_metric).ok()
    }

    /// Ages of every neighbor holding a valid belief about `location`.
    pub fn get_metadata(&self, location: Location) -> BTreeMap<AgentId, InfoMetadata> {
        self.neighbors
            .values()
            .filter(|view| view.table.get(location).valid)
            .map(|view| {
                let metadata = InfoMetadata {
                    age: view.table.get(location).age,
                    reputation: self.reputation_of(view.id),
                };
                (view.id, metadata)
            })
            .collect()
    }

    fn neighbor(&self, id: AgentId) -> Result<&'a SellerView, MarketError> {
        self.neighbors
            .get(&id)
            .copied()
            .ok_or(MarketError::UnknownNeighbor(id))
    }

    /// Buyer to seller displacement in the buyer's local frame.
    pub fn neighbor_offset(&self, seller: AgentId) -> Result<DVec2, MarketError> {
        let view = self.neighbor(seller)?;
        Ok(world_to_local(view.position - self.position, self.orientation))
    }

    /// Buys the seller's belief, rotated into the buyer's heading.
    ///
    /// The caller still has to add `neighbor_offset` to place it relative to
    /// the buyer. Nothing is logged unless the ledger accepts the transaction.
    pub fn make_transaction(&mut self, seller: AgentId, location: Location) -> Result<Target, MarketError> {
        let view = self.neighbor(seller)?;
        self.ledger.record(self.buyer, seller, CounterKind::Attempted);
        let Some(offer) = view.offer(location) else {
            self.ledger.record_refusal();
            return Err(MarketError::NoInformationSold { seller, location });
        };
        let bought = offer.rotated(view.orientation - self.orientation);
        let offset = world_to_local(view.position - self.position, self.orientation);
        let angle = bearing(bought.relative_position + offset);

        let transaction = Transaction::new(self.buyer, seller, location, angle, self.tick);
        self.ledger.new_transaction(transaction)?;
        self.traded_with.insert(seller);
        tracing::trace!(buyer = %self.buyer, %seller, %location, angle, "information sold");
        Ok(bought)
    }

    /// `make_transaction` plus everything the buyer needs to fuse the result.
    pub fn buy(&mut self, seller: AgentId, location: Location) -> Result<Purchase, MarketError> {
        let bought = self.make_transaction(seller, location)?;
        Ok(Purchase {
            seller,
            location,
            bought,
            offset: self.neighbor_offset(seller)?,
            seller_reputation: self.reputation_of(seller),
        })
    }

    pub fn record_validated(&mut self, seller: AgentId) {
        self.ledger.record(self.buyer, seller, CounterKind::Validated);
    }

    pub fn record_combined(&mut self, seller: AgentId) {
        self.ledger.record(self.buyer, seller, CounterKind::Combined);
    }

    fn neighbor_rewards(&self) -> Option<Vec<f64>> {
        let ledger = self.ledger()?;
        let rewards: Vec<f64> = self
            .neighbors
            .keys()
            .filter_map(|id| ledger.get_reward(*id).ok())
            .collect();
        (!rewards.is_empty()).then_some(rewards)
    }

    pub fn average_neighbor_reward(&self) -> Option<f64> {
        self.neighbor_rewards()
            .map(|rewards| rewards.iter().sum::<f64>() / rewards.len() as f64)
    }

    pub fn min_neighbor_reward(&self) -> Option<f64> {
        self.neighbor_rewards()
            .map(|rewards| rewards.into_iter().fold(f64::INFINITY, f64::min))
    }

    pub fn max_neighbor_reward(&self) -> Option<f64> {
        self.neighbor_rewards()
            .map(|rewards| rewards.into_iter().fold(f64::NEG_INFINITY, f64::max))
    }

    /// Agents whose communication timer must restart: the buyer and every seller it bought from.
    pub fn finish(self) -> Vec<AgentId> {
        if self.traded_with.is_empty() {
            return Vec::new();
        }
        let mut touched: Vec<AgentId> = self.traded_with.into_iter().collect();
        touched.push(self.buyer);
        touched
    }
}
