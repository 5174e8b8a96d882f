//! Buying Policies
//!
//! Every policy plugs hooks into one purchase loop: order the quotes, test
//! validity, buy, test quality, then fuse or withhold. Expected market
//! conditions (a refusal, an unaffordable stake) skip to the next seller.

use glam::DVec2;
use std::fmt;
use swarm_events::Location;

use crate::components::agent::AgentId;
use crate::behavior::pending::{disagreement, PendingPool};
use crate::ledger::ReputationMetric;
use crate::market::session::{CommunicationSession, InformationMode, Purchase};
use crate::navigation::{NavigationTable, Target};
use crate::strategy::{reputation_weighted, CombineStrategy, Reputations};

/// One seller's public offer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub seller: AgentId,
    pub age: u32,
    pub reputation: Option<f64>,
}

/// Whether the purchase loop keeps scanning sellers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Stop,
    Continue,
}

/// Buying half of a behavior
pub trait PurchasePolicy: Send + Sync + fmt::Debug {
    fn information_mode(&self) -> InformationMode {
        InformationMode::Local
    }

    /// Youngest information first.
    fn order(&self, quotes: &mut [Quote], _session: &CommunicationSession<'_>) {
        quotes.sort_by_key(|q| (q.age, q.seller));
    }

    /// Only strictly younger information is worth paying for.
    fn is_valid(&self, mine: &Target, quote: &Quote, _session: &CommunicationSession<'_>) -> bool {
        !mine.valid || quote.age < mine.age
    }

    fn passes_quality(&self, _mine: &Target, _purchase: &Purchase) -> bool {
        true
    }

    /// Decides what to do with a purchase that passed the quality test.
    fn accept(
        &mut self,
        purchase: &Purchase,
        navigation: &mut NavigationTable,
        strategy: &mut CombineStrategy,
        session: &mut CommunicationSession<'_>,
    ) -> Flow;

    /// Runs once after the scan over sellers ends.
    fn finish(
        &mut self,
        _location: Location,
        _navigation: &mut NavigationTable,
        _strategy: &mut CombineStrategy,
        _session: &mut CommunicationSession<'_>,
    ) {
    }

    /// Keeps internal beliefs in the owner's frame.
    fn dead_reckon(&mut self, _displacement: DVec2, _delta_heading: f64) {}

    fn age(&mut self) {}

    fn buy_info(
        &mut self,
        location: Location,
        navigation: &mut NavigationTable,
        session: &mut CommunicationSession<'_>,
        strategy: &mut CombineStrategy,
    ) {
        purchase_loop(self, location, navigation, session, strategy);
    }
}

fn purchase_loop<P: PurchasePolicy + ?Sized>(
    policy: &mut P,
    location: Location,
    navigation: &mut NavigationTable,
    session: &mut CommunicationSession<'_>,
    strategy: &mut CombineStrategy,
) {
    let mut quotes: Vec<Quote> = session
        .get_metadata(location)
        .into_iter()
        .map(|(seller, metadata)| Quote {
            seller,
            age: metadata.age,
            reputation: metadata.reputation,
        })
        .collect();
    policy.order(&mut quotes, session);

    for quote in quotes {
        let mine = navigation.get(location);
        if !policy.is_valid(&mine, &quote, session) {
            continue;
        }
        let purchase = match session.buy(quote.seller, location) {
            Ok(purchase) => purchase,
            Err(err) if err.is_recoverable() => {
                tracing::trace!(buyer = %session.buyer(), %err, "purchase skipped");
                continue;
            }
            Err(err) => {
                tracing::warn!(buyer = %session.buyer(), %err, "purchase failed");
                continue;
            }
        };
        if !policy.passes_quality(&mine, &purchase) {
            continue;
        }
        session.record_validated(purchase.seller);
        if policy.accept(&purchase, navigation, strategy, session) == Flow::Stop {
            break;
        }
    }
    policy.finish(location, navigation, strategy, session);
}

fn reputations(purchase: &Purchase, session: &CommunicationSession<'_>) -> Option<Reputations> {
    let mine = session.reputation_of(session.buyer())?;
    let seller = purchase.seller_reputation?;
    Some(Reputations { mine, seller })
}

/// Fuses a purchase into the table with the agent's strategy.
fn fuse(
    purchase: &Purchase,
    navigation: &mut NavigationTable,
    strategy: &mut CombineStrategy,
    session: &mut CommunicationSession<'_>,
) {
    let mine = navigation.get(purchase.location);
    let fused = strategy.combine(
        purchase.location,
        &mine,
        &purchase.bought,
        purchase.offset,
        reputations(purchase, session),
    );
    navigation.replace(purchase.location, fused);
    session.record_combined(purchase.seller);
}

/// Buys strictly younger information and stops at the first success
#[derive(Debug, Clone, Default)]
pub struct NaiveBuying;

impl PurchasePolicy for NaiveBuying {
    fn accept(
        &mut self,
        purchase: &Purchase,
        navigation: &mut NavigationTable,
        strategy: &mut CombineStrategy,
        session: &mut CommunicationSession<'_>,
    ) -> Flow {
        fuse(purchase, navigation, strategy, session);
        Flow::Stop
    }
}

/// Collects a batch of quotes and commits the one closest to their mean
#[derive(Debug, Clone)]
pub struct CarefulBuying {
    batch_size: usize,
    batch: Vec<Purchase>,
}

impl CarefulBuying {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch: Vec::new(),
        }
    }
}

impl PurchasePolicy for CarefulBuying {
    fn accept(
        &mut self,
        purchase: &Purchase,
        _navigation: &mut NavigationTable,
        _strategy: &mut CombineStrategy,
        _session: &mut CommunicationSession<'_>,
    ) -> Flow {
        self.batch.push(*purchase);
        if self.batch.len() >= self.batch_size {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn finish(
        &mut self,
        _location: Location,
        navigation: &mut NavigationTable,
        strategy: &mut CombineStrategy,
        session: &mut CommunicationSession<'_>,
    ) {
        let batch = std::mem::take(&mut self.batch);
        if batch.is_empty() {
            return;
        }
        let mean = batch
            .iter()
            .fold(DVec2::ZERO, |acc, p| acc + p.composed().relative_position)
            / batch.len() as f64;
        let chosen = batch.iter().min_by(|a, b| {
            a.composed()
                .relative_position
                .distance(mean)
                .total_cmp(&b.composed().relative_position.distance(mean))
        });
        if let Some(chosen) = chosen {
            fuse(chosen, navigation, strategy, session);
        }
    }
}

/// Commits only information that agrees with the current belief or with enough parked peers
#[derive(Debug, Clone)]
pub struct ScepticalBuying {
    threshold: f64,
    required_peers: usize,
    pools: [PendingPool; 2],
}

impl ScepticalBuying {
    pub fn new(threshold: f64, capacity: usize, required_peers: usize) -> Self {
        Self {
            threshold,
            required_peers: required_peers.max(2),
            pools: [PendingPool::new(capacity), PendingPool::new(capacity)],
        }
    }

    pub fn pool(&self, location: Location) -> &PendingPool {
        &self.pools[location.index()]
    }

    fn commit(
        &mut self,
        location: Location,
        seller: AgentId,
        target: Target,
        navigation: &mut NavigationTable,
        session: &mut CommunicationSession<'_>,
    ) {
        navigation.replace(location, Target { valid: true, ..target });
        session.record_combined(seller);
        self.pools[location.index()].clear_on_commit();
    }
}

impl PurchasePolicy for ScepticalBuying {
    fn accept(
        &mut self,
        purchase: &Purchase,
        navigation: &mut NavigationTable,
        strategy: &mut CombineStrategy,
        session: &mut CommunicationSession<'_>,
    ) -> Flow {
        let location = purchase.location;
        let mine = navigation.get(location);
        let composed = purchase.composed();

        if !mine.valid || disagreement(&mine, &composed) < self.threshold {
            fuse(purchase, navigation, strategy, session);
            self.pools[location.index()].clear_on_commit();
            return Flow::Stop;
        }

        let peers = self.pools[location.index()].agreeing(&composed, self.threshold);
        if peers.len() + 1 >= self.required_peers {
            let consensus = peers
                .iter()
                .fold(composed.relative_position, |acc, t| acc + t.relative_position)
                / (peers.len() + 1) as f64;
            let target = Target {
                relative_position: consensus,
                ..composed
            };
            self.commit(location, purchase.seller, target, navigation, session);
            return Flow::Stop;
        }

        let pool = &mut self.pools[location.index()];
        pool.park(purchase.seller, composed);
        if pool.is_full() {
            if let Some((seller, target)) = pool.central() {
                self.commit(location, seller, target, navigation, session);
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn dead_reckon(&mut self, displacement: DVec2, delta_heading: f64) {
        for pool in &mut self.pools {
            pool.dead_reckon(displacement, delta_heading);
        }
    }

    fn age(&mut self) {
        for pool in &mut self.pools {
            pool.age_all();
        }
    }
}

/// Naive buying restricted to sellers in the top fraction of the ledger
#[derive(Debug, Clone)]
pub struct ReputationThresholdBuying {
    rank_fraction: f64,
    metric: Option<ReputationMetric>,
}

impl ReputationThresholdBuying {
    pub fn new(rank_fraction: f64, metric: Option<ReputationMetric>) -> Self {
        Self { rank_fraction, metric }
    }
}

impl PurchasePolicy for ReputationThresholdBuying {
    fn information_mode(&self) -> InformationMode {
        InformationMode::Global
    }

    fn is_valid(&self, mine: &Target, quote: &Quote, session: &CommunicationSession<'_>) -> bool {
        let younger = !mine.valid || quote.age < mine.age;
        let Some(ledger) = session.ledger() else {
            return younger;
        };
        let metric = self.metric.unwrap_or(ledger.config().reputation_metric);
        let ranked = ledger
            .top_fraction(quote.seller, metric)
            .map(|fraction| fraction <= self.rank_fraction)
            .unwrap_or(false);
        // Must also hold its own against the sellers around the buyer
        let local = match (ledger.get_reward(quote.seller), session.average_neighbor_reward()) {
            (Ok(reward), Some(average)) => reward >= average,
            _ => false,
        };
        younger && ranked && local
    }

    fn accept(
        &mut self,
        purchase: &Purchase,
        navigation: &mut NavigationTable,
        strategy: &mut CombineStrategy,
        session: &mut CommunicationSession<'_>,
    ) -> Flow {
        fuse(purchase, navigation, strategy, session);
        Flow::Stop
    }
}

/// Asks the best-ranked sellers first and only buys from agents ranked above itself
#[derive(Debug, Clone)]
pub struct ReputationRankingBuying {
    metric: Option<ReputationMetric>,
}

impl ReputationRankingBuying {
    pub fn new(metric: Option<ReputationMetric>) -> Self {
        Self { metric }
    }
}

impl PurchasePolicy for ReputationRankingBuying {
    fn information_mode(&self) -> InformationMode {
        InformationMode::Global
    }

    /// Re-scores every quote under this behavior's metric before sorting.
    fn order(&self, quotes: &mut [Quote], session: &CommunicationSession<'_>) {
        if let Some(ledger) = session.ledger() {
            let metric = self.metric.unwrap_or(ledger.config().reputation_metric);
            for quote in quotes.iter_mut() {
                quote.reputation = ledger.reputation(quote.seller, metric).ok();
            }
        }
        quotes.sort_by(|a, b| {
            let ra = a.reputation.unwrap_or(f64::NEG_INFINITY);
            let rb = b.reputation.unwrap_or(f64::NEG_INFINITY);
            rb.total_cmp(&ra).then(a.age.cmp(&b.age)).then(a.seller.cmp(&b.seller))
        });
    }

    fn is_valid(&self, mine: &Target, quote: &Quote, session: &CommunicationSession<'_>) -> bool {
        if !mine.valid {
            return true;
        }
        let Some(ledger) = session.ledger() else {
            return quote.age < mine.age;
        };
        let metric = self.metric.unwrap_or(ledger.config().reputation_metric);
        match (ledger.rank(quote.seller, metric), ledger.rank(session.buyer(), metric)) {
            (Ok(seller), Ok(own)) => seller < own && quote.age <= mine.age,
            _ => false,
        }
    }

    fn accept(
        &mut self,
        purchase: &Purchase,
        navigation: &mut NavigationTable,
        strategy: &mut CombineStrategy,
        session: &mut CommunicationSession<'_>,
    ) -> Flow {
        fuse(purchase, navigation, strategy, session);
        Flow::Stop
    }
}

/// Naive buying that weighs each fusion by the parties' wealth
#[derive(Debug, Clone, Default)]
pub struct WealthWeightedBuying;

impl PurchasePolicy for WealthWeightedBuying {
    fn information_mode(&self) -> InformationMode {
        InformationMode::Global
    }

    fn accept(
        &mut self,
        purchase: &Purchase,
        navigation: &mut NavigationTable,
        strategy: &mut CombineStrategy,
        session: &mut CommunicationSession<'_>,
    ) -> Flow {
        let wealth = session.ledger().and_then(|ledger| {
            let mine = ledger.get_wealth(session.buyer()).ok()?;
            let seller = ledger.get_wealth(purchase.seller).ok()?;
            Some((mine, seller))
        });
        match wealth {
            Some((mine_wealth, seller_wealth)) => {
                let range = (session.min_neighbor_reward(), session.max_neighbor_reward());
                let (mine_wealth, seller_wealth) = match range {
                    (Some(low), Some(high)) if high > low => {
                        let scale = |wealth: f64| ((wealth - low) / (high - low)).clamp(0.0, 1.0);
                        (scale(mine_wealth), scale(seller_wealth))
                    }
                    _ => (mine_wealth, seller_wealth),
                };
                let mine = navigation.get(purchase.location);
                let fused = reputation_weighted(&mine, &purchase.composed(), mine_wealth, seller_wealth);
                navigation.replace(purchase.location, fused);
                session.record_combined(purchase.seller);
            }
            None => fuse(purchase, navigation, strategy, session),
        }
        Flow::Stop
    }
}
