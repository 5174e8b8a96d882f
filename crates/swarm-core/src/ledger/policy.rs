//! Settlement Policies
//!
//! How a buyer's purchases are paid for once the buyer realizes a reward.
//!
//! Both policies keep per-buyer pending state that is taken out of the
//! policy *before* any money moves, so a failed transfer can never leave
//! stale transactions behind.

use std::collections::BTreeMap;

use crate::components::agent::AgentId;
use crate::error::MarketError;
use crate::geometry::angular_difference;
use crate::ledger::reputation::StakeSchedule;
use crate::ledger::wallet::WalletBook;
use crate::market::transaction::Transaction;

/// Result of one settlement round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementOutcome {
    /// Escrow released to the earner before redistribution
    pub pot: f64,
    /// Part of the new reward handed on to sellers
    pub share: f64,
    /// Amount actually paid to each seller
    pub payouts: BTreeMap<AgentId, f64>,
    /// True when a transfer failed and the remaining ones were skipped
    pub abandoned: bool,
}

impl SettlementOutcome {
    pub fn distributed(&self) -> f64 {
        self.payouts.values().sum()
    }
}

/// Interface shared by every settlement policy
pub trait SettlementPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Records a purchase; may move escrow inside the book.
    fn new_transaction(
        &mut self,
        transaction: Transaction,
        book: &mut WalletBook,
    ) -> Result<(), MarketError>;

    /// Settles the earner's pending purchases against a freshly injected reward.
    fn new_reward(&mut self, reward: f64, book: &mut WalletBook, earner: AgentId) -> SettlementOutcome;

    /// Purchases waiting for the buyer's next settlement.
    fn pending(&self, buyer: AgentId) -> &[Transaction];
}

/// Pays each seller its weight's fraction of `total`, stopping at the first failed transfer.
fn distribute(
    book: &mut WalletBook,
    earner: AgentId,
    total: f64,
    weights: &BTreeMap<AgentId, f64>,
    outcome: &mut SettlementOutcome,
) {
    let weight_sum: f64 = weights.values().sum();
    if weight_sum <= 0.0 {
        return;
    }
    for (seller, weight) in weights {
        let amount = total * weight / weight_sum;
        if let Err(err) = book.transfer(earner, *seller, amount) {
            tracing::warn!(%earner, %seller, %err, "settlement abandoned");
            outcome.abandoned = true;
            return;
        }
        *outcome.payouts.entry(*seller).or_insert(0.0) += amount;
    }
}

/// Agreement score of every transaction: how many *other* transactions about
/// the same location, bought on the same tick, report a bearing within half
/// the window of its own.
///
/// Bearings live in the buyer's frame at purchase time, which turns and
/// moves between ticks, so only same-tick purchases are comparable.
pub fn alikeness_scores(transactions: &[Transaction], window: f64) -> Vec<f64> {
    let half = window / 2.0;
    transactions
        .iter()
        .enumerate()
        .map(|(i, tx)| {
            transactions
                .iter()
                .enumerate()
                .filter(|(j, other)| {
                    *j != i
                        && other.location == tx.location
                        && other.timestep == tx.timestep
                        && angular_difference(tx.relative_angle, other.relative_angle) <= half
                })
                .count() as f64
        })
        .collect()
}

/// Escrow from sellers, redistributed by how well their stories agree
#[derive(Debug, Clone)]
pub struct OutlierPenalisation {
    pub base_stake: f64,
    pub information_share: f64,
    /// Full angular width of the agreement window, degrees
    pub window: f64,
    pub schedule: StakeSchedule,
    pending: BTreeMap<AgentId, Vec<Transaction>>,
}

impl OutlierPenalisation {
    pub fn new(base_stake: f64, information_share: f64, window: f64, schedule: StakeSchedule) -> Self {
        Self {
            base_stake,
            information_share,
            window,
            schedule,
            pending: BTreeMap::new(),
        }
    }

    /// Escrow the seller must post for one sale.
    pub fn stake_for(&self, seller: AgentId, book: &WalletBook) -> f64 {
        let coefficient = book
            .get(seller)
            .map(|wallet| self.schedule.coefficient_for(wallet.history()))
            .unwrap_or(1.0);
        self.base_stake * coefficient
    }
}

impl SettlementPolicy for OutlierPenalisation {
    fn name(&self) -> &'static str {
        "outlier_penalisation"
    }

    fn new_transaction(
        &mut self,
        transaction: Transaction,
        book: &mut WalletBook,
    ) -> Result<(), MarketError> {
        let stake = self.stake_for(transaction.seller_id, book);
        book.escrow(transaction.buyer_id, transaction.seller_id, stake)?;
        self.pending.entry(transaction.buyer_id).or_default().push(transaction);
        Ok(())
    }

    fn new_reward(&mut self, reward: f64, book: &mut WalletBook, earner: AgentId) -> SettlementOutcome {
        let transactions = self.pending.remove(&earner).unwrap_or_default();
        let staked = match book.release_escrow(earner) {
            Ok(staked) => staked,
            Err(err) => {
                tracing::warn!(%earner, %err, "no wallet to settle");
                return SettlementOutcome::default();
            }
        };
        let mut outcome = SettlementOutcome {
            pot: staked.values().sum(),
            ..SettlementOutcome::default()
        };
        if transactions.is_empty() {
            return outcome;
        }
        outcome.share = self.information_share * reward;

        let scores = alikeness_scores(&transactions, self.window);
        let everyone_alone = scores.iter().all(|s| *s == 0.0);
        let mut weights: BTreeMap<AgentId, f64> = BTreeMap::new();
        for (tx, score) in transactions.iter().zip(&scores) {
            let weight = if everyone_alone { 1.0 } else { *score };
            *weights.entry(tx.seller_id).or_insert(0.0) += weight;
        }

        distribute(book, earner, outcome.pot + outcome.share, &weights, &mut outcome);

        let sellers: Vec<AgentId> = weights.keys().copied().collect();
        for seller in sellers {
            let paid = outcome.payouts.get(&seller).copied().unwrap_or(0.0);
            let stake = staked.get(&seller).copied().unwrap_or(0.0);
            book.push_outcome(seller, paid - stake);
        }
        tracing::trace!(
            %earner,
            pot = outcome.pot,
            share = outcome.share,
            sellers = outcome.payouts.len(),
            "outlier settlement"
        );
        outcome
    }

    fn pending(&self, buyer: AgentId) -> &[Transaction] {
        self.pending.get(&buyer).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Baseline: a reward share split by transaction count, no escrow
#[derive(Debug, Clone)]
pub struct DelayedPayment {
    pub base_stake: f64,
    pub information_share: f64,
    pending: BTreeMap<AgentId, Vec<Transaction>>,
}

impl DelayedPayment {
    pub fn new(base_stake: f64, information_share: f64) -> Self {
        Self {
            base_stake,
            information_share,
            pending: BTreeMap::new(),
        }
    }
}

impl SettlementPolicy for DelayedPayment {
    fn name(&self) -> &'static str {
        "delayed_payment"
    }

    fn new_transaction(
        &mut self,
        transaction: Transaction,
        book: &mut WalletBook,
    ) -> Result<(), MarketError> {
        book.get(transaction.seller_id)?;
        self.pending.entry(transaction.buyer_id).or_default().push(transaction);
        Ok(())
    }

    fn new_reward(&mut self, reward: f64, book: &mut WalletBook, earner: AgentId) -> SettlementOutcome {
        let transactions = self.pending.remove(&earner).unwrap_or_default();
        let mut outcome = SettlementOutcome::default();
        if transactions.is_empty() {
            return outcome;
        }
        outcome.share = self.information_share * reward;

        let mut weights: BTreeMap<AgentId, f64> = BTreeMap::new();
        for tx in &transactions {
            *weights.entry(tx.seller_id).or_insert(0.0) += 1.0;
        }
        distribute(book, earner, outcome.share, &weights, &mut outcome);

        for seller in weights.keys() {
            let paid = outcome.payouts.get(seller).copied().unwrap_or(0.0);
            book.push_outcome(*seller, paid - self.base_stake);
        }
        outcome
    }

    fn pending(&self, buyer: AgentId) -> &[Transaction] {
        self.pending.get(&buyer).map(Vec::as_slice).unwrap_or(&[])
    }
}
