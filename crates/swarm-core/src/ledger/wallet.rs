//! Wallets
//!
//! Per-agent balances, escrow and counters, plus the book that holds them.
//!
//! Escrow lives in the *buyer's* wallet, keyed by the seller who posted it,
//! until the buyer's next settlement releases it. Rewards plus outstanding
//! stakes are conserved by every internal operation of the book.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use swarm_events::TransactionCounts;

use crate::components::agent::AgentId;
use crate::error::MarketError;

/// Kinds of per-counterparty transaction counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Attempted,
    Validated,
    Completed,
    Combined,
}

/// One agent's account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub reward: f64,
    /// Escrow held against sellers pending this agent's settlement
    pub stake: BTreeMap<AgentId, f64>,
    /// Reward burned by taxation
    pub charity_pool: f64,
    pub wallet_age: u64,
    pub attempted: BTreeMap<AgentId, u32>,
    pub validated: BTreeMap<AgentId, u32>,
    pub completed: BTreeMap<AgentId, u32>,
    pub combined: BTreeMap<AgentId, u32>,
    /// Completed transactions where this agent sold
    pub sold: u32,
    history: VecDeque<f64>,
    history_capacity: usize,
}

impl Wallet {
    pub fn new(initial_reward: f64, history_capacity: usize) -> Self {
        Self {
            reward: initial_reward,
            stake: BTreeMap::new(),
            charity_pool: 0.0,
            wallet_age: 0,
            attempted: BTreeMap::new(),
            validated: BTreeMap::new(),
            completed: BTreeMap::new(),
            combined: BTreeMap::new(),
            sold: 0,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity: history_capacity.max(1),
        }
    }

    /// Sum of the escrow this wallet holds against its sellers.
    pub fn escrow_pot(&self) -> f64 {
        self.stake.values().sum()
    }

    /// Appends a settlement outcome, dropping the oldest past capacity.
    pub fn push_outcome(&mut self, outcome: f64) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(outcome);
    }

    /// Settlement outcomes, oldest first.
    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    fn counter_mut(&mut self, kind: CounterKind) -> &mut BTreeMap<AgentId, u32> {
        match kind {
            CounterKind::Attempted => &mut self.attempted,
            CounterKind::Validated => &mut self.validated,
            CounterKind::Completed => &mut self.completed,
            CounterKind::Combined => &mut self.combined,
        }
    }

    /// Totals of this wallet's counters.
    pub fn counts(&self) -> TransactionCounts {
        let total = |map: &BTreeMap<AgentId, u32>| map.values().sum::<u32>();
        let completed = total(&self.completed);
        TransactionCounts {
            attempted: total(&self.attempted),
            validated: total(&self.validated),
            completed,
            combined: total(&self.combined),
            bought: completed,
            sold: self.sold,
        }
    }
}

/// All wallets of a run, keyed by agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletBook {
    wallets: BTreeMap<AgentId, Wallet>,
}

impl WalletBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a wallet; an existing wallet is left untouched.
    pub fn open(&mut self, id: AgentId, initial_reward: f64, history_capacity: usize) {
        self.wallets
            .entry(id)
            .or_insert_with(|| Wallet::new(initial_reward, history_capacity));
    }

    pub fn get(&self, id: AgentId) -> Result<&Wallet, MarketError> {
        self.wallets.get(&id).ok_or(MarketError::UnknownWallet(id))
    }

    fn get_mut(&mut self, id: AgentId) -> Result<&mut Wallet, MarketError> {
        self.wallets.get_mut(&id).ok_or(MarketError::UnknownWallet(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.wallets.keys().copied()
    }

    pub fn wallets(&self) -> impl Iterator<Item = (AgentId, &Wallet)> {
        self.wallets.iter().map(|(id, w)| (*id, w))
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    fn check_funds(&self, id: AgentId, amount: f64) -> Result<(), MarketError> {
        if amount < 0.0 {
            return Err(MarketError::NegativeAmount(amount));
        }
        let available = self.get(id)?.reward;
        if available < amount {
            return Err(MarketError::InsufficientFunds {
                agent: id,
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    /// Removes `amount` from a wallet's reward.
    pub fn apply_cost(&mut self, id: AgentId, amount: f64) -> Result<(), MarketError> {
        self.check_funds(id, amount)?;
        self.get_mut(id)?.reward -= amount;
        Ok(())
    }

    /// Adds `amount` to a wallet's reward.
    pub fn apply_gains(&mut self, id: AgentId, amount: f64) -> Result<(), MarketError> {
        if amount < 0.0 {
            return Err(MarketError::NegativeAmount(amount));
        }
        self.get_mut(id)?.reward += amount;
        Ok(())
    }

    /// Debits one wallet and credits another by the same amount.
    pub fn transfer(&mut self, from: AgentId, to: AgentId, amount: f64) -> Result<(), MarketError> {
        self.get(to)?;
        self.check_funds(from, amount)?;
        if amount == 0.0 || from == to {
            return Ok(());
        }
        self.get_mut(from)?.reward -= amount;
        self.get_mut(to)?.reward += amount;
        Ok(())
    }

    /// True if `id` could pay `amount` right now.
    pub fn can_afford(&self, id: AgentId, amount: f64) -> bool {
        self.check_funds(id, amount).is_ok()
    }

    /// Moves `amount` of the seller's reward into escrow held by the buyer.
    pub fn escrow(&mut self, buyer: AgentId, seller: AgentId, amount: f64) -> Result<(), MarketError> {
        self.get(buyer)?;
        self.apply_cost(seller, amount)?;
        *self.get_mut(buyer)?.stake.entry(seller).or_insert(0.0) += amount;
        Ok(())
    }

    /// Credits the buyer with all escrow it holds; returns what each seller had posted.
    pub fn release_escrow(&mut self, buyer: AgentId) -> Result<BTreeMap<AgentId, f64>, MarketError> {
        let wallet = self.get_mut(buyer)?;
        let released = std::mem::take(&mut wallet.stake);
        wallet.reward += released.values().sum::<f64>();
        Ok(released)
    }

    /// Stake `seller` currently has outstanding in other wallets.
    pub fn posted_stake(&self, seller: AgentId) -> f64 {
        self.wallets
            .values()
            .filter_map(|w| w.stake.get(&seller))
            .sum()
    }

    pub fn get_reward(&self, id: AgentId) -> Result<f64, MarketError> {
        Ok(self.get(id)?.reward)
    }

    /// Reward plus the stake this agent still has outstanding.
    pub fn get_wealth(&self, id: AgentId) -> Result<f64, MarketError> {
        Ok(self.get(id)?.reward + self.posted_stake(id))
    }

    /// Burns `amount` of reward into the wallet's charity pool.
    pub fn tax(&mut self, id: AgentId, amount: f64) -> Result<(), MarketError> {
        self.apply_cost(id, amount)?;
        self.get_mut(id)?.charity_pool += amount;
        Ok(())
    }

    pub fn increment(&mut self, owner: AgentId, counterparty: AgentId, kind: CounterKind) {
        if let Ok(wallet) = self.get_mut(owner) {
            *wallet.counter_mut(kind).entry(counterparty).or_insert(0) += 1;
        }
    }

    pub fn record_sale(&mut self, seller: AgentId) {
        if let Ok(wallet) = self.get_mut(seller) {
            wallet.sold += 1;
        }
    }

    pub fn push_outcome(&mut self, id: AgentId, outcome: f64) {
        if let Ok(wallet) = self.get_mut(id) {
            wallet.push_outcome(outcome);
        }
    }

    /// Ages every wallet by one tick.
    pub fn age_all(&mut self) {
        for wallet in self.wallets.values_mut() {
            wallet.wallet_age += 1;
        }
    }

    pub fn total_reward(&self) -> f64 {
        self.wallets.values().map(|w| w.reward).sum()
    }

    pub fn total_stake(&self) -> f64 {
        self.wallets.values().map(Wallet::escrow_pot).sum()
    }

    /// Rewards plus outstanding stakes across all wallets.
    pub fn total_holdings(&self) -> f64 {
        self.total_reward() + self.total_stake()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_of(n: u32, reward: f64) -> WalletBook {
        let mut book = WalletBook::new();
        for i in 0..n {
            book.open(AgentId(i), reward, 5);
        }
        book
    }

    #[test]
    fn test_transfer_conserves_total() {
        let mut book = book_of(4, 2.0);
        let before = book.total_holdings();

        book.transfer(AgentId(0), AgentId(1), 1.5).unwrap();
        book.transfer(AgentId(1), AgentId(2), 3.0).unwrap();
        book.transfer(AgentId(3), AgentId(0), 0.25).unwrap();

        assert!((book.total_holdings() - before).abs() < 1e-12);
        assert!((book.get_reward(AgentId(2)).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_transfer_rejects_negative_and_overdraft() {
        let mut book = book_of(2, 1.0);
        assert_eq!(
            book.transfer(AgentId(0), AgentId(1), -0.5),
            Err(MarketError::NegativeAmount(-0.5))
        );
        assert!(matches!(
            book.transfer(AgentId(0), AgentId(1), 1.5),
            Err(MarketError::InsufficientFunds { .. })
        ));
        assert_eq!(book.get_reward(AgentId(0)).unwrap(), 1.0);
        assert_eq!(book.get_reward(AgentId(1)).unwrap(), 1.0);
    }

    #[test]
    fn test_transfer_to_unknown_wallet_leaves_funds() {
        let mut book = book_of(1, 1.0);
        assert_eq!(
            book.transfer(AgentId(0), AgentId(9), 0.5),
            Err(MarketError::UnknownWallet(AgentId(9)))
        );
        assert_eq!(book.get_reward(AgentId(0)).unwrap(), 1.0);
    }

    #[test]
    fn test_escrow_and_release() {
        let mut book = book_of(3, 1.0);
        let before = book.total_holdings();

        book.escrow(AgentId(0), AgentId(1), 0.2).unwrap();
        book.escrow(AgentId(0), AgentId(2), 0.3).unwrap();
        book.escrow(AgentId(0), AgentId(1), 0.1).unwrap();

        assert!((book.get(AgentId(0)).unwrap().escrow_pot() - 0.6).abs() < 1e-12);
        assert!((book.get_wealth(AgentId(1)).unwrap() - 1.0).abs() < 1e-12);
        assert!((book.get_reward(AgentId(1)).unwrap() - 0.7).abs() < 1e-12);
        assert!((book.total_holdings() - before).abs() < 1e-12);

        let released = book.release_escrow(AgentId(0)).unwrap();
        assert!((released[&AgentId(1)] - 0.3).abs() < 1e-12);
        assert!((book.get_reward(AgentId(0)).unwrap() - 1.6).abs() < 1e-12);
        assert_eq!(book.posted_stake(AgentId(1)), 0.0);
        assert!((book.total_holdings() - before).abs() < 1e-12);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut wallet = Wallet::new(0.0, 3);
        for outcome in [1.0, -1.0, 2.0, -2.0] {
            wallet.push_outcome(outcome);
        }
        assert_eq!(wallet.history().iter().copied().collect::<Vec<_>>(), vec![-1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_counts_totals() {
        let mut book = book_of(2, 0.0);
        book.increment(AgentId(0), AgentId(1), CounterKind::Attempted);
        book.increment(AgentId(0), AgentId(1), CounterKind::Attempted);
        book.increment(AgentId(0), AgentId(1), CounterKind::Completed);
        book.record_sale(AgentId(1));

        let buyer = book.get(AgentId(0)).unwrap().counts();
        assert_eq!(buyer.attempted, 2);
        assert_eq!(buyer.bought, 1);
        assert_eq!(book.get(AgentId(1)).unwrap().counts().sold, 1);
    }

    #[test]
    fn test_tax_moves_reward_to_charity() {
        let mut book = book_of(1, 2.0);
        book.tax(AgentId(0), 0.5).unwrap();
        let wallet = book.get(AgentId(0)).unwrap();
        assert_eq!(wallet.reward, 1.5);
        assert_eq!(wallet.charity_pool, 0.5);
    }
}
