//! Settlement Ledger
//!
//! The payment and reputation database: every wallet of the run plus the
//! active settlement policy.
//!
//! Money only enters through `pay_reward` and only leaves through taxation.
//! Everything else (fees, escrow, redistribution) moves it between wallets.

pub mod policy;
pub mod reputation;
pub mod wallet;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use swarm_events::TransactionCounts;

use crate::components::agent::AgentId;
use crate::error::{ConfigError, MarketError};
use crate::market::transaction::Transaction;

pub use policy::{
    alikeness_scores, DelayedPayment, OutlierPenalisation, SettlementOutcome, SettlementPolicy,
};
pub use reputation::{history_score, ReputationMetric, StakeSchedule};
pub use wallet::{CounterKind, Wallet, WalletBook};

/// Which settlement policy runs the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSystem {
    #[default]
    OutlierPenalisation,
    DelayedPayment,
}

/// Payment parameters (the `[payment]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub system: PaymentSystem,
    pub initial_reward: f64,
    /// Fraction of each realized reward handed to information sellers
    pub information_share: f64,
    pub base_stake: f64,
    /// Paid buyer to seller at transaction time
    pub transaction_fee: f64,
    /// Scale stakes by the seller's history reputation
    pub reputation_stake: bool,
    pub reputation_metric: ReputationMetric,
    pub history_length: usize,
    pub stake_penalty_slope: f64,
    pub stake_floor: f64,
    pub stake_ceiling: f64,
    /// Full width of the agreement window, degrees
    pub alikeness_window: f64,
    pub tax_rate: f64,
    pub age_decay: f64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            system: PaymentSystem::OutlierPenalisation,
            initial_reward: 3.0,
            information_share: 0.3,
            base_stake: 0.05,
            transaction_fee: 0.0,
            reputation_stake: true,
            reputation_metric: ReputationMetric::Difference,
            history_length: 10,
            stake_penalty_slope: 1.0,
            stake_floor: 1.0,
            stake_ceiling: 3.0,
            alikeness_window: 30.0,
            tax_rate: 0.0,
            age_decay: 0.9,
        }
    }
}

impl PaymentConfig {
    pub fn stake_schedule(&self) -> StakeSchedule {
        StakeSchedule {
            enabled: self.reputation_stake,
            metric: self.reputation_metric,
            slope: self.stake_penalty_slope,
            floor: self.stake_floor,
            ceiling: self.stake_ceiling,
            age_decay: self.age_decay,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("payment.{} must be in [0, 1], got {}", name, v)))
            }
        };
        fraction("information_share", self.information_share)?;
        fraction("tax_rate", self.tax_rate)?;
        fraction("age_decay", self.age_decay)?;
        for (name, v) in [
            ("initial_reward", self.initial_reward),
            ("base_stake", self.base_stake),
            ("transaction_fee", self.transaction_fee),
            ("stake_penalty_slope", self.stake_penalty_slope),
        ] {
            if v < 0.0 || !v.is_finite() {
                return Err(ConfigError::Invalid(format!("payment.{} must be non-negative", name)));
            }
        }
        if self.stake_floor <= 0.0 || self.stake_ceiling < self.stake_floor {
            return Err(ConfigError::Invalid(
                "payment.stake_floor must be positive and not above stake_ceiling".to_string(),
            ));
        }
        if self.history_length == 0 {
            return Err(ConfigError::Invalid("payment.history_length must be at least 1".to_string()));
        }
        if !(0.0..=360.0).contains(&self.alikeness_window) {
            return Err(ConfigError::Invalid(
                "payment.alikeness_window must be within [0, 360] degrees".to_string(),
            ));
        }
        Ok(())
    }

    fn build_policy(&self) -> Box<dyn SettlementPolicy> {
        match self.system {
            PaymentSystem::OutlierPenalisation => Box::new(OutlierPenalisation::new(
                self.base_stake,
                self.information_share,
                self.alikeness_window,
                self.stake_schedule(),
            )),
            PaymentSystem::DelayedPayment => {
                Box::new(DelayedPayment::new(self.base_stake, self.information_share))
            }
        }
    }
}

/// Resource: all wallets and the active settlement policy
#[derive(Resource)]
pub struct PaymentDatabase {
    book: WalletBook,
    policy: Box<dyn SettlementPolicy>,
    config: PaymentConfig,
    total_injected: f64,
    total_taxed: f64,
    refused: u32,
    unaffordable: u32,
    abandoned_settlements: u32,
}

impl PaymentDatabase {
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            book: WalletBook::new(),
            policy: config.build_policy(),
            config,
            total_injected: 0.0,
            total_taxed: 0.0,
            refused: 0,
            unaffordable: 0,
            abandoned_settlements: 0,
        }
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Opens a wallet holding the initial reward.
    pub fn register(&mut self, id: AgentId) {
        self.book
            .open(id, self.config.initial_reward, self.config.history_length);
    }

    pub fn book(&self) -> &WalletBook {
        &self.book
    }

    pub fn wallet(&self, id: AgentId) -> Result<&Wallet, MarketError> {
        self.book.get(id)
    }

    pub fn apply_cost(&mut self, id: AgentId, amount: f64) -> Result<(), MarketError> {
        self.book.apply_cost(id, amount)
    }

    pub fn apply_gains(&mut self, id: AgentId, amount: f64) -> Result<(), MarketError> {
        self.book.apply_gains(id, amount)
    }

    pub fn transfer(&mut self, from: AgentId, to: AgentId, amount: f64) -> Result<(), MarketError> {
        self.book.transfer(from, to, amount)
    }

    /// Injects a realized forage reward, burning the taxed part into charity.
    pub fn pay_reward(&mut self, id: AgentId, reward: f64) -> Result<(), MarketError> {
        self.book.apply_gains(id, reward)?;
        self.total_injected += reward;
        let tax = self.config.tax_rate * reward;
        if tax > 0.0 {
            self.book.tax(id, tax)?;
            self.total_taxed += tax;
        }
        Ok(())
    }

    /// Runs the settlement policy for the earner's pending purchases.
    pub fn pay_creditors(&mut self, id: AgentId, reward: f64) -> SettlementOutcome {
        let outcome = self.policy.new_reward(reward, &mut self.book, id);
        if outcome.abandoned {
            self.abandoned_settlements += 1;
        }
        outcome
    }

    /// Logs a purchase: the fee is checked first, then the policy records it, then the fee moves.
    pub fn new_transaction(&mut self, transaction: Transaction) -> Result<(), MarketError> {
        let result = self.log_transaction(transaction);
        if matches!(result, Err(MarketError::InsufficientFunds { .. })) {
            self.unaffordable += 1;
        }
        result
    }

    fn log_transaction(&mut self, transaction: Transaction) -> Result<(), MarketError> {
        let fee = self.config.transaction_fee;
        let buyer = transaction.buyer_id;
        let seller = transaction.seller_id;
        if !self.book.can_afford(buyer, fee) {
            return Err(MarketError::InsufficientFunds {
                agent: buyer,
                needed: fee,
                available: self.book.get_reward(buyer)?,
            });
        }
        self.policy.new_transaction(transaction, &mut self.book)?;
        self.book.transfer(buyer, seller, fee)?;
        self.book.increment(buyer, seller, CounterKind::Completed);
        self.book.record_sale(seller);
        tracing::trace!(%buyer, %seller, location = %transaction.location, "transaction logged");
        Ok(())
    }

    pub fn pending(&self, buyer: AgentId) -> &[Transaction] {
        self.policy.pending(buyer)
    }

    pub fn record(&mut self, owner: AgentId, counterparty: AgentId, kind: CounterKind) {
        self.book.increment(owner, counterparty, kind);
    }

    /// Counts a seller that withheld information.
    pub fn record_refusal(&mut self) {
        self.refused += 1;
    }

    pub fn get_reward(&self, id: AgentId) -> Result<f64, MarketError> {
        self.book.get_reward(id)
    }

    pub fn get_wealth(&self, id: AgentId) -> Result<f64, MarketError> {
        self.book.get_wealth(id)
    }

    /// Escrow the agent currently holds against its sellers.
    pub fn escrow_pot(&self, id: AgentId) -> Result<f64, MarketError> {
        Ok(self.book.get(id)?.escrow_pot())
    }

    pub fn history_reputation(&self, id: AgentId, metric: ReputationMetric) -> Result<f64, MarketError> {
        let wallet = self.book.get(id)?;
        Ok(history_score(wallet.history(), metric, self.config.age_decay))
    }

    /// Standing of an agent under the given metric; higher is better.
    pub fn reputation(&self, id: AgentId, metric: ReputationMetric) -> Result<f64, MarketError> {
        match metric {
            ReputationMetric::Reward => self.get_reward(id),
            ReputationMetric::Wealth => self.get_wealth(id),
            _ => self.history_reputation(id, metric),
        }
    }

    /// Zero-based rank among all wallets, best first; ties go to the lower id.
    pub fn rank(&self, id: AgentId, metric: ReputationMetric) -> Result<usize, MarketError> {
        let own = self.reputation(id, metric)?;
        let better = self
            .book
            .ids()
            .filter(|other| *other != id)
            .filter_map(|other| self.reputation(other, metric).ok().map(|score| (other, score)))
            .filter(|(other, score)| *score > own || (*score == own && *other < id))
            .count();
        Ok(better)
    }

    /// Fraction of the population at or above this agent, in (0, 1].
    pub fn top_fraction(&self, id: AgentId, metric: ReputationMetric) -> Result<f64, MarketError> {
        let rank = self.rank(id, metric)?;
        Ok((rank + 1) as f64 / self.book.len().max(1) as f64)
    }

    pub fn reputation_stake_coeff(&self, id: AgentId) -> Result<f64, MarketError> {
        let wallet = self.book.get(id)?;
        Ok(self.config.stake_schedule().coefficient_for(wallet.history()))
    }

    pub fn age_wallets(&mut self) {
        self.book.age_all();
    }

    pub fn counts(&self, id: AgentId) -> Result<TransactionCounts, MarketError> {
        Ok(self.book.get(id)?.counts())
    }

    /// Rewards plus outstanding escrow across all wallets.
    pub fn total_holdings(&self) -> f64 {
        self.book.total_holdings()
    }

    pub fn total_charity(&self) -> f64 {
        self.book.wallets().map(|(_, w)| w.charity_pool).sum()
    }

    pub fn total_injected(&self) -> f64 {
        self.total_injected
    }

    pub fn total_taxed(&self) -> f64 {
        self.total_taxed
    }

    pub fn refused(&self) -> u32 {
        self.refused
    }

    pub fn unaffordable(&self) -> u32 {
        self.unaffordable
    }

    pub fn abandoned_settlements(&self) -> u32 {
        self.abandoned_settlements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_events::Location;

    fn database(config: PaymentConfig, n: u32) -> PaymentDatabase {
        let mut db = PaymentDatabase::new(config);
        for i in 0..n {
            db.register(AgentId(i));
        }
        db
    }

    #[test]
    fn test_conservation_under_transfers() {
        let mut db = database(PaymentConfig::default(), 5);
        let before = db.total_holdings();
        for i in 0..20u32 {
            let from = AgentId(i % 5);
            let to = AgentId((i * 3 + 1) % 5);
            let _ = db.transfer(from, to, 0.4 + (i as f64) * 0.1);
        }
        assert!((db.total_holdings() - before).abs() < 1e-9);
    }

    #[test]
    fn test_reward_injection_and_tax() {
        let config = PaymentConfig {
            tax_rate: 0.1,
            ..PaymentConfig::default()
        };
        let mut db = database(config, 2);
        let before = db.total_holdings();
        db.pay_reward(AgentId(0), 2.0).unwrap();

        assert!((db.total_holdings() - (before + 2.0 - 0.2)).abs() < 1e-12);
        assert!((db.total_charity() - 0.2).abs() < 1e-12);
        assert_eq!(db.total_injected(), 2.0);
        assert!((db.total_taxed() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_zero_sum_settlement() {
        let mut db = database(PaymentConfig::default(), 4);
        for (seller, angle) in [(1, 10.0), (2, 12.0), (3, 190.0)] {
            db.new_transaction(Transaction::new(AgentId(0), AgentId(seller), Location::Nest, angle, 1))
                .unwrap();
        }
        let before = db.total_holdings();
        db.pay_reward(AgentId(0), 1.5).unwrap();
        let outcome = db.pay_creditors(AgentId(0), 1.5);

        let s = db.config().information_share;
        assert!((outcome.distributed() - (outcome.pot + s * 1.5)).abs() < 1e-9);
        assert!((db.total_holdings() - (before + 1.5)).abs() < 1e-9);
        assert!(db.pending(AgentId(0)).is_empty());
    }

    #[test]
    fn test_fee_is_all_or_nothing() {
        let config = PaymentConfig {
            transaction_fee: 5.0,
            ..PaymentConfig::default()
        };
        let mut db = database(config, 2);
        let tx = Transaction::new(AgentId(0), AgentId(1), Location::Food, 0.0, 1);
        assert!(matches!(
            db.new_transaction(tx),
            Err(MarketError::InsufficientFunds { agent: AgentId(0), .. })
        ));
        assert_eq!(db.escrow_pot(AgentId(0)).unwrap(), 0.0);
        assert_eq!(db.get_reward(AgentId(1)).unwrap(), 3.0);
        assert!(db.pending(AgentId(0)).is_empty());
        assert_eq!(db.counts(AgentId(0)).unwrap().completed, 0);
        assert_eq!(db.unaffordable(), 1);
    }

    #[test]
    fn test_fee_moves_to_seller() {
        let config = PaymentConfig {
            transaction_fee: 0.5,
            ..PaymentConfig::default()
        };
        let mut db = database(config, 2);
        db.new_transaction(Transaction::new(AgentId(0), AgentId(1), Location::Food, 0.0, 1))
            .unwrap();
        assert!((db.get_reward(AgentId(0)).unwrap() - 2.5).abs() < 1e-12);
        // Seller gained the fee and posted the base stake
        assert!((db.get_reward(AgentId(1)).unwrap() - 3.45).abs() < 1e-12);
        assert!((db.get_wealth(AgentId(1)).unwrap() - 3.5).abs() < 1e-12);
        assert_eq!(db.counts(AgentId(0)).unwrap().bought, 1);
        assert_eq!(db.counts(AgentId(1)).unwrap().sold, 1);
    }

    #[test]
    fn test_rank_and_top_fraction() {
        let mut db = database(PaymentConfig::default(), 4);
        db.pay_reward(AgentId(2), 5.0).unwrap();
        db.pay_reward(AgentId(3), 1.0).unwrap();

        assert_eq!(db.rank(AgentId(2), ReputationMetric::Reward).unwrap(), 0);
        assert_eq!(db.rank(AgentId(3), ReputationMetric::Reward).unwrap(), 1);
        assert_eq!(db.rank(AgentId(0), ReputationMetric::Reward).unwrap(), 2);
        assert_eq!(db.rank(AgentId(1), ReputationMetric::Reward).unwrap(), 3);
        assert!((db.top_fraction(AgentId(2), ReputationMetric::Reward).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_wallet() {
        let db = database(PaymentConfig::default(), 1);
        assert_eq!(db.get_reward(AgentId(7)), Err(MarketError::UnknownWallet(AgentId(7))));
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let config = PaymentConfig {
            information_share: 1.5,
            ..PaymentConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PaymentConfig::default().validate().is_ok());
    }
}
