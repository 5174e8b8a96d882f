//! Run Report
//!
//! Flat per-run metrics handed to the external recorder once a run ends.
//!
//! The report is the whole boundary between the engine and any analysis or
//! plotting tooling: final wallets, items collected, heading drift, escrowed
//! stake, periodic evolution samples and transaction counts.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

/// Transaction counters for one agent, split by kind and role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCounts {
    /// Purchases the agent started as a buyer
    pub attempted: u32,
    /// Purchases whose information passed the buyer's quality test
    pub validated: u32,
    /// Purchases that produced a logged transaction
    pub completed: u32,
    /// Purchases that were fused into the buyer's beliefs
    pub combined: u32,
    /// Completed transactions where the agent was the buyer
    pub bought: u32,
    /// Completed transactions where the agent was the seller
    pub sold: u32,
}

impl TransactionCounts {
    /// Adds another set of counters onto this one.
    pub fn accumulate(&mut self, other: &TransactionCounts) {
        self.attempted += other.attempted;
        self.validated += other.validated;
        self.completed += other.completed;
        self.combined += other.combined;
        self.bought += other.bought;
        self.sold += other.sold;
    }
}

/// Final state of one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: u32,
    /// Registry name of the agent's behavior
    pub behavior: String,
    pub reward: f64,
    pub items_collected: u32,
    /// Systematic heading bias in degrees
    pub drift: f64,
    /// Stake this agent still has escrowed against buyers
    pub escrowed_stake: f64,
    #[serde(default)]
    pub transactions: TransactionCounts,
}

/// Reward and item totals of every agent at one sampled tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionSample {
    pub tick: u64,
    /// Rewards indexed like `RunReport::agents`
    pub rewards: Vec<f64>,
    /// Items collected indexed like `RunReport::agents`
    pub items: Vec<u32>,
}

/// Run-wide transaction totals
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TransactionTotals {
    pub counts: TransactionCounts,
    /// Sales refused because the seller had nothing to offer
    pub refused: u32,
    /// Purchases abandoned because a party could not pay
    pub unaffordable: u32,
    /// Settlement rounds cut short by a failed transfer
    pub abandoned_settlements: u32,
}

/// Everything recorded about one finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub seed: u64,
    pub ticks: u64,
    pub payment_system: String,
    pub agents: Vec<AgentRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evolution: Vec<EvolutionSample>,
    #[serde(default)]
    pub transactions: TransactionTotals,
    /// Reward injected by selling foraged items
    pub total_injected: f64,
    /// Reward burned by taxation
    pub total_taxed: f64,
    /// Rewards plus outstanding stakes across all wallets
    pub total_holdings: f64,
}

impl RunReport {
    /// Mean final reward of the agents running the named behavior.
    pub fn mean_reward_of(&self, behavior: &str) -> Option<f64> {
        let rewards: Vec<f64> = self
            .agents
            .iter()
            .filter(|a| a.behavior == behavior)
            .map(|a| a.reward)
            .collect();
        if rewards.is_empty() {
            return None;
        }
        Some(rewards.iter().sum::<f64>() / rewards.len() as f64)
    }

    /// Total items delivered by the whole swarm.
    pub fn total_items(&self) -> u32 {
        self.agents.iter().map(|a| a.items_collected).sum()
    }

    /// Serializes the report to pretty JSON.
    pub fn to_json(&self) -> Result<String, ReportError> {
        serde_json::to_string_pretty(self).map_err(ReportError::Json)
    }

    /// Parses a report from JSON.
    pub fn from_json(content: &str) -> Result<Self, ReportError> {
        serde_json::from_str(content).map_err(ReportError::Json)
    }

    /// Writes the report to a JSON file, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(ReportError::Io)?;
            }
        }
        let file = File::create(path).map_err(ReportError::Io)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).map_err(ReportError::Json)?;
        Ok(())
    }

    /// Reads a report back from a JSON file.
    pub fn read_from(path: &Path) -> Result<Self, ReportError> {
        let content = fs::read_to_string(path).map_err(ReportError::Io)?;
        Self::from_json(&content)
    }
}

/// Errors that can occur while exporting a report.
#[derive(Debug)]
pub enum ReportError {
    /// I/O error (file operations)
    Io(std::io::Error),
    /// JSON serialization error
    Json(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "I/O error: {}", e),
            ReportError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io(e) => Some(e),
            ReportError::Json(e) => Some(e),
        }
    }
}
