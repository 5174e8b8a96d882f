//! Output Systems
//!
//! Periodic statistics and the final run report.

pub mod stats;

pub use stats::{build_report, record_stats, StatsCollector};
