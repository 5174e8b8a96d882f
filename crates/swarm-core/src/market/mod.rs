//! Information Market
//!
//! Transactions, the per-buyer communication session and item pricing.

pub mod pricing;
pub mod session;
pub mod transaction;

pub use pricing::{DemandCurve, Market, MarketConfig, PricingModel};
pub use session::{CommunicationSession, InfoMetadata, InformationMode, Purchase, SellerView};
pub use transaction::Transaction;
