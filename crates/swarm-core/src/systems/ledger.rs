//! Bookkeeping Systems
//!
//! Wallet aging at the start of a tick, the market phase and the clock at
//! the end of it.

use bevy_ecs::prelude::*;

use crate::components::world::SimClock;
use crate::ledger::PaymentDatabase;
use crate::market::pricing::Market;

/// System: age every wallet by one tick
pub fn age_wallets(mut ledger: ResMut<PaymentDatabase>) {
    ledger.age_wallets();
}

/// System: restore market demand
pub fn advance_market(mut market: ResMut<Market>) {
    market.advance();
}

/// System: move to the next tick
pub fn advance_clock(mut clock: ResMut<SimClock>) {
    clock.advance();
}
