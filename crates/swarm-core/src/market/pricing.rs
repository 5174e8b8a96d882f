//! Market Pricing
//!
//! The price a delivered item fetches, driven by a simple demand level.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pure price function of the current demand
pub trait PricingModel: Send + Sync {
    fn price(&self, demand: f64) -> f64;
}

/// `base_price * max(min_fraction, demand / max_demand)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandCurve {
    pub base_price: f64,
    pub max_demand: f64,
    pub min_price_fraction: f64,
}

impl PricingModel for DemandCurve {
    fn price(&self, demand: f64) -> f64 {
        let fraction = if self.max_demand > 0.0 {
            (demand / self.max_demand).min(1.0)
        } else {
            1.0
        };
        self.base_price * fraction.max(self.min_price_fraction)
    }
}

/// Market parameters (the `[market]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub base_price: f64,
    /// Demand restored every market phase
    pub demand_per_tick: f64,
    pub max_demand: f64,
    pub min_price_fraction: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_price: 1.0,
            demand_per_tick: 0.05,
            max_demand: 10.0,
            min_price_fraction: 0.1,
        }
    }
}

impl MarketConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_price < 0.0 || self.demand_per_tick < 0.0 || self.max_demand <= 0.0 {
            return Err(ConfigError::Invalid(
                "market prices and demand must be non-negative, max_demand positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_price_fraction) {
            return Err(ConfigError::Invalid(
                "market.min_price_fraction must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resource: demand level and the pricing model applied to it
#[derive(Resource)]
pub struct Market {
    model: Box<dyn PricingModel>,
    demand: f64,
    demand_per_tick: f64,
    max_demand: f64,
    items_sold: u64,
}

impl Market {
    /// Demand starts saturated.
    pub fn new(config: &MarketConfig) -> Self {
        Self::with_model(
            Box::new(DemandCurve {
                base_price: config.base_price,
                max_demand: config.max_demand,
                min_price_fraction: config.min_price_fraction,
            }),
            config,
        )
    }

    pub fn with_model(model: Box<dyn PricingModel>, config: &MarketConfig) -> Self {
        Self {
            model,
            demand: config.max_demand,
            demand_per_tick: config.demand_per_tick,
            max_demand: config.max_demand,
            items_sold: 0,
        }
    }

    pub fn current_price(&self) -> f64 {
        self.model.price(self.demand)
    }

    pub fn demand(&self) -> f64 {
        self.demand
    }

    pub fn items_sold(&self) -> u64 {
        self.items_sold
    }

    /// Sells one item at the current price and consumes one unit of demand.
    pub fn sell(&mut self) -> f64 {
        let price = self.current_price();
        self.demand = (self.demand - 1.0).max(0.0);
        self.items_sold += 1;
        price
    }

    /// Restores demand at the end of a tick.
    pub fn advance(&mut self) {
        self.demand = (self.demand + self.demand_per_tick).min(self.max_demand);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demand_curve_floor() {
        let curve = DemandCurve {
            base_price: 2.0,
            max_demand: 10.0,
            min_price_fraction: 0.1,
        };
        assert_eq!(curve.price(10.0), 2.0);
        assert_eq!(curve.price(5.0), 1.0);
        assert!((curve.price(0.0) - 0.2).abs() < 1e-12);
        assert_eq!(curve.price(50.0), 2.0);
    }

    #[test]
    fn test_selling_depletes_and_advance_restores() {
        let config = MarketConfig::default();
        let mut market = Market::new(&config);
        let first = market.sell();
        let second = market.sell();
        assert_eq!(first, 1.0);
        assert!(second < first);
        assert_eq!(market.items_sold(), 2);

        for _ in 0..100 {
            market.advance();
        }
        assert_eq!(market.demand(), config.max_demand);
    }
}
