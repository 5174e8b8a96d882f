//! Selling policies

use serde::{Deserialize, Serialize};
use swarm_events::Location;

use crate::navigation::{NavigationTable, Target};

/// What an agent hands over when asked for information
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SalePolicy {
    Honest,
    /// Sells its belief rotated by a fixed angle, in degrees
    Saboteur { rotation: f64 },
    /// Never sells
    FreeRider,
}

impl SalePolicy {
    /// Copy of the belief to sell; the stored belief is never touched.
    pub fn sell_info(&self, navigation: &NavigationTable, location: Location) -> Option<Target> {
        let target = navigation.get(location);
        if !target.valid {
            return None;
        }
        match self {
            SalePolicy::Honest => Some(target),
            SalePolicy::Saboteur { rotation } => Some(target.rotated(*rotation)),
            SalePolicy::FreeRider => None,
        }
    }

    pub fn is_honest(&self) -> bool {
        matches!(self, SalePolicy::Honest)
    }
}
