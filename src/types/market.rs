use serde::{Deserialize, Serialize};

/// A cached market quote for one instrument, in EUR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Current price in the base currency.
    pub price: f64,
    /// Percent change over the last 24 hours.
    pub change_24h: f64,
}

impl Quote {
    pub fn new(price: f64, change_24h: f64) -> Self {
        Self { price, change_24h }
    }
}

/// A market-wide news event. Notification-only: cached prices are never
/// mutated by events.
#[derive(Debug, Clone, Copy)]
pub struct MarketEvent {
    pub id: &'static str,
    pub message: &'static str,
    /// Multiplicative shock described by the headline.
    pub effect: f64,
    /// Relative weight for the random pick.
    pub weight: u32,
}
