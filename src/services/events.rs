//! Random event tables and the broadcast market event roll.
//!
//! Catalogs are plain data consumed by one weighted pick helper; adding
//! an event means adding a row, not a branch.

use crate::services::{Notifier, SqliteStore};
use crate::types::{MarketEvent, PropertyEvent};
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info};

/// Market-wide news headlines. Notification-only: they describe a shock
/// but never mutate cached prices.
pub const MARKET_EVENTS: &[MarketEvent] = &[
    MarketEvent {
        id: "bull_run",
        message: "🚀 BREAKING: A major investment bank now accepts BTC!",
        effect: 1.15,
        weight: 3,
    },
    MarketEvent {
        id: "exchange_hack",
        message: "📉 PANIC: A large exchange has been hacked!",
        effect: 0.80,
        weight: 2,
    },
    MarketEvent {
        id: "billionaire_meme",
        message: "🐦 A tech billionaire posts a meme. Charts are spinning!",
        effect: 1.05,
        weight: 5,
    },
];

/// Things that can happen to an owned property during a maintenance roll.
pub const PROPERTY_EVENTS: &[PropertyEvent] = &[
    PropertyEvent {
        id: "water_damage",
        title: "🌊 Water damage!",
        cost_range: (500, 2_000),
        condition_delta: -15,
        weight: 3,
    },
    PropertyEvent {
        id: "good_tenant",
        title: "💎 Model tenant!",
        cost_range: (0, 0),
        condition_delta: 5,
        weight: 2,
    },
    PropertyEvent {
        id: "tax_audit",
        title: "⚖️ Tax audit!",
        cost_range: (1_000, 5_000),
        condition_delta: 0,
        weight: 1,
    },
];

/// Pick one entry with probability proportional to its weight.
/// Zero-weight entries are never picked; returns None for an empty or
/// all-zero table.
pub fn weighted_pick<'a, T>(
    rng: &mut impl Rng,
    items: &'a [T],
    weight_of: impl Fn(&T) -> u32,
) -> Option<&'a T> {
    let total: u64 = items.iter().map(|item| weight_of(item) as u64).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for item in items {
        let weight = weight_of(item) as u64;
        if roll < weight {
            return Some(item);
        }
        roll -= weight;
    }
    None
}

/// Rolls and broadcasts market-wide events.
pub struct EventEngine {
    store: Arc<SqliteStore>,
    notifier: Notifier,
    /// Chance of a market event per economy tick.
    chance: f64,
}

impl EventEngine {
    pub fn new(store: Arc<SqliteStore>, notifier: Notifier, chance: f64) -> Self {
        Self {
            store,
            notifier,
            chance,
        }
    }

    /// Roll for a market event and, on a hit, fan the headline out to
    /// every known player. Returns the triggered event, if any.
    pub fn roll_market_event(&self) -> Option<&'static MarketEvent> {
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() >= self.chance {
            return None;
        }

        let event = weighted_pick(&mut rng, MARKET_EVENTS, |e| e.weight)?;
        info!("Market event triggered: {}", event.id);

        let user_ids = match self.store.all_profile_ids() {
            Ok(ids) => ids,
            Err(e) => {
                error!("Market event broadcast skipped, profile query failed: {}", e);
                return Some(event);
            }
        };

        let text = format!("📢 **NEWS UPDATE**\n\n{}", event.message);
        self.notifier.broadcast(&user_ids, &text);
        Some(event)
    }
}
