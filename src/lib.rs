//! Magnate - Economic engine for a crypto tycoon game
//!
//! Quotes flow in from CoinGecko, players trade leveraged spot positions
//! against a cash ledger, and a property economy pays rent on the side.
//! A small HTTP API handles player registration and exposes prices,
//! portfolios and leaderboards.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use config::Config;
use services::{PositionLedger, PriceCache, SqliteStore};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub price_cache: Arc<PriceCache>,
    pub ledger: Arc<PositionLedger>,
}
