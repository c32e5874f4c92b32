//! Background loops: price refresh, liquidation sweep, economy tick and
//! season housekeeping.
//!
//! Each loop runs on its own interval and absorbs its own errors; one
//! bad run never stops the loop.

use crate::config::Config;
use crate::services::economy::EconomyEngine;
use crate::services::events::EventEngine;
use crate::services::liquidation::LiquidationEngine;
use crate::services::SqliteStore;
use crate::sources::CoinGeckoClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct Scheduler {
    config: Config,
    store: Arc<SqliteStore>,
    quotes: Arc<CoinGeckoClient>,
    liquidation: Arc<LiquidationEngine>,
    economy: Arc<EconomyEngine>,
    events: Arc<EventEngine>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        store: Arc<SqliteStore>,
        quotes: Arc<CoinGeckoClient>,
        liquidation: Arc<LiquidationEngine>,
        economy: Arc<EconomyEngine>,
        events: Arc<EventEngine>,
    ) -> Self {
        Self {
            config,
            store,
            quotes,
            liquidation,
            economy,
            events,
        }
    }

    /// Spawn the fast, economy and daily loops. Returns immediately.
    pub fn start(self: Arc<Self>) {
        let fast = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(fast.config.ticks.fast_ms));
            loop {
                interval.tick().await;
                fast.fast_tick().await;
            }
        });

        let economy = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(economy.config.ticks.economy_ms));
            // First tick fires immediately; skip it so the economy does
            // not run at every restart.
            interval.tick().await;
            loop {
                interval.tick().await;
                economy.economy_tick();
            }
        });

        let daily = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(daily.config.ticks.daily_ms));
            loop {
                interval.tick().await;
                daily.daily_tick();
            }
        });

        info!(
            "Scheduler started (fast {}ms, economy {}ms, daily {}ms)",
            self.config.ticks.fast_ms, self.config.ticks.economy_ms, self.config.ticks.daily_ms
        );
    }

    /// Refresh quotes, then sweep for breached positions at the new
    /// prices.
    async fn fast_tick(&self) {
        self.quotes.refresh().await;

        let swept = self.liquidation.sweep().await;
        if !swept.is_empty() {
            warn!("Liquidated {} position(s) this tick", swept.len());
        }
    }

    fn economy_tick(&self) {
        self.economy.run_tick();

        if let Some(event) = self.events.roll_market_event() {
            info!("Market event fired: {}", event.id);
        }
    }

    /// Season rollover once the configured duration has elapsed.
    fn daily_tick(&self) {
        let now = chrono::Utc::now().timestamp_millis();
        let season_ms = self.config.season_duration_days as i64 * 86_400_000;

        match self.store.season_start() {
            Some(start) => {
                if now - start >= season_ms {
                    match self.store.reset_season_stats() {
                        Ok(()) => info!("Season rolled over, stats reset"),
                        Err(e) => error!("Season reset failed: {}", e),
                    }
                }
            }
            None => {
                if let Err(e) = self.store.set_season_start(now) {
                    error!("Failed to record season start: {}", e);
                } else {
                    info!("Season clock started");
                }
            }
        }
    }
}
