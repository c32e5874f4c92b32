//! Liquidation engine.
//!
//! Runs after every price refresh: compares each open position's live
//! price against its `1/leverage` drop threshold and forcibly closes
//! breached positions. Checks are independent per position; a failure on
//! one (persistence, notification) is logged and the sweep continues.

use crate::services::{Notifier, PositionLedger, PriceCache, SqliteStore};
use crate::types::{Position, TxKind};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Liquidation engine errors.
#[derive(Debug, Error)]
pub enum LiquidationError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Trading error: {0}")]
    Trading(#[from] crate::services::TradingError),
}

impl From<rusqlite::Error> for LiquidationError {
    fn from(e: rusqlite::Error) -> Self {
        LiquidationError::Database(e.to_string())
    }
}

/// A completed forced closure.
#[derive(Debug, Clone)]
pub struct Liquidation {
    pub user_id: i64,
    pub coin_id: String,
    /// Price that breached the threshold.
    pub trigger_price: f64,
    /// Realized loss: the original cash stake.
    pub loss: f64,
}

/// Margin-call monitor over the position ledger.
pub struct LiquidationEngine {
    store: Arc<SqliteStore>,
    ledger: Arc<PositionLedger>,
    cache: Arc<PriceCache>,
    notifier: Notifier,
}

impl LiquidationEngine {
    pub fn new(
        store: Arc<SqliteStore>,
        ledger: Arc<PositionLedger>,
        cache: Arc<PriceCache>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            ledger,
            cache,
            notifier,
        }
    }

    /// Sweep all open positions against the current cache snapshot.
    /// Positions in instruments with no quote are skipped, not failed;
    /// a failed liquidation leaves its position for the next sweep.
    pub async fn sweep(&self) -> Vec<Liquidation> {
        let quotes = self.cache.get_all();
        let positions = match self.store.open_positions() {
            Ok(positions) => positions,
            Err(e) => {
                error!("Liquidation sweep skipped, position query failed: {}", e);
                return Vec::new();
            }
        };

        let mut liquidations = Vec::new();
        for position in positions {
            let Some(quote) = quotes.get(&position.coin_id) else {
                debug!(
                    "No quote for {}, skipping position {}",
                    position.coin_id, position.id
                );
                continue;
            };

            if !position.is_breached(quote.price) {
                continue;
            }

            match self.liquidate(&position, quote.price).await {
                Ok(Some(liquidation)) => liquidations.push(liquidation),
                Ok(None) => {} // closed concurrently, nothing to record
                Err(e) => {
                    // Retried on the next scheduled sweep.
                    error!("Liquidation of position {} failed: {}", position.id, e);
                }
            }
        }

        if !liquidations.is_empty() {
            info!("Liquidation sweep closed {} positions", liquidations.len());
        }
        liquidations
    }

    async fn liquidate(
        &self,
        position: &Position,
        trigger_price: f64,
    ) -> Result<Option<Liquidation>, LiquidationError> {
        let loss = self.ledger.force_close(position).await?;
        if loss <= 0.0 {
            return Ok(None);
        }

        self.store.record_season_pnl(position.user_id, -loss)?;
        self.store.log_transaction(
            position.user_id,
            TxKind::Liquidation,
            -loss,
            &format!("LIQUIDATION: {}", position.coin_id.to_uppercase()),
        )?;

        // Fire-and-forget: a blocked recipient must not abort the sweep.
        self.notifier.send(
            position.user_id,
            format!(
                "🚨 **MARGIN CALL / LIQUIDATION** 🚨\n\n\
                 Your **{}** position was force-closed after the price \
                 dropped too far.\n\nLoss: `-{:.2} €`",
                position.coin_id.to_uppercase(),
                loss
            ),
        );

        info!(
            "Liquidated position {} for user {} at {} (loss {:.2})",
            position.id, position.user_id, trigger_price, loss
        );

        Ok(Some(Liquidation {
            user_id: position.user_id,
            coin_id: position.coin_id.clone(),
            trigger_price,
            loss,
        }))
    }
}
