//! Position ledger: CRUD over open leveraged positions plus the paired
//! balance adjustments that must never be observably separated from
//! them.
//!
//! Compound read-modify-write sequences (the volume-weighted entry price
//! update on a re-buy) run under a per-owner async mutex held across the
//! read and the write. Two near-simultaneous buys of the same instrument
//! by the same player therefore serialize instead of both computing an
//! average against the same stale quantity.

use crate::services::{trade_math, SqliteStore};
use crate::types::{Position, SellOutcome, TxKind};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Trading errors surfaced to the chat layer.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("Insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: f64, held: f64 },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(f64),

    #[error("Invalid leverage: {0}")]
    InvalidLeverage(u32),

    #[error("Leverage is fixed at position open: requested {requested}x, open position is {open}x")]
    LeverageMismatch { requested: u32, open: u32 },

    #[error("Unknown player: {0}")]
    UnknownUser(i64),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for TradingError {
    fn from(e: rusqlite::Error) -> Self {
        TradingError::Database(e.to_string())
    }
}

/// Ledger of open leveraged positions.
pub struct PositionLedger {
    store: Arc<SqliteStore>,
    /// Per-owner serialization points for compound position updates.
    owner_locks: DashMap<i64, Arc<Mutex<()>>>,
    fee_rate: f64,
}

impl PositionLedger {
    pub fn new(store: Arc<SqliteStore>, fee_rate: f64) -> Self {
        Self {
            store,
            owner_locks: DashMap::new(),
            fee_rate,
        }
    }

    fn owner_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.owner_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Open a position or add to an existing one.
    ///
    /// `quantity` is the leveraged notional bought at `fill_price`; the
    /// cash debited is the stake (`quantity * fill_price / leverage`)
    /// plus the fee on it. On a re-buy the entry price becomes the
    /// volume-weighted average and the added stake accumulates; the
    /// leverage chosen at open time is fixed for the position's life.
    pub async fn open_or_increase(
        &self,
        user_id: i64,
        coin_id: &str,
        quantity: f64,
        fill_price: f64,
        leverage: u32,
    ) -> Result<Position, TradingError> {
        let quantity = trade_math::round_lot(quantity);
        if quantity <= 0.0 || !fill_price.is_finite() || fill_price <= 0.0 {
            return Err(TradingError::InvalidQuantity(quantity));
        }
        if leverage < 1 {
            return Err(TradingError::InvalidLeverage(leverage));
        }

        let lock = self.owner_lock(user_id);
        let _guard = lock.lock().await;

        let existing = self.store.get_position(user_id, coin_id);
        if let Some(ref pos) = existing {
            if pos.leverage != leverage {
                return Err(TradingError::LeverageMismatch {
                    requested: leverage,
                    open: pos.leverage,
                });
            }
        }

        // The fee is charged on the cash stake, not the leveraged
        // notional; for 1x this is the plain subtotal * fee_rate.
        let stake = quantity * fill_price / leverage as f64;
        let fee = stake * self.fee_rate;
        let total_cost = stake + fee;

        let position = match existing {
            Some(mut pos) => {
                let new_quantity = pos.quantity + quantity;
                pos.entry_price = (pos.quantity * pos.entry_price + quantity * fill_price)
                    / new_quantity;
                pos.quantity = new_quantity;
                pos.stake_cash += stake;
                pos
            }
            None => Position::open(
                user_id,
                coin_id.to_string(),
                quantity,
                fill_price,
                leverage,
                stake,
            ),
        };

        // Debit and position write commit together or not at all.
        if !self.store.execute_buy(total_cost, fee, &position)? {
            let available = self
                .store
                .get_profile(user_id)
                .ok_or(TradingError::UnknownUser(user_id))?
                .balance;
            return Err(TradingError::InsufficientFunds {
                needed: total_cost,
                available,
            });
        }

        self.store.log_transaction(
            user_id,
            TxKind::BuyCrypto,
            -total_cost,
            &format!("Bought {} {} at {:.2}", quantity, coin_id.to_uppercase(), fill_price),
        )?;

        debug!(
            "Buy: user {} {} {} at {} ({}x, stake {:.2})",
            user_id, quantity, coin_id, fill_price, leverage, stake
        );
        Ok(position)
    }

    /// Sell part or all of a position at `fill_price`.
    ///
    /// Fails with `InsufficientHoldings` (mutating nothing) if more is
    /// requested than held. The cash credited is the released stake plus
    /// the leveraged P&L on the sold notional, minus the fee; for 1x
    /// positions that reduces to `quantity * price - fee`. A position
    /// sold down to zero is deleted, not stored empty.
    pub async fn reduce_or_close(
        &self,
        user_id: i64,
        coin_id: &str,
        quantity: f64,
        fill_price: f64,
    ) -> Result<SellOutcome, TradingError> {
        let quantity = trade_math::round_lot(quantity);
        if quantity <= 0.0 || !fill_price.is_finite() || fill_price <= 0.0 {
            return Err(TradingError::InvalidQuantity(quantity));
        }

        let lock = self.owner_lock(user_id);
        let _guard = lock.lock().await;

        let pos = self.store.get_position(user_id, coin_id).ok_or(
            TradingError::InsufficientHoldings {
                requested: quantity,
                held: 0.0,
            },
        )?;
        if quantity > pos.quantity {
            return Err(TradingError::InsufficientHoldings {
                requested: quantity,
                held: pos.quantity,
            });
        }

        let quote = trade_math::quote_trade(quantity, fill_price, self.fee_rate);
        let sold_fraction = quantity / pos.quantity;
        let stake_released = pos.stake_cash * sold_fraction;
        let pnl = (fill_price - pos.entry_price) * quantity;
        // A breached position should have been liquidated first, but a
        // price gap inside one tick can still push this below zero.
        let payout = (stake_released + pnl - quote.fee).max(0.0);
        let realized_pnl = pnl - quote.fee;

        let now = chrono::Utc::now().timestamp_millis();
        let volume_credit =
            quote.subtotal * trade_math::eligible_volume_weight(pos.opened_at, now);

        let remaining_quantity = trade_math::round_lot(pos.quantity - quantity);
        let remaining = if remaining_quantity <= 0.0 {
            None
        } else {
            let mut updated = pos.clone();
            updated.quantity = remaining_quantity;
            updated.stake_cash = pos.stake_cash - stake_released;
            Some(updated)
        };

        // Credit, season P&L and the position change commit together.
        self.store.execute_sell(
            user_id,
            payout,
            quote.fee,
            volume_credit,
            realized_pnl,
            &pos.id,
            remaining.as_ref(),
        )?;

        self.store.log_transaction(
            user_id,
            TxKind::SellCrypto,
            payout,
            &format!("Sold {} {} at {:.2}", quantity, coin_id.to_uppercase(), fill_price),
        )?;

        debug!(
            "Sell: user {} {} {} at {} (pnl {:.2}, volume credit {:.2})",
            user_id, quantity, coin_id, fill_price, realized_pnl, volume_credit
        );

        Ok(SellOutcome {
            payout,
            fee: quote.fee,
            realized_pnl,
            volume_credit,
            remaining,
        })
    }

    /// Forcibly close a position and return the realized loss (the cash
    /// stake still in it). Used exclusively by the liquidation engine.
    pub async fn force_close(&self, position: &Position) -> Result<f64, TradingError> {
        let lock = self.owner_lock(position.user_id);
        let _guard = lock.lock().await;

        // The position may have been sold between the sweep's read and
        // this call. A full sale (or a re-open) changed the row id and
        // there is nothing left to close; a partial sale kept the id
        // but shrank the stake, so the loss comes from the re-read row,
        // not the sweep's snapshot.
        let current = match self.store.get_position(position.user_id, &position.coin_id) {
            Some(current) if current.id == position.id => current,
            _ => return Ok(0.0),
        };

        self.store.delete_position(&current.id)?;
        info!(
            "Force-closed position {} ({} {} for user {})",
            current.id, current.quantity, current.coin_id, current.user_id
        );
        Ok(current.stake_cash)
    }
}
