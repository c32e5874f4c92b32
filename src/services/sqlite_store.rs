//! SQLite persistence layer for the game state.
//!
//! Everything the scheduler and the chat layer share lives here:
//! profiles, leveraged positions, properties, season statistics, the
//! transaction history and the global fee pool. Balance adjustments are
//! expressed as atomic SQL increments, and the paired-trade procedures
//! (`execute_buy`, `execute_sell`) run debit/credit, fee accrual and
//! the position write in a single transaction so none of them is ever
//! observably separated from the others.

use crate::types::{
    LeaderboardEntry, LeaderboardKind, Position, Profile, Property, PropertyKind, SeasonStats,
    TransactionRecord, TxKind,
};
use rusqlite::{params, types::Type, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

/// SQLite store behind a connection mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                balance REAL NOT NULL,
                trading_volume REAL NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS positions (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                coin_id TEXT NOT NULL,
                quantity REAL NOT NULL,
                entry_price REAL NOT NULL,
                leverage INTEGER NOT NULL,
                stake_cash REAL NOT NULL,
                opened_at INTEGER NOT NULL,
                UNIQUE(user_id, coin_id)
            );

            CREATE TABLE IF NOT EXISTS properties (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                purchase_price REAL NOT NULL,
                condition INTEGER NOT NULL,
                last_rent_collection INTEGER NOT NULL,
                acquired_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS season_stats (
                user_id INTEGER PRIMARY KEY REFERENCES profiles(id) ON DELETE CASCADE,
                season_profit REAL NOT NULL DEFAULT 0,
                season_loss REAL NOT NULL DEFAULT 0,
                trades_count INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_positions_user ON positions(user_id);
            CREATE INDEX IF NOT EXISTS idx_properties_user ON properties(user_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_user
                ON transactions(user_id, created_at DESC);",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    // ========== Profiles ==========

    /// Register or refresh a player. New players get the initial cash
    /// grant and a season-stats row; returning players keep their
    /// balance and only the username is updated.
    pub fn sync_user(
        &self,
        id: i64,
        username: &str,
        initial_cash: f64,
    ) -> Result<Profile, rusqlite::Error> {
        let now = chrono::Utc::now().timestamp_millis();
        {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO profiles (id, username, balance, trading_volume, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)
                 ON CONFLICT(id) DO UPDATE SET username = excluded.username",
                params![id, username, initial_cash, now],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO season_stats (user_id, updated_at) VALUES (?1, ?2)",
                params![id, now],
            )?;
            tx.commit()?;
        }
        self.get_profile(id)
            .ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    /// Get a profile by account id.
    pub fn get_profile(&self, id: i64) -> Option<Profile> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT id, username, balance, trading_volume, created_at
             FROM profiles WHERE id = ?1",
            params![id],
            |row| {
                Ok(Profile {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    balance: row.get(2)?,
                    trading_volume: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        );

        match result {
            Ok(profile) => Some(profile),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                error!("Error fetching profile {}: {}", id, e);
                None
            }
        }
    }

    /// All known account ids (broadcast fan-out).
    pub fn all_profile_ids(&self) -> Result<Vec<i64>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM profiles")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Total registered player count.
    pub fn profile_count(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
            .unwrap_or(0)
    }

    /// Atomic signed balance adjustment.
    pub fn increment_balance(&self, user_id: i64, delta: f64) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE profiles SET balance = balance + ?1 WHERE id = ?2",
            params![delta, user_id],
        )?;
        Ok(())
    }

    /// Guarded debit: subtracts `amount` only if the balance covers it.
    /// Returns false (and mutates nothing) otherwise. This is the spend
    /// authorization point for `balance >= 0`.
    pub fn try_debit(&self, user_id: i64, amount: f64) -> Result<bool, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE profiles SET balance = balance - ?1
             WHERE id = ?2 AND balance >= ?1",
            params![amount, user_id],
        )?;
        Ok(changed == 1)
    }

    /// Accrue eligible trading volume.
    pub fn add_trading_volume(&self, user_id: i64, amount: f64) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE profiles SET trading_volume = trading_volume + ?1 WHERE id = ?2",
            params![amount.abs(), user_id],
        )?;
        Ok(())
    }

    // ========== Paired trade procedures ==========

    /// Buy side: guarded debit of the total cost, fee-pool accrual and
    /// the position write, in one transaction. Returns false without
    /// mutating anything if the balance cannot cover the cost; any
    /// later error rolls the debit back with it.
    pub fn execute_buy(
        &self,
        total_cost: f64,
        fee: f64,
        position: &Position,
    ) -> Result<bool, rusqlite::Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE profiles SET balance = balance - ?1
             WHERE id = ?2 AND balance >= ?1",
            params![total_cost, position.user_id],
        )?;
        if changed != 1 {
            return Ok(false);
        }
        accrue_fee_pool(&tx, fee)?;
        write_position(&tx, position)?;
        tx.commit()?;
        Ok(true)
    }

    /// Sell side: payout credit, fee-pool accrual, conditional
    /// (hold-time-weighted) volume accrual, season P&L and the position
    /// shrink or removal, in one transaction. A player reading between
    /// any two of these never sees a half-settled sale.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_sell(
        &self,
        user_id: i64,
        payout: f64,
        fee: f64,
        volume_credit: f64,
        realized_pnl: f64,
        closed_id: &str,
        remaining: Option<&Position>,
    ) -> Result<(), rusqlite::Error> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE profiles SET balance = balance + ?1,
                                 trading_volume = trading_volume + ?2
             WHERE id = ?3",
            params![payout, volume_credit.max(0.0), user_id],
        )?;
        accrue_fee_pool(&tx, fee)?;
        tx.execute(
            "UPDATE season_stats SET
                season_profit = season_profit + MAX(?1, 0),
                season_loss = season_loss + MAX(-?1, 0),
                trades_count = trades_count + 1,
                updated_at = ?2
             WHERE user_id = ?3",
            params![realized_pnl, now, user_id],
        )?;
        match remaining {
            Some(position) => write_position(&tx, position)?,
            None => {
                tx.execute("DELETE FROM positions WHERE id = ?1", params![closed_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Current global fee pool balance.
    pub fn fee_pool(&self) -> f64 {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT value FROM meta WHERE key = 'fee_pool'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0.0)
    }

    // ========== Positions ==========

    /// Insert or replace a position. `(user_id, coin_id)` is unique
    /// while open.
    pub fn upsert_position(&self, position: &Position) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        write_position(&conn, position)
    }

    /// Get the open position for one (owner, instrument) pair.
    pub fn get_position(&self, user_id: i64, coin_id: &str) -> Option<Position> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT id, user_id, coin_id, quantity, entry_price, leverage, stake_cash, opened_at
             FROM positions WHERE user_id = ?1 AND coin_id = ?2",
            params![user_id, coin_id],
            map_position,
        );

        match result {
            Ok(position) => Some(position),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                error!("Error fetching position for {}: {}", user_id, e);
                None
            }
        }
    }

    /// All open positions (liquidation sweep input).
    pub fn open_positions(&self) -> Result<Vec<Position>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, coin_id, quantity, entry_price, leverage, stake_cash, opened_at
             FROM positions",
        )?;
        let positions = stmt
            .query_map([], map_position)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(positions)
    }

    /// All open positions for one player.
    pub fn user_positions(&self, user_id: i64) -> Vec<Position> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = match conn.prepare(
            "SELECT id, user_id, coin_id, quantity, entry_price, leverage, stake_cash, opened_at
             FROM positions WHERE user_id = ?1",
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                error!("Error preparing position query: {}", e);
                return Vec::new();
            }
        };

        stmt.query_map(params![user_id], map_position)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    /// Delete a position by id. Positions at zero quantity are removed,
    /// never stored.
    pub fn delete_position(&self, id: &str) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM positions WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ========== Properties ==========

    /// Insert a freshly purchased property.
    pub fn create_property(&self, property: &Property) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO properties
                (id, user_id, kind, purchase_price, condition, last_rent_collection, acquired_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                property.id,
                property.user_id,
                property.kind.as_str(),
                property.purchase_price,
                property.condition as i64,
                property.last_rent_collection,
                property.acquired_at,
            ],
        )?;
        Ok(())
    }

    /// Pay for and record a property in one transaction. Returns false
    /// (changing nothing) if the buyer cannot cover the price.
    pub fn execute_property_purchase(
        &self,
        property: &Property,
    ) -> Result<bool, rusqlite::Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let debited = tx.execute(
            "UPDATE profiles SET balance = balance - ?1 WHERE id = ?2 AND balance >= ?1",
            params![property.purchase_price, property.user_id],
        )?;
        if debited == 0 {
            return Ok(false);
        }
        tx.execute(
            "INSERT INTO properties
                (id, user_id, kind, purchase_price, condition, last_rent_collection, acquired_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                property.id,
                property.user_id,
                property.kind.as_str(),
                property.purchase_price,
                property.condition as i64,
                property.last_rent_collection,
                property.acquired_at,
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// All owned properties (economy tick input).
    pub fn all_properties(&self) -> Result<Vec<Property>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, kind, purchase_price, condition, last_rent_collection, acquired_at
             FROM properties",
        )?;
        let properties = stmt
            .query_map([], map_property)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(properties)
    }

    /// All properties for one player.
    pub fn user_properties(&self, user_id: i64) -> Vec<Property> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = match conn.prepare(
            "SELECT id, user_id, kind, purchase_price, condition, last_rent_collection, acquired_at
             FROM properties WHERE user_id = ?1",
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                error!("Error preparing property query: {}", e);
                return Vec::new();
            }
        };

        stmt.query_map(params![user_id], map_property)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    /// Write a property condition, clamped into 0-100 at the statement.
    pub fn set_property_condition(
        &self,
        id: &str,
        condition: i32,
    ) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE properties SET condition = MAX(0, MIN(100, ?1)) WHERE id = ?2",
            params![condition, id],
        )?;
        Ok(())
    }

    /// Advance a property's rent collection timestamp.
    pub fn mark_rent_collected(&self, id: &str, now_ms: i64) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE properties SET last_rent_collection = ?1 WHERE id = ?2",
            params![now_ms, id],
        )?;
        Ok(())
    }

    // ========== Season statistics ==========

    /// Record a realized trade result against season statistics.
    /// Profit and loss accumulate in separate buckets; the trade count
    /// always advances.
    pub fn record_season_pnl(&self, user_id: i64, pnl: f64) -> Result<(), rusqlite::Error> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE season_stats SET
                season_profit = season_profit + MAX(?1, 0),
                season_loss = season_loss + MAX(-?1, 0),
                trades_count = trades_count + 1,
                updated_at = ?2
             WHERE user_id = ?3",
            params![pnl, now, user_id],
        )?;
        Ok(())
    }

    /// Get season statistics for one player.
    pub fn get_season_stats(&self, user_id: i64) -> Option<SeasonStats> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT user_id, season_profit, season_loss, trades_count, updated_at
             FROM season_stats WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(SeasonStats {
                    user_id: row.get(0)?,
                    season_profit: row.get(1)?,
                    season_loss: row.get(2)?,
                    trades_count: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        );

        match result {
            Ok(stats) => Some(stats),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                error!("Error fetching season stats for {}: {}", user_id, e);
                None
            }
        }
    }

    /// Zero every player's season counters and restart the season clock.
    pub fn reset_season_stats(&self) -> Result<(), rusqlite::Error> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE season_stats SET
                season_profit = 0, season_loss = 0, trades_count = 0, updated_at = ?1",
            params![now],
        )?;
        tx.execute(
            "INSERT INTO meta (key, value) VALUES ('season_start', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![now as f64],
        )?;
        tx.commit()?;
        info!("Season statistics reset");
        Ok(())
    }

    /// Epoch millis when the current season started, if recorded.
    pub fn season_start(&self) -> Option<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT value FROM meta WHERE key = 'season_start'",
            [],
            |row| row.get::<_, f64>(0),
        )
        .map(|v| v as i64)
        .ok()
    }

    /// Record the season start without resetting stats (first boot).
    pub fn set_season_start(&self, now_ms: i64) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('season_start', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![now_ms as f64],
        )?;
        Ok(())
    }

    // ========== Transaction history ==========

    /// Append a row to the player-visible transaction history.
    pub fn log_transaction(
        &self,
        user_id: i64,
        kind: TxKind,
        amount: f64,
        description: &str,
    ) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO transactions (id, user_id, kind, amount, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                user_id,
                kind.as_str(),
                amount,
                description,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Most recent transactions for one player, newest first.
    pub fn recent_transactions(&self, user_id: i64, limit: usize) -> Vec<TransactionRecord> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = match conn.prepare(
            "SELECT id, user_id, kind, amount, description, created_at
             FROM transactions WHERE user_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                error!("Error preparing transaction query: {}", e);
                return Vec::new();
            }
        };

        stmt.query_map(params![user_id, limit as i64], |row| {
            let kind_str: String = row.get(2)?;
            let kind = TxKind::parse(&kind_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    Type::Text,
                    format!("unknown transaction kind: {}", kind_str).into(),
                )
            })?;
            Ok(TransactionRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                kind,
                amount: row.get(3)?,
                description: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    // ========== Leaderboards ==========

    /// Top players by the given criterion.
    pub fn leaderboard(
        &self,
        kind: LeaderboardKind,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let sql = match kind {
            LeaderboardKind::Wealth => {
                "SELECT username, balance FROM profiles
                 ORDER BY balance DESC LIMIT ?1"
            }
            LeaderboardKind::Profit => {
                "SELECT p.username, s.season_profit
                 FROM season_stats s JOIN profiles p ON p.id = s.user_id
                 ORDER BY s.season_profit DESC LIMIT ?1"
            }
            LeaderboardKind::Loss => {
                "SELECT p.username, s.season_loss
                 FROM season_stats s JOIN profiles p ON p.id = s.user_id
                 ORDER BY s.season_loss DESC LIMIT ?1"
            }
        };

        let mut stmt = conn.prepare(sql)?;
        let entries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(LeaderboardEntry {
                    username: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

fn write_position(
    conn: &Connection,
    position: &Position,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO positions
            (id, user_id, coin_id, quantity, entry_price, leverage, stake_cash, opened_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(user_id, coin_id) DO UPDATE SET
            quantity = excluded.quantity,
            entry_price = excluded.entry_price,
            stake_cash = excluded.stake_cash",
        params![
            position.id,
            position.user_id,
            position.coin_id,
            position.quantity,
            position.entry_price,
            position.leverage,
            position.stake_cash,
            position.opened_at,
        ],
    )?;
    Ok(())
}

fn accrue_fee_pool(tx: &rusqlite::Transaction<'_>, fee: f64) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO meta (key, value) VALUES ('fee_pool', ?1)
         ON CONFLICT(key) DO UPDATE SET value = value + excluded.value",
        params![fee.max(0.0)],
    )?;
    Ok(())
}

fn map_position(row: &rusqlite::Row<'_>) -> Result<Position, rusqlite::Error> {
    let leverage: i64 = row.get(5)?;
    Ok(Position {
        id: row.get(0)?,
        user_id: row.get(1)?,
        coin_id: row.get(2)?,
        quantity: row.get(3)?,
        entry_price: row.get(4)?,
        leverage: leverage.max(1) as u32,
        stake_cash: row.get(6)?,
        opened_at: row.get(7)?,
    })
}

fn map_property(row: &rusqlite::Row<'_>) -> Result<Property, rusqlite::Error> {
    let kind_str: String = row.get(2)?;
    let kind = PropertyKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown property kind: {}", kind_str).into(),
        )
    })?;
    let condition: i64 = row.get(4)?;
    Ok(Property {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind,
        purchase_price: row.get(3)?,
        condition: condition.clamp(0, 100) as u8,
        last_rent_collection: row.get(5)?,
        acquired_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::new_in_memory().unwrap()
    }

    #[test]
    fn test_sync_user_is_idempotent() {
        let store = store();
        let profile = store.sync_user(1, "willi", 10_000.0).unwrap();
        assert_eq!(profile.balance, 10_000.0);

        // A second sync keeps the balance but refreshes the username.
        store.increment_balance(1, -500.0).unwrap();
        let profile = store.sync_user(1, "uncle_willi", 10_000.0).unwrap();
        assert_eq!(profile.balance, 9_500.0);
        assert_eq!(profile.username, "uncle_willi");
        assert!(store.get_season_stats(1).is_some());
    }

    #[test]
    fn test_try_debit_refuses_overdraw() {
        let store = store();
        store.sync_user(1, "a", 100.0).unwrap();

        assert!(store.try_debit(1, 60.0).unwrap());
        assert!(!store.try_debit(1, 60.0).unwrap());
        assert_eq!(store.get_profile(1).unwrap().balance, 40.0);
    }

    #[test]
    fn test_execute_buy_rolls_back_on_insufficient_funds() {
        let store = store();
        store.sync_user(1, "a", 100.0).unwrap();

        let pos = Position::open(1, "bitcoin".to_string(), 5.0, 100.0, 1, 500.0);
        assert!(!store.execute_buy(500.0, 5.0, &pos).unwrap());
        assert_eq!(store.get_profile(1).unwrap().balance, 100.0);
        assert_eq!(store.fee_pool(), 0.0);
        assert!(store.get_position(1, "bitcoin").is_none());

        let pos = Position::open(1, "bitcoin".to_string(), 0.5, 100.0, 1, 50.0);
        assert!(store.execute_buy(50.0, 0.5, &pos).unwrap());
        assert_eq!(store.get_profile(1).unwrap().balance, 50.0);
        assert_eq!(store.fee_pool(), 0.5);
        assert!(store.get_position(1, "bitcoin").is_some());
    }

    #[test]
    fn test_execute_buy_rolls_back_when_position_write_fails() {
        let store = store();
        store.sync_user(1, "a", 10_000.0).unwrap();
        store.sync_user(2, "b", 10_000.0).unwrap();

        let planted = Position::open(2, "bitcoin".to_string(), 1.0, 100.0, 1, 100.0);
        store.upsert_position(&planted).unwrap();

        // Reusing the planted row id for a different owner collides on
        // the primary key, so the position insert fails after the debit.
        let mut pos = Position::open(1, "bitcoin".to_string(), 1.0, 100.0, 1, 100.0);
        pos.id = planted.id.clone();
        assert!(store.execute_buy(100.1, 0.1, &pos).is_err());

        assert_eq!(store.get_profile(1).unwrap().balance, 10_000.0);
        assert_eq!(store.fee_pool(), 0.0);
        assert!(store.get_position(1, "bitcoin").is_none());
    }

    #[test]
    fn test_execute_sell_settles_everything_at_once() {
        let store = store();
        store.sync_user(1, "a", 0.0).unwrap();
        let pos = Position::open(1, "bitcoin".to_string(), 1.0, 100.0, 1, 100.0);
        store.upsert_position(&pos).unwrap();

        store
            .execute_sell(1, 99.5, 0.5, 80.0, -0.5, &pos.id, None)
            .unwrap();
        let profile = store.get_profile(1).unwrap();
        assert_eq!(profile.balance, 99.5);
        assert_eq!(profile.trading_volume, 80.0);
        assert_eq!(store.fee_pool(), 0.5);
        assert!(store.get_position(1, "bitcoin").is_none());

        let stats = store.get_season_stats(1).unwrap();
        assert_eq!(stats.season_loss, 0.5);
        assert_eq!(stats.trades_count, 1);
    }

    #[test]
    fn test_execute_sell_rolls_back_when_position_write_fails() {
        let store = store();
        store.sync_user(1, "a", 0.0).unwrap();

        let pos = Position::open(1, "bitcoin".to_string(), 2.0, 100.0, 1, 200.0);
        store.upsert_position(&pos).unwrap();

        // The shrunken row references an unknown owner, so the foreign
        // key rejects it after the credit already ran inside the
        // transaction.
        let mut remaining = pos.clone();
        remaining.id = format!("{}-replacement", pos.id);
        remaining.user_id = 999;
        remaining.quantity = 1.0;
        remaining.stake_cash = 100.0;
        assert!(store
            .execute_sell(1, 99.5, 0.5, 80.0, -0.5, &pos.id, Some(&remaining))
            .is_err());

        let profile = store.get_profile(1).unwrap();
        assert_eq!(profile.balance, 0.0);
        assert_eq!(profile.trading_volume, 0.0);
        assert_eq!(store.fee_pool(), 0.0);
        assert_eq!(store.get_position(1, "bitcoin").unwrap().quantity, 2.0);
        let stats = store.get_season_stats(1).unwrap();
        assert_eq!(stats.trades_count, 0);
    }

    #[test]
    fn test_position_crud() {
        let store = store();
        store.sync_user(1, "a", 0.0).unwrap();

        let pos = Position::open(1, "bitcoin".to_string(), 0.5, 60_000.0, 2, 15_000.0);
        store.upsert_position(&pos).unwrap();

        let loaded = store.get_position(1, "bitcoin").unwrap();
        assert_eq!(loaded.quantity, 0.5);
        assert_eq!(loaded.leverage, 2);
        assert_eq!(loaded.stake_cash, 15_000.0);

        store.delete_position(&loaded.id).unwrap();
        assert!(store.get_position(1, "bitcoin").is_none());
    }

    #[test]
    fn test_property_condition_clamped_at_write() {
        let store = store();
        store.sync_user(1, "a", 0.0).unwrap();
        let prop = Property::purchase(1, PropertyKind::Garage);
        store.create_property(&prop).unwrap();

        store.set_property_condition(&prop.id, -20).unwrap();
        assert_eq!(store.user_properties(1)[0].condition, 0);

        store.set_property_condition(&prop.id, 140).unwrap();
        assert_eq!(store.user_properties(1)[0].condition, 100);
    }

    #[test]
    fn test_property_purchase_is_all_or_nothing() {
        let store = store();
        store.sync_user(1, "a", 20_000.0).unwrap();

        let prop = Property::purchase(1, PropertyKind::Garage);
        assert!(store.execute_property_purchase(&prop).unwrap());
        assert_eq!(store.get_profile(1).unwrap().balance, 5_000.0);
        assert_eq!(store.user_properties(1).len(), 1);

        // 5000 left cannot cover a second garage; nothing changes.
        let second = Property::purchase(1, PropertyKind::Garage);
        assert!(!store.execute_property_purchase(&second).unwrap());
        assert_eq!(store.get_profile(1).unwrap().balance, 5_000.0);
        assert_eq!(store.user_properties(1).len(), 1);
    }

    #[test]
    fn test_season_pnl_buckets() {
        let store = store();
        store.sync_user(1, "a", 0.0).unwrap();

        store.record_season_pnl(1, 250.0).unwrap();
        store.record_season_pnl(1, -100.0).unwrap();
        store.record_season_pnl(1, 0.0).unwrap();

        let stats = store.get_season_stats(1).unwrap();
        assert_eq!(stats.season_profit, 250.0);
        assert_eq!(stats.season_loss, 100.0);
        assert_eq!(stats.trades_count, 3);
    }

    #[test]
    fn test_season_reset_zeroes_everyone() {
        let store = store();
        store.sync_user(1, "a", 0.0).unwrap();
        store.sync_user(2, "b", 0.0).unwrap();
        store.record_season_pnl(1, 50.0).unwrap();
        store.record_season_pnl(2, -30.0).unwrap();

        store.reset_season_stats().unwrap();

        for id in [1, 2] {
            let stats = store.get_season_stats(id).unwrap();
            assert_eq!(stats.season_profit, 0.0);
            assert_eq!(stats.season_loss, 0.0);
            assert_eq!(stats.trades_count, 0);
        }
        assert!(store.season_start().is_some());
    }

    #[test]
    fn test_leaderboards() {
        let store = store();
        store.sync_user(1, "rich", 100.0).unwrap();
        store.sync_user(2, "richer", 200.0).unwrap();
        store.record_season_pnl(1, 500.0).unwrap();
        store.record_season_pnl(2, -400.0).unwrap();

        let wealth = store.leaderboard(LeaderboardKind::Wealth, 10).unwrap();
        assert_eq!(wealth[0].username, "richer");
        assert_eq!(wealth[0].value, 200.0);

        let profit = store.leaderboard(LeaderboardKind::Profit, 10).unwrap();
        assert_eq!(profit[0].username, "rich");

        let loss = store.leaderboard(LeaderboardKind::Loss, 10).unwrap();
        assert_eq!(loss[0].username, "richer");
        assert_eq!(loss[0].value, 400.0);
    }

    #[test]
    fn test_transaction_history_order() {
        let store = store();
        store.sync_user(1, "a", 0.0).unwrap();
        store
            .log_transaction(1, TxKind::BuyCrypto, -100.0, "Bought 0.1 BTC")
            .unwrap();
        store
            .log_transaction(1, TxKind::Rent, 110.0, "Rent: garage")
            .unwrap();

        let history = store.recent_transactions(1, 10);
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|t| t.kind == TxKind::Rent));
    }

    #[test]
    fn test_deleting_profile_cascades() {
        let store = store();
        store.sync_user(1, "a", 0.0).unwrap();
        let pos = Position::open(1, "bitcoin".to_string(), 1.0, 100.0, 1, 100.0);
        store.upsert_position(&pos).unwrap();

        {
            let conn = store.conn.lock().unwrap();
            conn.execute("DELETE FROM profiles WHERE id = 1", []).unwrap();
        }
        assert!(store.get_position(1, "bitcoin").is_none());
        assert!(store.get_season_stats(1).is_none());
    }
}
