//! Integration tests for the liquidation engine
//!
//! Tests cover:
//! - The margin-call boundary at entry * (1 - 1/leverage)
//! - Loss accounting after a forced close
//! - Notification delivery
//! - Instruments without a quote
//! - Positions changed between the sweep's read and the forced close

use magnate::services::{
    LiquidationEngine, Notifier, PositionLedger, PriceCache, SqliteStore,
};
use magnate::types::{Quote, TxKind};
use std::collections::HashMap;
use std::sync::Arc;

const FEE_RATE: f64 = 0.001;

struct Harness {
    store: Arc<SqliteStore>,
    ledger: Arc<PositionLedger>,
    cache: Arc<PriceCache>,
    engine: LiquidationEngine,
    notifications: tokio::sync::mpsc::UnboundedReceiver<magnate::types::Notification>,
}

fn setup() -> Harness {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    store.sync_user(1, "alice", 100_000.0).unwrap();

    let ledger = Arc::new(PositionLedger::new(store.clone(), FEE_RATE));
    let cache = Arc::new(PriceCache::new());
    let (notifier, notifications) = Notifier::channel();
    let engine = LiquidationEngine::new(
        store.clone(),
        ledger.clone(),
        cache.clone(),
        notifier,
    );

    Harness {
        store,
        ledger,
        cache,
        engine,
        notifications,
    }
}

fn set_price(cache: &PriceCache, coin_id: &str, price: f64) {
    let mut quotes = HashMap::new();
    quotes.insert(
        coin_id.to_string(),
        Quote {
            price,
            change_24h: 0.0,
        },
    );
    cache.replace_all(quotes);
}

#[tokio::test]
async fn test_breach_at_exact_threshold_liquidates() {
    let h = setup();

    // 10x position at 1000: liquidation at a 10% drop, price 900.
    h.ledger
        .open_or_increase(1, "bitcoin", 1.0, 1_000.0, 10)
        .await
        .unwrap();
    set_price(&h.cache, "bitcoin", 900.0);

    let liquidations = h.engine.sweep().await;
    assert_eq!(liquidations.len(), 1);
    assert_eq!(liquidations[0].user_id, 1);
    assert_eq!(liquidations[0].coin_id, "bitcoin");
    // Loss equals the original cash stake.
    assert!((liquidations[0].loss - 100.0).abs() < 1e-9);
    assert!(h.store.get_position(1, "bitcoin").is_none());
}

#[tokio::test]
async fn test_price_above_threshold_survives() {
    let mut h = setup();

    h.ledger
        .open_or_increase(1, "bitcoin", 1.0, 1_000.0, 10)
        .await
        .unwrap();
    set_price(&h.cache, "bitcoin", 900.01);

    let liquidations = h.engine.sweep().await;
    assert!(liquidations.is_empty());
    assert!(h.store.get_position(1, "bitcoin").is_some());
    assert!(h.notifications.try_recv().is_err());
}

#[tokio::test]
async fn test_one_x_position_never_liquidates_above_zero() {
    let h = setup();

    h.ledger
        .open_or_increase(1, "bitcoin", 1.0, 1_000.0, 1)
        .await
        .unwrap();
    set_price(&h.cache, "bitcoin", 0.01);

    let liquidations = h.engine.sweep().await;
    assert!(liquidations.is_empty());
}

#[tokio::test]
async fn test_liquidation_records_loss_and_notifies() {
    let mut h = setup();

    h.ledger
        .open_or_increase(1, "ethereum", 2.0, 1_000.0, 5)
        .await
        .unwrap();
    // 5x: a 20% drop to 800 breaches. Stake was 400.
    set_price(&h.cache, "ethereum", 800.0);

    let liquidations = h.engine.sweep().await;
    assert_eq!(liquidations.len(), 1);
    assert!((liquidations[0].loss - 400.0).abs() < 1e-9);

    let stats = h.store.get_season_stats(1).unwrap();
    assert!((stats.season_loss - 400.0).abs() < 1e-9);

    let history = h.store.recent_transactions(1, 10);
    assert!(history
        .iter()
        .any(|tx| tx.kind == TxKind::Liquidation && (tx.amount + 400.0).abs() < 1e-9));

    let note = h.notifications.try_recv().unwrap();
    assert_eq!(note.user_id, 1);
    assert!(note.text.contains("LIQUIDATION"));
    assert!(note.text.contains("ETHEREUM"));
}

#[tokio::test]
async fn test_forced_close_after_partial_sell_uses_current_stake() {
    let h = setup();

    // 5x: 2.0 at 1000 is a 400 stake.
    h.ledger
        .open_or_increase(1, "ethereum", 2.0, 1_000.0, 5)
        .await
        .unwrap();
    let snapshot = h.store.get_position(1, "ethereum").unwrap();

    // Half the position is sold between the snapshot and the close;
    // the loss must reflect the stake still in the row, not the
    // snapshot's 400.
    h.ledger
        .reduce_or_close(1, "ethereum", 1.0, 1_000.0)
        .await
        .unwrap();

    let loss = h.ledger.force_close(&snapshot).await.unwrap();
    assert!((loss - 200.0).abs() < 1e-9);
    assert!(h.store.get_position(1, "ethereum").is_none());
}

#[tokio::test]
async fn test_forced_close_after_full_sell_reports_nothing() {
    let h = setup();

    h.ledger
        .open_or_increase(1, "ethereum", 2.0, 1_000.0, 5)
        .await
        .unwrap();
    let snapshot = h.store.get_position(1, "ethereum").unwrap();
    h.ledger
        .reduce_or_close(1, "ethereum", 2.0, 1_000.0)
        .await
        .unwrap();

    let loss = h.ledger.force_close(&snapshot).await.unwrap();
    assert_eq!(loss, 0.0);
}

#[tokio::test]
async fn test_position_without_quote_is_skipped() {
    let h = setup();

    h.ledger
        .open_or_increase(1, "bitcoin", 1.0, 1_000.0, 10)
        .await
        .unwrap();
    // Snapshot without bitcoin at all; the position must survive.
    set_price(&h.cache, "solana", 1.0);

    let liquidations = h.engine.sweep().await;
    assert!(liquidations.is_empty());
    assert!(h.store.get_position(1, "bitcoin").is_some());
}

#[tokio::test]
async fn test_sweep_handles_multiple_users() {
    let h = setup();
    h.store.sync_user(2, "bob", 100_000.0).unwrap();

    h.ledger
        .open_or_increase(1, "bitcoin", 1.0, 1_000.0, 10)
        .await
        .unwrap();
    h.ledger
        .open_or_increase(2, "bitcoin", 1.0, 1_000.0, 2)
        .await
        .unwrap();
    // 10% drop: breaches the 10x position, spares the 2x one.
    set_price(&h.cache, "bitcoin", 900.0);

    let liquidations = h.engine.sweep().await;
    assert_eq!(liquidations.len(), 1);
    assert_eq!(liquidations[0].user_id, 1);
    assert!(h.store.get_position(2, "bitcoin").is_some());
}
