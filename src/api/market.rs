use crate::error::{AppError, Result};
use crate::types::Quote;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Snapshot of every cached quote.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub quotes: BTreeMap<String, Quote>,
    /// Epoch millis of the last successful upstream refresh, null if
    /// still serving the boot fallback.
    pub last_refresh: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinQuoteResponse {
    pub coin_id: String,
    pub price: f64,
    pub change_24h: f64,
}

/// GET /api/market/prices
async fn get_prices(State(state): State<AppState>) -> Json<MarketSnapshot> {
    let quotes = state.price_cache.get_all();
    // BTreeMap for a stable key order in the response body.
    let quotes: BTreeMap<String, Quote> =
        quotes.iter().map(|(k, v)| (k.clone(), *v)).collect();

    Json(MarketSnapshot {
        quotes,
        last_refresh: state.price_cache.last_refresh_at(),
    })
}

/// GET /api/market/prices/:coin_id
async fn get_price(
    State(state): State<AppState>,
    Path(coin_id): Path<String>,
) -> Result<Json<CoinQuoteResponse>> {
    let coin_id = coin_id.to_lowercase();
    let quote = state
        .price_cache
        .get(&coin_id)
        .ok_or_else(|| AppError::NotFound(format!("Unknown coin: {}", coin_id)))?;

    Ok(Json(CoinQuoteResponse {
        coin_id,
        price: quote.price,
        change_24h: quote.change_24h,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/prices", get(get_prices))
        .route("/prices/:coin_id", get(get_price))
}
