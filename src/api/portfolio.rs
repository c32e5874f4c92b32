use crate::error::{AppError, Result};
use crate::types::{SeasonStats, TransactionRecord};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

/// One open position valued at the current cached quote.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    pub coin_id: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub leverage: u32,
    pub stake_cash: f64,
    pub current_price: Option<f64>,
    pub notional_value: Option<f64>,
    pub unrealized_pnl_pct: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyView {
    pub kind: String,
    pub purchase_price: f64,
    pub condition: u8,
    pub rent_per_cycle: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub user_id: i64,
    pub username: String,
    pub balance: f64,
    pub trading_volume: f64,
    /// Whether the property market is unlocked for this player.
    pub property_market_unlocked: bool,
    /// Balance plus position value at current quotes plus property
    /// purchase prices.
    pub net_worth: f64,
    pub positions: Vec<PositionView>,
    pub properties: Vec<PropertyView>,
    pub season: Option<SeasonStats>,
    pub recent_transactions: Vec<TransactionRecord>,
}

const RECENT_TX_LIMIT: usize = 10;

/// GET /api/portfolio/:user_id
async fn get_portfolio(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<PortfolioResponse>> {
    let profile = state
        .store
        .get_profile(user_id)
        .ok_or_else(|| AppError::NotFound(format!("Unknown user: {}", user_id)))?;

    let positions: Vec<PositionView> = state
        .store
        .user_positions(user_id)
        .into_iter()
        .map(|p| {
            let quote = state.price_cache.get(&p.coin_id);
            PositionView {
                current_price: quote.map(|q| q.price),
                notional_value: quote.map(|q| p.notional_value(q.price)),
                unrealized_pnl_pct: quote.map(|q| p.unrealized_pnl_pct(q.price)),
                coin_id: p.coin_id,
                quantity: p.quantity,
                entry_price: p.entry_price,
                leverage: p.leverage,
                stake_cash: p.stake_cash,
            }
        })
        .collect();

    let properties: Vec<PropertyView> = state
        .store
        .user_properties(user_id)
        .into_iter()
        .map(|p| PropertyView {
            kind: p.kind.as_str().to_string(),
            purchase_price: p.purchase_price,
            condition: p.condition,
            rent_per_cycle: p.rent_amount(),
        })
        .collect();

    let position_value: f64 = positions.iter().filter_map(|p| p.notional_value).sum();
    let property_value: f64 = properties.iter().map(|p| p.purchase_price).sum();
    let net_worth = profile.balance + position_value + property_value;

    let season = state.store.get_season_stats(user_id);
    let recent_transactions = state.store.recent_transactions(user_id, RECENT_TX_LIMIT);

    Ok(Json(PortfolioResponse {
        user_id,
        username: profile.username,
        balance: profile.balance,
        trading_volume: profile.trading_volume,
        property_market_unlocked: profile.trading_volume
            >= state.config.unlock_volume_threshold,
        net_worth,
        positions,
        properties,
        season,
        recent_transactions,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/:user_id", get(get_portfolio))
}
