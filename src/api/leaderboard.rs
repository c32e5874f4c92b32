use crate::error::{AppError, Result};
use crate::types::{LeaderboardEntry, LeaderboardKind};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

const LEADERBOARD_SIZE: usize = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub kind: String,
    pub entries: Vec<LeaderboardEntry>,
}

/// GET /api/leaderboard/:kind (wealth, profit or loss)
async fn get_leaderboard(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<LeaderboardResponse>> {
    let kind = LeaderboardKind::parse(&kind)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown leaderboard: {}", kind)))?;

    let entries = state.store.leaderboard(kind, LEADERBOARD_SIZE)?;
    Ok(Json(LeaderboardResponse {
        kind: kind.as_str().to_string(),
        entries,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/:kind", get(get_leaderboard))
}
