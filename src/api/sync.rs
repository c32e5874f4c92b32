use crate::error::{AppError, Result};
use crate::types::Profile;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub user_id: i64,
    pub username: String,
}

/// POST /api/sync
///
/// Register a player or refresh their username. New players receive the
/// initial cash grant; returning players keep their balance.
async fn sync_user(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<Profile>> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username must not be empty".to_string()));
    }

    let profile = state
        .store
        .sync_user(request.user_id, username, state.config.initial_cash)?;
    Ok(Json(profile))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(sync_user))
}
