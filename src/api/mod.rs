pub mod health;
pub mod leaderboard;
pub mod market;
pub mod portfolio;
pub mod sync;

use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/market", market::router())
        .nest("/api/leaderboard", leaderboard::router())
        .nest("/api/portfolio", portfolio::router())
        .nest("/api/sync", sync::router())
}
