pub mod commands;
pub mod fund;
pub mod health;

use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/fund", fund::router())
        .nest("/api/history", fund::history_router())
        .nest("/api/commands", commands::router())
}
