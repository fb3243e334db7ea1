//! Fund state and pool-movement history.

use crate::error::{AppError, Result};
use crate::types::{FundEvent, FundState};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_fund))
}

pub fn history_router() -> Router<AppState> {
    Router::new().route("/fund", get(get_fund_history))
}

/// Current fund state.
async fn get_fund(State(state): State<AppState>) -> Json<FundState> {
    Json(state.fund.snapshot())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Most recent pool movements, newest first.
async fn get_fund_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<FundEvent>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 {
        return Err(AppError::BadRequest("limit must be positive".into()));
    }

    let events = state.recorder.recent_fund_events(limit.min(MAX_HISTORY_LIMIT))?;
    Ok(Json(events))
}
