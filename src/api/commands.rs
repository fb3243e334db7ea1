//! Command path over HTTP, same handler as the chat bot.

use crate::error::{AppError, Result};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(run_command))
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub reply: String,
}

async fn run_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>> {
    let command = req.command.trim();
    if command.is_empty() {
        return Err(AppError::BadRequest("command must not be empty".into()));
    }

    let reply = state.scheduler.handle_command(command).await;
    Ok(Json(CommandResponse { reply }))
}
