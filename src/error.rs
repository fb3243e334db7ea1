use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::fund::FundError;
use crate::services::indicators::IndicatorError;
use crate::services::notifier::NotifyError;
use crate::services::recorder::RecordError;
use crate::sources::FetchError;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Fund(#[from] FundError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Indicator(_) | AppError::SerdeJson(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Fetch(_) | AppError::Notify(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_)
            | AppError::Fund(_)
            | AppError::Record(_)
            | AppError::Sqlite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
