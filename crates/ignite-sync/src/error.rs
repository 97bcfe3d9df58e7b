use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use ignite_store::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Sheets request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API returned {status}: {body}")]
    Sheets { status: u16, body: String },

    #[error("Service account key error: {0}")]
    Key(String),

    #[error("Token endpoint returned {status}: {body}")]
    Token { status: u16, body: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Error syncing to sheets");

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
    }
}
