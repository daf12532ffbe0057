use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Exchanging the refresh token failed. Fatal for the affected user's
    /// run: every later call would be unauthenticated.
    #[error("Credential refresh failed: {0}")]
    AuthRefresh(String),

    /// The curated source playlist was absent from the search results.
    /// Fatal for this run, usually transient across days.
    #[error("Source playlist not found: {0}")]
    SourceNotFound(String),

    /// Any other remote call failure: network, rate limit, timeout,
    /// malformed response. Transient.
    #[error("Spotify API error: {0}")]
    RemoteApi(String),

    /// Account store read/write failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthRefresh(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::SourceNotFound(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::RemoteApi(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Persistence(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
