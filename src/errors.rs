//! Error types for the routing core.
//!
//! Only [`RoutingError::UnknownModel`] ever reaches an HTTP caller as an error. Everything on the
//! recommendation-serving path is logged and collapsed into an empty result instead.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;

use crate::models::ApiResponse;

/// Failures while building the model registry. These are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("No recommender models configured under 'models'")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("Unknown recommender model: {0}")]
    UnknownModel(String),

    #[error("Active recommender model '{key}' does not have a usable base URL: {reason}")]
    ActiveBackendMisconfigured { key: String, reason: String },
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> Response {
        let status = match self {
            RoutingError::UnknownModel(_) => StatusCode::BAD_REQUEST,
            RoutingError::ActiveBackendMisconfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ApiResponse::<()>::failure(self.to_string()))).into_response()
    }
}

/// Anything that can go wrong talking to the active recommender backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to build backend request: {0}")]
    InvalidRequest(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend responded with status {0}")]
    Status(StatusCode),

    #[error("backend returned a malformed body: {0}")]
    Malformed(String),

    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum BookLookupError {
    #[error("book {0} not found")]
    NotFound(i64),

    #[error("catalog lookup for book {id} failed: {reason}")]
    Unavailable { id: i64, reason: String },
}
