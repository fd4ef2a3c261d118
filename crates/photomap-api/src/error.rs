use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

/// Body returned for any persistence fault. Callers never learn which
/// storage call failed.
pub const STORAGE_FAILURE_MESSAGE: &str = "Internet Error";

/// Body returned when a primary mutation committed but its cascade did not.
pub const PARTIAL_SUCCESS_MESSAGE: &str = "Partial Success";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Referenced user, marker or photo does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Caller lacks rights over the target.
    #[error("{0}")]
    Forbidden(String),

    /// Semantically illegal request (self-friending, sharing to a non-friend,
    /// malformed payload).
    #[error("{0}")]
    InvalidOperation(String),

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),

    /// `completed` is durable; re-invoking the operation retries `pending`.
    #[error("{completed} succeeded but {pending} failed: {source:#}")]
    PartialCascade {
        completed: &'static str,
        pending: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::PartialCascade { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::NotFound(msg) | Self::Forbidden(msg) | Self::InvalidOperation(msg) => {
                warn!("Client error ({}): {}", status, msg);
                json!({ "error": msg })
            }
            Self::Storage(e) => {
                error!("Storage failure: {:#}", e);
                json!({ "error": STORAGE_FAILURE_MESSAGE })
            }
            Self::PartialCascade {
                completed,
                pending,
                source,
            } => {
                error!("{} succeeded but {} failed: {:#}", completed, pending, source);
                json!({
                    "error": PARTIAL_SUCCESS_MESSAGE,
                    "completed": completed,
                    "pending": pending,
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Malformed or mistyped JSON bodies are rejected at the boundary.
impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidOperation(rejection.body_text())
    }
}
