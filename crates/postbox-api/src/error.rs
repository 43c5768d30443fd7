use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use postbox_types::api::ApiFailure;

/// Domain error taxonomy. Every variant is recoverable at the request
/// boundary and translates to one response; nothing here aborts the process.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed, or expired token, or a token whose subject no
    /// longer exists. One uniform message for all causes.
    #[error("Authentication required.")]
    Unauthenticated,

    /// Unknown username or wrong password, indistinguishable by design.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(String),

    #[error("You cannot send messages to this user")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    /// Cause is logged server-side, never echoed to the client.
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref cause) = self {
            error!("Internal error: {cause:#}");
        }

        (self.status(), Json(ApiFailure::new(self.to_string()))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // UNIQUE constraints are the backstop for check-then-insert races on
        // usernames, emails, and block pairs.
        if let Some(rusqlite::Error::SqliteFailure(code, _)) = err.downcast_ref::<rusqlite::Error>()
            && code.code == rusqlite::ErrorCode::ConstraintViolation
        {
            return ApiError::Conflict("Resource already exists".to_string());
        }

        ApiError::Internal(err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(anyhow::anyhow!("Blocking task failed: {err}"))
    }
}
