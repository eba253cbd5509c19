//! Error taxonomy for the relay.
//!
//! Components surface one of four kinds; the HTTP boundary maps kinds to
//! responses and never matches on the source error's type identity.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::push::PushError;
use crate::storage::DatabaseError;
use pushmask_codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Malformed or contradictory input. Maps to 400.
    #[error("{0}")]
    Validation(String),

    /// Resource permanently unavailable: unknown hash id, deregistered
    /// endpoint, permanently failed transport. Maps to 410, distinct from
    /// plain not-found so callers can tell "never existed" from "no longer
    /// deliverable".
    #[error("{0}")]
    Gone(String),

    /// Upstream or network failure. No retry here; the original caller owns
    /// retry policy. Maps to 500.
    #[error("{0}")]
    Transient(String),

    /// Invariant violation or store failure. Maps to 500.
    #[error("{0}")]
    Internal(String),
}

impl From<DatabaseError> for RelayError {
    fn from(e: DatabaseError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<PushError> for RelayError {
    fn from(e: PushError) -> Self {
        match e {
            PushError::Gone(m) => Self::Gone(m),
            PushError::Transient(m) => Self::Transient(m),
            PushError::Credentials(m) => Self::Internal(m),
        }
    }
}

impl From<CodecError> for RelayError {
    fn from(e: CodecError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(m) => (StatusCode::BAD_REQUEST, m),
            Self::Gone(m) => (StatusCode::GONE, m),
            Self::Transient(m) => {
                error!(error = %m, "upstream delivery failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "upstream delivery failed".to_string(),
                )
            }
            Self::Internal(m) => {
                // detail stays in the log, not in the response
                error!(error = %m, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_errors_map_by_kind() {
        assert!(matches!(
            RelayError::from(PushError::Gone("g".into())),
            RelayError::Gone(_)
        ));
        assert!(matches!(
            RelayError::from(PushError::Transient("t".into())),
            RelayError::Transient(_)
        ));
    }

    #[test]
    fn response_status_per_kind() {
        let cases = [
            (RelayError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (RelayError::Gone("g".into()), StatusCode::GONE),
            (
                RelayError::Transient("t".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                RelayError::Internal("i".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
