//! API-facing error taxonomy.
//!
//! The core raises [`crate::domain::shared::DomainError`]; this module maps
//! that (and a handful of façade-only conditions like a missing API key)
//! onto the seven error kinds the HTTP surface exposes, each with a fixed
//! status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::domain::shared::DomainError;

/// An error surfaced to an HTTP caller.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown or missing API key.
    #[error("{0}")]
    Auth(String),
    /// Malformed order request, unknown order type, missing fields.
    #[error("{0}")]
    Validation(String),
    /// Blocking would underflow a balance.
    #[error("{0}")]
    InsufficientFunds(String),
    /// No such order / no such balance.
    #[error("{0}")]
    NotFound(String),
    /// Operation invalid in the engine's current state.
    #[error("{0}")]
    State(String),
    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// The status code this error kind maps to.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::InsufficientFunds(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::State(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `DataError` (candle lookup failure) is deliberately not represented here:
/// per §7, it is logged and the tick is skipped with no user-visible error.
impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::BusinessRuleViolation { rule, .. } if rule == "insufficient_funds" => {
                Self::InsufficientFunds(err.to_string())
            }
            DomainError::NotFound { .. } => Self::NotFound(err.to_string()),
            DomainError::InvalidStateTransition { .. } => Self::State(err.to_string()),
            DomainError::InvalidValue { .. }
            | DomainError::InvariantViolation { .. }
            | DomainError::ConstraintViolation { .. }
            | DomainError::BusinessRuleViolation { .. } => Self::Validation(err.to_string()),
        }
    }
}

impl ApiError {
    /// Build an [`ApiError::Auth`] for a missing or unrecognized API key.
    #[must_use]
    pub fn unknown_api_key() -> Self {
        Self::Auth("unknown or missing api_key".to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        (status, Json(ErrorBody { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_maps_to_bad_request() {
        let err: ApiError = DomainError::BusinessRuleViolation {
            rule: "insufficient_funds".to_string(),
            message: "cash would go negative".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(matches!(err, ApiError::InsufficientFunds(_)));
    }

    #[test]
    fn not_found_maps_to_404() {
        let err: ApiError = DomainError::NotFound {
            entity_type: "order".to_string(),
            id: "ord-1".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_state_transition_maps_to_conflict() {
        let err: ApiError = DomainError::InvalidStateTransition {
            entity: "engine".to_string(),
            from: "STOPPED".to_string(),
            to: "RUNNING".to_string(),
            reason: "not running".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn auth_error_maps_to_403() {
        let err = ApiError::unknown_api_key();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn validation_error_carries_the_message() {
        let err = ApiError::Validation("quantity must be positive".to_string());
        assert_eq!(err.to_string(), "quantity must be positive");
    }
}
