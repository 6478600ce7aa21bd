//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Every variant renders through the error envelope
//! (`{ success: false, message, errors? }`). Internal error details are
//! never exposed to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kinerja_core::{CoreError, DenyReason};
use thiserror::Error;

use crate::envelope::{error_response, ErrorDetail};

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request is malformed or missing required fields (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request failed validation with per-item details (400).
    #[error("invalid request: {message}")]
    Invalid {
        /// Summary message.
        message: String,
        /// Per-item details, emitted as the envelope's `errors` list.
        errors: Vec<ErrorDetail>,
    },

    /// Missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with existing data (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Invalid { .. } => (StatusCode::BAD_REQUEST, "INVALID"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// The client-facing message.
    pub fn client_message(&self) -> &str {
        match self {
            Self::NotFound(m)
            | Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::Conflict(m) => m,
            Self::Invalid { message, .. } => message,
            Self::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, code, "internal server error");
        }

        let message = self.client_message().to_string();
        let errors = match self {
            Self::Invalid { errors, .. } => Some(errors),
            _ => None,
        };

        error_response()
            .message(message)
            .status(status)
            .errors(errors)
            .into_response()
    }
}

/// Authorization failures: 401 when unauthenticated, 403 otherwise.
impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => Self::Unauthorized(reason.message().to_string()),
            DenyReason::ForbiddenRole | DenyReason::ForbiddenOwnership => {
                Self::Forbidden(reason.message().to_string())
            }
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
