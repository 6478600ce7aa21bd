//! # Response Envelope
//!
//! Every JSON body the API returns has one of three shapes:
//!
//! ```text
//! success:   { "success": true,  "message": "...", "data": T }
//! error:     { "success": false, "message": "...", "errors"?: [..] }
//! paginated: { "success": true,  "message": "...", "data": [T], "pagination": {..} }
//! ```
//!
//! The constructors here are pure formatting. The `errors` key of the error
//! shape is emitted only when a list was supplied; `None` leaves the key out
//! entirely, while `Some(vec![])` emits an empty list.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kinerja_core::{Page, PaginationMeta};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One entry of the error shape's `errors` list. Free-form JSON.
pub type ErrorDetail = serde_json::Value;

// ── Success ─────────────────────────────────────────────────────────

/// A success envelope. Defaults to `"Success"` with status 200.
#[derive(Debug, Clone)]
pub struct Success<T> {
    data: T,
    message: String,
    status: StatusCode,
}

/// Wrap `data` in a success envelope.
pub fn success<T>(data: T) -> Success<T> {
    Success {
        data,
        message: "Success".to_string(),
        status: StatusCode::OK,
    }
}

impl<T> Success<T> {
    /// Override the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Override the status code.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

#[derive(Serialize)]
struct SuccessBody<'a, T> {
    success: bool,
    message: &'a str,
    data: &'a T,
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        let body = SuccessBody {
            success: true,
            message: &self.message,
            data: &self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

// ── Error ───────────────────────────────────────────────────────────

/// Wire form of the error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
    /// Per-item details. Absent unless the producer supplied a list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub errors: Option<Vec<ErrorDetail>>,
}

/// An error envelope. Defaults to `"Error"` with status 500.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    message: String,
    status: StatusCode,
    errors: Option<Vec<ErrorDetail>>,
}

/// Start an error envelope.
pub fn error_response() -> ErrorResponse {
    ErrorResponse {
        message: "Error".to_string(),
        status: StatusCode::INTERNAL_SERVER_ERROR,
        errors: None,
    }
}

impl ErrorResponse {
    /// Override the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Override the status code.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Attach (or clear) the `errors` list.
    pub fn errors(mut self, errors: Option<Vec<ErrorDetail>>) -> Self {
        self.errors = errors;
        self
    }

    /// The body this envelope serializes to.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            success: false,
            message: self.message.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = ErrorBody {
            success: false,
            message: self.message,
            errors: self.errors,
        };
        (status, Json(body)).into_response()
    }
}

// ── Paginated ───────────────────────────────────────────────────────

/// A paginated envelope. Status is always 200.
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    data: Vec<T>,
    pagination: PaginationMeta,
    message: String,
}

/// Wrap one page of `data` and its metadata.
pub fn paginated<T>(data: Vec<T>, pagination: PaginationMeta) -> Paginated<T> {
    Paginated {
        data,
        pagination,
        message: "Success".to_string(),
    }
}

impl<T> Paginated<T> {
    /// Override the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl<T> From<Page<T>> for Paginated<T> {
    fn from(page: Page<T>) -> Self {
        paginated(page.data, page.meta)
    }
}

#[derive(Serialize)]
struct PaginatedBody<'a, T> {
    success: bool,
    message: &'a str,
    data: &'a [T],
    pagination: &'a PaginationMeta,
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        let body = PaginatedBody {
            success: true,
            message: &self.message,
            data: &self.data,
            pagination: &self.pagination,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}
