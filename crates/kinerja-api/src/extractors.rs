//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs and helpers that turn
//! Axum extractor rejections into envelope-shaped [`AppError`]s.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;
use serde_json::json;

use crate::error::AppError;

/// Presence checks for request bodies, run after deserialization.
pub trait Validate {
    /// Returns the client-facing message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body. Malformed bodies become a 400 whose `errors` list
/// carries the parser's complaint.
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result.map(|Json(v)| v).map_err(|err| AppError::Invalid {
        message: "Invalid request body".to_string(),
        errors: vec![json!({ "detail": err.body_text() })],
    })
}

/// Extract a JSON body and run its [`Validate`] presence checks.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::BadRequest)?;
    Ok(value)
}

/// Extract path parameters, mapping malformed ids to 400.
pub fn extract_path<T>(result: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    result
        .map(|Path(v)| v)
        .map_err(|err| AppError::BadRequest(format!("Invalid path parameter: {}", err.body_text())))
}

/// Whether a required string field was left out or sent blank.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Case-insensitive substring match used by `search` filters.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
