//! # Caller Profile
//!
//! Credentials are issued outside this service, so the auth routes only
//! expose the authenticated caller's own account.
//!
//! - `GET /api/v1/auth/profile` — the caller's user record and lecturer profile
//! - `PUT /api/v1/auth/profile` — update the caller's name and email

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::AuditAction;
use crate::auth::Caller;
use crate::authorize::authenticated;
use crate::envelope::{success, Success};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, is_blank, Validate};
use crate::models::{Lecturer, User};
use crate::routes::not_found;
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user: User,
    /// Present when the caller is a lecturer.
    pub lecturer: Option<Lecturer>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), String> {
        if self.full_name.as_deref().is_some_and(is_blank)
            || self.email.as_deref().is_some_and(is_blank)
        {
            return Err("Full name and email must not be empty".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile).put(update_profile))
}

fn profile(state: &AppState, user: User) -> Profile {
    let lecturer = state.lecturers.find(|l| l.user_id == user.id);
    Profile { user, lecturer }
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/auth/profile — The caller's own account.
#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    responses(
        (status = 200, description = "Profile retrieved", body = Profile),
        (status = 401, description = "Not authenticated", body = crate::envelope::ErrorBody),
        (status = 404, description = "No user record behind the caller", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub(crate) async fn get_profile(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Success<Profile>, AppError> {
    let identity = authenticated(&caller)?;
    let user = state
        .users
        .get(identity.id.as_uuid())
        .ok_or_else(|| not_found("User"))?;
    Ok(success(profile(&state, user)).message("Profile retrieved successfully"))
}

/// PUT /api/v1/auth/profile — Update the caller's name and email.
#[utoipa::path(
    put,
    path = "/api/v1/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = Profile),
        (status = 404, description = "No user record behind the caller", body = crate::envelope::ErrorBody),
        (status = 409, description = "Email already in use", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub(crate) async fn update_profile(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Success<Profile>, AppError> {
    let identity = authenticated(&caller)?;
    let req = extract_validated_json(body)?;
    let id = *identity.id.as_uuid();
    let before = state.users.get(&id).ok_or_else(|| not_found("User"))?;

    let updated = state
        .users
        .update_unique(
            &id,
            |u| {
                if let Some(full_name) = req.full_name {
                    u.full_name = full_name;
                }
                if let Some(email) = req.email {
                    u.email = email;
                }
                u.updated_at = Utc::now();
            },
            |other, updated| other.email == updated.email,
        )
        .ok_or_else(|| not_found("User"))?
        .map_err(|()| AppError::Conflict("Email already in use".into()))?;
    state.record(identity, AuditAction::Update, "user", id, Some(&before), Some(&updated));

    Ok(success(profile(&state, updated)).message("Profile updated successfully"))
}
