//! # Users
//!
//! Account records and their role assignments. Overseers (KAPRODI, DEKAN,
//! LPM, LPPM) may read; only ADMIN may write. Passwords are not handled
//! here: credentials are issued outside this service.
//!
//! - `GET    /api/v1/users` — list, filters `institutionId`, `role`, `isActive`, `search`
//! - `POST   /api/v1/users` — create
//! - `GET    /api/v1/users/:id` — get
//! - `PUT    /api/v1/users/:id` — update, `roleNames` replaces the role set
//! - `DELETE /api/v1/users/:id` — delete (400 while a lecturer profile or authored records exist)

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use kinerja_core::{RoleName, RoleSet};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::auth::Caller;
use crate::authorize::{authorize, ADMIN_ONLY, OVERSIGHT};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::User;
use crate::routes::{not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "user";

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub institution_id: Uuid,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    pub is_active: Option<bool>,
    /// Role labels, e.g. `["DOSEN"]`.
    #[serde(default)]
    pub role_names: Vec<String>,
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), String> {
        if self.institution_id.is_nil() || is_blank(&self.email) || is_blank(&self.full_name) {
            return Err("Institution ID, email, and full name are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub role_names: Option<Vec<String>>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), String> {
        if self.email.as_deref().is_some_and(is_blank)
            || self.full_name.as_deref().is_some_and(is_blank)
        {
            return Err("Email and full name must not be empty".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/users — List users by full name.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("institutionId" = Option<Uuid>, Query, description = "Institution"),
        ("role" = Option<String>, Query, description = "Role label the user must hold"),
        ("isActive" = Option<bool>, Query, description = "Active flag"),
        ("search" = Option<String>, Query, description = "Full name or email substring"),
    ),
    responses(
        (status = 200, description = "Users retrieved"),
        (status = 403, description = "Insufficient permissions", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<User>, AppError> {
    authorize(&caller, OVERSIGHT)?;
    let filters = Filters(&query);
    let role = filters.get("role").map(|r| r.parse::<RoleName>().ok());
    let mut items = state.users.filter(|u| {
        u.institution_id.map_or(filters.get("institutionId").is_none(), |id| {
            filters.id("institutionId", &id)
        }) && filters.flag("isActive", u.is_active)
            && match role {
                None => true,
                Some(Some(role)) => u.roles.contains(role),
                Some(None) => false,
            }
            && filters.search([Some(u.full_name.as_str()), Some(u.email.as_str())])
    });
    items.sort_by(|a, b| a.full_name.cmp(&b.full_name));
    let page = state.page_request(&query).slice(items);
    Ok(Paginated::from(page).message("Users retrieved successfully"))
}

/// GET /api/v1/users/:id — Get one user.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User retrieved", body = User),
        (status = 404, description = "User not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub(crate) async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<User>, AppError> {
    authorize(&caller, OVERSIGHT)?;
    let id = extract_path(path)?;
    let user = state.users.get(&id).ok_or_else(|| not_found("User"))?;
    Ok(success(user).message("User retrieved successfully"))
}

/// POST /api/v1/users — Create a user (ADMIN).
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Missing fields or unknown role", body = crate::envelope::ErrorBody),
        (status = 404, description = "Institution not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub(crate) async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Success<User>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let req = extract_validated_json(body)?;
    let roles = RoleSet::parse_labels(&req.role_names)?;
    if !state.institutions.contains(&req.institution_id) {
        return Err(not_found("Institution"));
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let user = User {
        id,
        institution_id: Some(req.institution_id),
        email: req.email,
        full_name: req.full_name,
        roles,
        is_active: req.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    if !state
        .users
        .insert_unique(id, user.clone(), |u| u.email == user.email)
    {
        return Err(AppError::Conflict("Email already registered".into()));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&user));

    Ok(success(user)
        .message("User created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/users/:id — Update a user (ADMIN).
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Email already in use", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub(crate) async fn update_user(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Success<User>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let roles = req
        .role_names
        .as_ref()
        .map(RoleSet::parse_labels)
        .transpose()?;
    let before = state.users.get(&id).ok_or_else(|| not_found("User"))?;

    let updated = state
        .users
        .update_unique(
            &id,
            |u| {
                if let Some(email) = req.email {
                    u.email = email;
                }
                if let Some(full_name) = req.full_name {
                    u.full_name = full_name;
                }
                if let Some(is_active) = req.is_active {
                    u.is_active = is_active;
                }
                if let Some(roles) = roles {
                    u.roles = roles;
                }
                u.updated_at = Utc::now();
            },
            |other, updated| other.email == updated.email,
        )
        .ok_or_else(|| not_found("User"))?
        .map_err(|()| AppError::Conflict("Email already in use".into()))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("User updated successfully"))
}

/// DELETE /api/v1/users/:id — Delete a user (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "User still referenced", body = crate::envelope::ErrorBody),
        (status = 404, description = "User not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub(crate) async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    if !state.users.contains(&id) {
        return Err(not_found("User"));
    }
    if state.lecturers.any(|l| l.user_id == id)
        || state.reviews.any(|r| r.reviewer_user_id == id)
        || state.notes.any(|n| n.created_by_user_id == id)
    {
        return Err(AppError::BadRequest(
            "Cannot delete user with related data".into(),
        ));
    }
    let removed = state.users.remove(&id).ok_or_else(|| not_found("User"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("User deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{self, send};
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn admin_creates_user_with_roles() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let admin = test_support::user(&state, &[RoleName::Admin]);
        let institution = test_support::institution(&state, "UC");

        let body = json!({
            "institutionId": institution,
            "email": "dosen@kampus.ac.id",
            "fullName": "Dosen Baru",
            "roleNames": ["DOSEN", "KAPRODI"],
        });
        let (status, json) = send(&app, Method::POST, "/api/v1/users", Some(admin), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["roles"], json!(["DOSEN", "KAPRODI"]));
        assert_eq!(json["data"]["isActive"], true);

        let (status, json) = send(&app, Method::POST, "/api/v1/users", Some(admin), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], "Email already registered");
    }

    #[tokio::test]
    async fn unknown_role_label_is_400() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let admin = test_support::user(&state, &[RoleName::Admin]);
        let institution = test_support::institution(&state, "UC");
        let (status, json) = send(
            &app,
            Method::POST,
            "/api/v1/users",
            Some(admin),
            Some(json!({
                "institutionId": institution,
                "email": "x@kampus.ac.id",
                "fullName": "X",
                "roleNames": ["dosen"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().contains("dosen"));
    }

    #[tokio::test]
    async fn dosen_cannot_list_users() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let dosen = test_support::user(&state, &[RoleName::Dosen]);
        let (status, json) = send(&app, Method::GET, "/api/v1/users", Some(dosen), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], "Access denied. Insufficient permissions.");
    }

    #[tokio::test]
    async fn list_filters_by_role_and_active_flag() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let lpm = test_support::user(&state, &[RoleName::Lpm]);
        test_support::user(&state, &[RoleName::Dosen]);
        let inactive = test_support::user(&state, &[RoleName::Dosen]);
        state.users.update(&inactive, |u| u.is_active = false);

        let (_, json) = send(&app, Method::GET, "/api/v1/users?role=DOSEN", Some(lpm), None).await;
        assert_eq!(json["pagination"]["total"], 2);
        let (_, json) = send(&app, Method::GET, "/api/v1/users?role=DOSEN&isActive=true", Some(lpm), None).await;
        assert_eq!(json["pagination"]["total"], 1);
        let (_, json) = send(&app, Method::GET, "/api/v1/users?role=dosen", Some(lpm), None).await;
        assert_eq!(json["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn update_replaces_roles_and_rejects_taken_email() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let admin = test_support::user(&state, &[RoleName::Admin]);
        let target = test_support::user(&state, &[RoleName::Dosen]);
        let uri = format!("/api/v1/users/{target}");

        let (status, json) = send(&app, Method::PUT, &uri, Some(admin), Some(json!({"roleNames": ["LPM"]}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["roles"], json!(["LPM"]));

        let admin_email = state.users.get(&admin).unwrap().email;
        let (status, json) = send(&app, Method::PUT, &uri, Some(admin), Some(json!({"email": admin_email}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], "Email already in use");
    }

    #[tokio::test]
    async fn delete_blocked_by_lecturer_profile() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let admin = test_support::user(&state, &[RoleName::Admin]);
        let (user, _) = test_support::dosen(&state);
        let (status, json) = send(&app, Method::DELETE, &format!("/api/v1/users/{user}"), Some(admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Cannot delete user with related data");
    }
}
