//! # Faculties
//!
//! - `GET    /api/v1/faculties` — list, filters `institutionId`, `search`
//! - `POST   /api/v1/faculties` — create (DEKAN)
//! - `GET    /api/v1/faculties/:id` — get
//! - `PUT    /api/v1/faculties/:id` — update (DEKAN)
//! - `DELETE /api/v1/faculties/:id` — delete (ADMIN)
//!
//! Codes are unique within an institution.

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
use crate::authorize::{authenticated, authorize, ADMIN_ONLY};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::Faculty;
use crate::routes::{not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "faculty";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Dekan]);
const CODE_TAKEN: &str = "Faculty code already exists in this institution";

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFacultyRequest {
    #[serde(default)]
    pub institution_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
}

impl Validate for CreateFacultyRequest {
    fn validate(&self) -> Result<(), String> {
        if self.institution_id.is_nil() || is_blank(&self.name) || is_blank(&self.code) {
            return Err("Institution ID, name, and code are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFacultyRequest {
    pub name: Option<String>,
    pub code: Option<String>,
}

impl Validate for UpdateFacultyRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.as_deref().is_some_and(is_blank) || self.code.as_deref().is_some_and(is_blank)
        {
            return Err("Name and code must not be empty".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_faculties).post(create_faculty))
        .route(
            "/:id",
            get(get_faculty).put(update_faculty).delete(delete_faculty),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/faculties — List faculties by name.
#[utoipa::path(
    get,
    path = "/api/v1/faculties",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("institutionId" = Option<Uuid>, Query, description = "Owning institution"),
        ("search" = Option<String>, Query, description = "Name or code substring"),
    ),
    responses((status = 200, description = "Faculties retrieved")),
    security(("bearer_auth" = [])),
    tag = "faculties"
)]
pub(crate) async fn list_faculties(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Faculty>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let mut items = state.faculties.filter(|f| {
        filters.id("institutionId", &f.institution_id)
            && filters.search([Some(f.name.as_str()), Some(f.code.as_str())])
    });
    items.sort_by(|a, b| a.name.cmp(&b.name));
    let page = state.page_request(&query).slice(items);
    Ok(Paginated::from(page).message("Faculties retrieved successfully"))
}

/// GET /api/v1/faculties/:id — Get one faculty.
#[utoipa::path(
    get,
    path = "/api/v1/faculties/{id}",
    params(("id" = Uuid, Path, description = "Faculty ID")),
    responses(
        (status = 200, description = "Faculty retrieved", body = Faculty),
        (status = 404, description = "Faculty not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "faculties"
)]
pub(crate) async fn get_faculty(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<Faculty>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let faculty = state.faculties.get(&id).ok_or_else(|| not_found("Faculty"))?;
    Ok(success(faculty).message("Faculty retrieved successfully"))
}

/// POST /api/v1/faculties — Create a faculty (ADMIN, DEKAN).
#[utoipa::path(
    post,
    path = "/api/v1/faculties",
    request_body = CreateFacultyRequest,
    responses(
        (status = 201, description = "Faculty created", body = Faculty),
        (status = 404, description = "Institution not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Code already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "faculties"
)]
pub(crate) async fn create_faculty(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateFacultyRequest>, JsonRejection>,
) -> Result<Success<Faculty>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let req = extract_validated_json(body)?;
    if !state.institutions.contains(&req.institution_id) {
        return Err(not_found("Institution"));
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let faculty = Faculty {
        id,
        institution_id: req.institution_id,
        name: req.name,
        code: req.code,
        created_at: now,
        updated_at: now,
    };
    if !state.faculties.insert_unique(id, faculty.clone(), |f| {
        f.institution_id == faculty.institution_id && f.code == faculty.code
    }) {
        return Err(AppError::Conflict(CODE_TAKEN.into()));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&faculty));

    Ok(success(faculty)
        .message("Faculty created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/faculties/:id — Update a faculty (ADMIN, DEKAN).
#[utoipa::path(
    put,
    path = "/api/v1/faculties/{id}",
    params(("id" = Uuid, Path, description = "Faculty ID")),
    request_body = UpdateFacultyRequest,
    responses(
        (status = 200, description = "Faculty updated", body = Faculty),
        (status = 404, description = "Faculty not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Code already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "faculties"
)]
pub(crate) async fn update_faculty(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateFacultyRequest>, JsonRejection>,
) -> Result<Success<Faculty>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state.faculties.get(&id).ok_or_else(|| not_found("Faculty"))?;

    let updated = state
        .faculties
        .update_unique(
            &id,
            |f| {
                if let Some(name) = req.name {
                    f.name = name;
                }
                if let Some(code) = req.code {
                    f.code = code;
                }
                f.updated_at = Utc::now();
            },
            |other, updated| {
                other.institution_id == updated.institution_id && other.code == updated.code
            },
        )
        .ok_or_else(|| not_found("Faculty"))?
        .map_err(|()| AppError::Conflict(CODE_TAKEN.into()))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Faculty updated successfully"))
}

/// DELETE /api/v1/faculties/:id — Delete a faculty (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/faculties/{id}",
    params(("id" = Uuid, Path, description = "Faculty ID")),
    responses(
        (status = 200, description = "Faculty deleted"),
        (status = 400, description = "Faculty still has study programs", body = crate::envelope::ErrorBody),
        (status = 404, description = "Faculty not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "faculties"
)]
pub(crate) async fn delete_faculty(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    if !state.faculties.contains(&id) {
        return Err(not_found("Faculty"));
    }
    if state.study_programs.any(|p| p.faculty_id == id) {
        return Err(AppError::BadRequest(
            "Cannot delete faculty with related data".into(),
        ));
    }
    let removed = state.faculties.remove(&id).ok_or_else(|| not_found("Faculty"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Faculty deleted successfully"))
}
