//! # Study Programs
//!
//! - `GET    /api/v1/study-programs` — list, filters `facultyId`, `search`
//! - `POST   /api/v1/study-programs` — create (DEKAN, KAPRODI)
//! - `GET    /api/v1/study-programs/:id` — get
//! - `PUT    /api/v1/study-programs/:id` — update (DEKAN, KAPRODI)
//! - `DELETE /api/v1/study-programs/:id` — delete (ADMIN)
//!
//! Codes are unique within a faculty.

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
use crate::models::StudyProgram;
use crate::routes::{not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "study_program";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Dekan, RoleName::Kaprodi]);
const CODE_TAKEN: &str = "Study program code already exists in this faculty";

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudyProgramRequest {
    #[serde(default)]
    pub faculty_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
}

impl Validate for CreateStudyProgramRequest {
    fn validate(&self) -> Result<(), String> {
        if self.faculty_id.is_nil() || is_blank(&self.name) || is_blank(&self.code) {
            return Err("Faculty ID, name, and code are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudyProgramRequest {
    pub name: Option<String>,
    pub code: Option<String>,
}

impl Validate for UpdateStudyProgramRequest {
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
        .route("/", get(list_study_programs).post(create_study_program))
        .route(
            "/:id",
            get(get_study_program)
                .put(update_study_program)
                .delete(delete_study_program),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/study-programs — List study programs by name.
#[utoipa::path(
    get,
    path = "/api/v1/study-programs",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("facultyId" = Option<Uuid>, Query, description = "Owning faculty"),
        ("search" = Option<String>, Query, description = "Name or code substring"),
    ),
    responses((status = 200, description = "Study programs retrieved")),
    security(("bearer_auth" = [])),
    tag = "study-programs"
)]
pub(crate) async fn list_study_programs(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<StudyProgram>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let mut items = state.study_programs.filter(|p| {
        filters.id("facultyId", &p.faculty_id)
            && filters.search([Some(p.name.as_str()), Some(p.code.as_str())])
    });
    items.sort_by(|a, b| a.name.cmp(&b.name));
    let page = state.page_request(&query).slice(items);
    Ok(Paginated::from(page).message("Study programs retrieved successfully"))
}

/// GET /api/v1/study-programs/:id — Get one study program.
#[utoipa::path(
    get,
    path = "/api/v1/study-programs/{id}",
    params(("id" = Uuid, Path, description = "Study program ID")),
    responses(
        (status = 200, description = "Study program retrieved", body = StudyProgram),
        (status = 404, description = "Study program not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "study-programs"
)]
pub(crate) async fn get_study_program(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<StudyProgram>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let program = state
        .study_programs
        .get(&id)
        .ok_or_else(|| not_found("Study program"))?;
    Ok(success(program).message("Study program retrieved successfully"))
}

/// POST /api/v1/study-programs — Create a study program.
#[utoipa::path(
    post,
    path = "/api/v1/study-programs",
    request_body = CreateStudyProgramRequest,
    responses(
        (status = 201, description = "Study program created", body = StudyProgram),
        (status = 404, description = "Faculty not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Code already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "study-programs"
)]
pub(crate) async fn create_study_program(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateStudyProgramRequest>, JsonRejection>,
) -> Result<Success<StudyProgram>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let req = extract_validated_json(body)?;
    if !state.faculties.contains(&req.faculty_id) {
        return Err(not_found("Faculty"));
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let program = StudyProgram {
        id,
        faculty_id: req.faculty_id,
        name: req.name,
        code: req.code,
        created_at: now,
        updated_at: now,
    };
    if !state.study_programs.insert_unique(id, program.clone(), |p| {
        p.faculty_id == program.faculty_id && p.code == program.code
    }) {
        return Err(AppError::Conflict(CODE_TAKEN.into()));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&program));

    Ok(success(program)
        .message("Study program created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/study-programs/:id — Update a study program.
#[utoipa::path(
    put,
    path = "/api/v1/study-programs/{id}",
    params(("id" = Uuid, Path, description = "Study program ID")),
    request_body = UpdateStudyProgramRequest,
    responses(
        (status = 200, description = "Study program updated", body = StudyProgram),
        (status = 404, description = "Study program not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Code already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "study-programs"
)]
pub(crate) async fn update_study_program(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateStudyProgramRequest>, JsonRejection>,
) -> Result<Success<StudyProgram>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state
        .study_programs
        .get(&id)
        .ok_or_else(|| not_found("Study program"))?;

    let updated = state
        .study_programs
        .update_unique(
            &id,
            |p| {
                if let Some(name) = req.name {
                    p.name = name;
                }
                if let Some(code) = req.code {
                    p.code = code;
                }
                p.updated_at = Utc::now();
            },
            |other, updated| other.faculty_id == updated.faculty_id && other.code == updated.code,
        )
        .ok_or_else(|| not_found("Study program"))?
        .map_err(|()| AppError::Conflict(CODE_TAKEN.into()))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Study program updated successfully"))
}

/// DELETE /api/v1/study-programs/:id — Delete a study program (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/study-programs/{id}",
    params(("id" = Uuid, Path, description = "Study program ID")),
    responses(
        (status = 200, description = "Study program deleted"),
        (status = 400, description = "Study program still has lecturers", body = crate::envelope::ErrorBody),
        (status = 404, description = "Study program not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "study-programs"
)]
pub(crate) async fn delete_study_program(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    if !state.study_programs.contains(&id) {
        return Err(not_found("Study program"));
    }
    if state.lecturers.any(|l| l.study_program_id == id) || state.courses.any(|c| c.study_program_id == id) {
        return Err(AppError::BadRequest(
            "Cannot delete study program with related data".into(),
        ));
    }
    let removed = state
        .study_programs
        .remove(&id)
        .ok_or_else(|| not_found("Study program"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Study program deleted successfully"))
}
