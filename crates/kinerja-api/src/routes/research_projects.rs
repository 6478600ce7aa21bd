//! # Research Projects
//!
//! - `GET    /api/v1/research-projects` — list, filters `lecturerId`, `academicPeriodId`, `status`, `search`
//! - `GET    /api/v1/research-projects/lecturer/:lecturerId` — one lecturer's projects (owner, or overseers)
//! - `POST   /api/v1/research-projects` — create (KAPRODI, LPPM, DOSEN)
//! - `GET    /api/v1/research-projects/:id` — get
//! - `PUT    /api/v1/research-projects/:id` — update (KAPRODI, LPPM, DOSEN)
//! - `DELETE /api/v1/research-projects/:id` — delete (LPPM)

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
use crate::authorize::{authenticated, authorize, authorize_lecturer_path, OVERSIGHT};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::{ResearchProject, DEFAULT_ACTIVITY_STATUS};
use crate::routes::{ensure_lecturer_and_period, not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "research_project";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi, RoleName::Lppm, RoleName::Dosen]);
const DELETERS: RoleSet = RoleSet::of(&[RoleName::Lppm]);

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateResearchProjectRequest {
    #[serde(default)]
    pub lecturer_id: Uuid,
    #[serde(default)]
    pub academic_period_id: Uuid,
    #[serde(default)]
    pub title: String,
    pub theme: Option<String>,
    /// Defaults to `PLANNED`.
    pub status: Option<String>,
    pub funding_source: Option<String>,
}

impl Validate for CreateResearchProjectRequest {
    fn validate(&self) -> Result<(), String> {
        if self.lecturer_id.is_nil() || self.academic_period_id.is_nil() || is_blank(&self.title) {
            return Err("Lecturer ID, academic period ID, and title are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResearchProjectRequest {
    pub title: Option<String>,
    pub theme: Option<String>,
    pub status: Option<String>,
    pub funding_source: Option<String>,
}

impl Validate for UpdateResearchProjectRequest {
    fn validate(&self) -> Result<(), String> {
        if self.title.as_deref().is_some_and(is_blank) {
            return Err("Title must not be empty".to_string());
        }
        if self.status.as_deref().is_some_and(is_blank) {
            return Err("Status must not be empty".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/lecturer/:lecturer_id", get(list_lecturer_projects))
        .route(
            "/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
}

fn newest_first(mut items: Vec<ResearchProject>) -> Vec<ResearchProject> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/research-projects — List projects, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/research-projects",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("lecturerId" = Option<Uuid>, Query, description = "Lecturer"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
        ("status" = Option<String>, Query, description = "Exact status"),
        ("search" = Option<String>, Query, description = "Title or theme substring"),
    ),
    responses((status = 200, description = "Research projects retrieved")),
    security(("bearer_auth" = [])),
    tag = "research-projects"
)]
pub(crate) async fn list_projects(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<ResearchProject>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let items = state.research_projects.filter(|p| {
        filters.id("lecturerId", &p.lecturer_id)
            && filters.id("academicPeriodId", &p.academic_period_id)
            && filters.eq("status", &p.status)
            && filters.search([Some(p.title.as_str()), p.theme.as_deref()])
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Research projects retrieved successfully"))
}

/// GET /api/v1/research-projects/lecturer/:lecturerId — One lecturer's projects.
#[utoipa::path(
    get,
    path = "/api/v1/research-projects/lecturer/{lecturerId}",
    params(
        ("lecturerId" = Uuid, Path, description = "Lecturer ID"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
    ),
    responses(
        (status = 200, description = "Research projects retrieved"),
        (status = 403, description = "Neither owner nor overseer", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "research-projects"
)]
pub(crate) async fn list_lecturer_projects(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<ResearchProject>, AppError> {
    let lecturer_id = authorize_lecturer_path(&caller, OVERSIGHT, path)?;
    if !state.lecturers.contains(&lecturer_id) {
        return Err(not_found("Lecturer"));
    }
    let filters = Filters(&query);
    let items = state.research_projects.filter(|p| {
        p.lecturer_id == lecturer_id && filters.id("academicPeriodId", &p.academic_period_id)
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Research projects retrieved successfully"))
}

/// GET /api/v1/research-projects/:id — Get one project.
#[utoipa::path(
    get,
    path = "/api/v1/research-projects/{id}",
    params(("id" = Uuid, Path, description = "Research project ID")),
    responses(
        (status = 200, description = "Research project retrieved", body = ResearchProject),
        (status = 404, description = "Research project not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "research-projects"
)]
pub(crate) async fn get_project(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<ResearchProject>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let project = state
        .research_projects
        .get(&id)
        .ok_or_else(|| not_found("Research project"))?;
    Ok(success(project).message("Research project retrieved successfully"))
}

/// POST /api/v1/research-projects — Create a project.
#[utoipa::path(
    post,
    path = "/api/v1/research-projects",
    request_body = CreateResearchProjectRequest,
    responses(
        (status = 201, description = "Research project created", body = ResearchProject),
        (status = 400, description = "Missing required fields", body = crate::envelope::ErrorBody),
        (status = 404, description = "Lecturer or academic period not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "research-projects"
)]
pub(crate) async fn create_project(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateResearchProjectRequest>, JsonRejection>,
) -> Result<Success<ResearchProject>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let req = extract_validated_json(body)?;
    ensure_lecturer_and_period(&state, &req.lecturer_id, &req.academic_period_id)?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let project = ResearchProject {
        id,
        lecturer_id: req.lecturer_id,
        academic_period_id: req.academic_period_id,
        title: req.title,
        theme: req.theme,
        status: req
            .status
            .filter(|s| !is_blank(s))
            .unwrap_or_else(|| DEFAULT_ACTIVITY_STATUS.to_string()),
        funding_source: req.funding_source,
        created_at: now,
        updated_at: now,
    };
    state.research_projects.insert(id, project.clone());
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&project));

    Ok(success(project)
        .message("Research project created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/research-projects/:id — Update a project.
#[utoipa::path(
    put,
    path = "/api/v1/research-projects/{id}",
    params(("id" = Uuid, Path, description = "Research project ID")),
    request_body = UpdateResearchProjectRequest,
    responses(
        (status = 200, description = "Research project updated", body = ResearchProject),
        (status = 404, description = "Research project not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "research-projects"
)]
pub(crate) async fn update_project(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateResearchProjectRequest>, JsonRejection>,
) -> Result<Success<ResearchProject>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state
        .research_projects
        .get(&id)
        .ok_or_else(|| not_found("Research project"))?;

    let updated = state
        .research_projects
        .update(&id, |p| {
            if let Some(title) = req.title {
                p.title = title;
            }
            if req.theme.is_some() {
                p.theme = req.theme;
            }
            if let Some(status) = req.status {
                p.status = status;
            }
            if req.funding_source.is_some() {
                p.funding_source = req.funding_source;
            }
            p.updated_at = Utc::now();
        })
        .ok_or_else(|| not_found("Research project"))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Research project updated successfully"))
}

/// DELETE /api/v1/research-projects/:id — Delete a project (ADMIN, LPPM).
#[utoipa::path(
    delete,
    path = "/api/v1/research-projects/{id}",
    params(("id" = Uuid, Path, description = "Research project ID")),
    responses(
        (status = 200, description = "Research project deleted"),
        (status = 400, description = "Research project still has outputs", body = crate::envelope::ErrorBody),
        (status = 404, description = "Research project not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "research-projects"
)]
pub(crate) async fn delete_project(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, DELETERS)?;
    let id = extract_path(path)?;
    if !state.research_projects.contains(&id) {
        return Err(not_found("Research project"));
    }
    if state.research_outputs.any(|o| o.research_project_id == id) {
        return Err(AppError::BadRequest(
            "Cannot delete research project with related data".into(),
        ));
    }
    let removed = state
        .research_projects
        .remove(&id)
        .ok_or_else(|| not_found("Research project"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Research project deleted successfully"))
}
