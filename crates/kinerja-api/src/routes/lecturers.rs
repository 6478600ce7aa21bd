//! # Lecturers
//!
//! Lecturer profiles link a user account to a study program. A user holds
//! at most one profile; that profile's id is what the owner-or-role gate
//! compares against.
//!
//! - `GET    /api/v1/lecturers` — list, filters `studyProgramId`, `facultyId`, `search`
//! - `POST   /api/v1/lecturers` — create (KAPRODI)
//! - `GET    /api/v1/lecturers/:id` — get
//! - `GET    /api/v1/lecturers/:id/dashboard` — summary (owner, or KAPRODI/DEKAN/LPM/LPPM)
//! - `PUT    /api/v1/lecturers/:id` — update (KAPRODI)
//! - `DELETE /api/v1/lecturers/:id` — delete (ADMIN)

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use kinerja_core::{RoleName, RoleSet};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::auth::Caller;
use crate::authorize::{authenticated, authorize, authorize_lecturer_path, ADMIN_ONLY, OVERSIGHT};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::{
    KpiSnapshot, Lecturer, ResearchProject, ServiceProgram, StudyProgram, UserSummary,
};
use crate::routes::{not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "lecturer";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi]);
const NIDN_TAKEN: &str = "NIDN already registered";
const RECENT: usize = 5;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLecturerRequest {
    #[serde(default)]
    pub user_id: Uuid,
    #[serde(default)]
    pub study_program_id: Uuid,
    /// National lecturer registration number.
    #[serde(default)]
    pub nidn: String,
    pub academic_rank: Option<String>,
    pub expertise_focus: Option<String>,
}

impl Validate for CreateLecturerRequest {
    fn validate(&self) -> Result<(), String> {
        if self.user_id.is_nil() || self.study_program_id.is_nil() || is_blank(&self.nidn) {
            return Err("User ID, Study Program ID, and NIDN are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLecturerRequest {
    pub study_program_id: Option<Uuid>,
    pub nidn: Option<String>,
    pub academic_rank: Option<String>,
    pub expertise_focus: Option<String>,
}

impl Validate for UpdateLecturerRequest {
    fn validate(&self) -> Result<(), String> {
        if self.nidn.as_deref().is_some_and(is_blank) {
            return Err("NIDN must not be empty".to_string());
        }
        Ok(())
    }
}

/// Record counts shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    /// Classes taught, as main or co-lecturer.
    pub course_offerings: usize,
    pub research_projects: usize,
    pub service_programs: usize,
    pub evidences: usize,
    pub reviews: usize,
    pub notes: usize,
    pub kpi_snapshots: usize,
}

/// Lecturer summary: profile, recent activity and the latest KPI snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LecturerDashboard {
    pub lecturer: Lecturer,
    pub user: Option<UserSummary>,
    pub study_program: Option<StudyProgram>,
    /// Newest first.
    pub recent_research_projects: Vec<ResearchProject>,
    /// Newest first.
    pub recent_service_programs: Vec<ServiceProgram>,
    pub latest_kpi_snapshot: Option<KpiSnapshot>,
    pub counts: DashboardCounts,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_lecturers).post(create_lecturer))
        .route(
            "/:id",
            get(get_lecturer).put(update_lecturer).delete(delete_lecturer),
        )
        .route("/:id/dashboard", get(lecturer_dashboard))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/lecturers — List lecturers by the linked user's name.
#[utoipa::path(
    get,
    path = "/api/v1/lecturers",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("studyProgramId" = Option<Uuid>, Query, description = "Study program"),
        ("facultyId" = Option<Uuid>, Query, description = "Faculty of the study program"),
        ("search" = Option<String>, Query, description = "NIDN, name or email substring"),
    ),
    responses((status = 200, description = "Lecturers retrieved")),
    security(("bearer_auth" = [])),
    tag = "lecturers"
)]
pub(crate) async fn list_lecturers(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Lecturer>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let mut items: Vec<(String, Lecturer)> = state
        .lecturers
        .filter(|l| filters.id("studyProgramId", &l.study_program_id))
        .into_iter()
        .filter(|l| {
            filters.get("facultyId").is_none()
                || state
                    .study_programs
                    .get(&l.study_program_id)
                    .is_some_and(|p| filters.id("facultyId", &p.faculty_id))
        })
        .filter_map(|l| {
            let user = state.users.get(&l.user_id);
            let (name, email) = user
                .map(|u| (u.full_name, u.email))
                .unwrap_or_default();
            filters
                .search([Some(l.nidn.as_str()), Some(name.as_str()), Some(email.as_str())])
                .then_some((name, l))
        })
        .collect();
    items.sort_by(|a, b| a.0.cmp(&b.0));
    let items: Vec<Lecturer> = items.into_iter().map(|(_, l)| l).collect();
    let page = state.page_request(&query).slice(items);
    Ok(Paginated::from(page).message("Lecturers retrieved successfully"))
}

/// GET /api/v1/lecturers/:id — Get one lecturer profile.
#[utoipa::path(
    get,
    path = "/api/v1/lecturers/{id}",
    params(("id" = Uuid, Path, description = "Lecturer ID")),
    responses(
        (status = 200, description = "Lecturer retrieved", body = Lecturer),
        (status = 404, description = "Lecturer not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "lecturers"
)]
pub(crate) async fn get_lecturer(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<Lecturer>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let lecturer = state.lecturers.get(&id).ok_or_else(|| not_found("Lecturer"))?;
    Ok(success(lecturer).message("Lecturer retrieved successfully"))
}

/// GET /api/v1/lecturers/:id/dashboard — Lecturer summary.
#[utoipa::path(
    get,
    path = "/api/v1/lecturers/{id}/dashboard",
    params(("id" = Uuid, Path, description = "Lecturer ID")),
    responses(
        (status = 200, description = "Lecturer dashboard retrieved", body = LecturerDashboard),
        (status = 403, description = "Neither owner nor overseer", body = crate::envelope::ErrorBody),
        (status = 404, description = "Lecturer not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "lecturers"
)]
pub(crate) async fn lecturer_dashboard(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
) -> Result<Success<LecturerDashboard>, AppError> {
    let id = authorize_lecturer_path(&caller, OVERSIGHT, path)?;
    let dashboard = build_dashboard(&state, id).ok_or_else(|| not_found("Lecturer"))?;
    Ok(success(dashboard).message("Lecturer dashboard retrieved successfully"))
}

fn build_dashboard(state: &AppState, id: Uuid) -> Option<LecturerDashboard> {
    let lecturer = state.lecturers.get(&id)?;

    let mut research = state.research_projects.filter(|p| p.lecturer_id == id);
    research.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let mut service = state.service_programs.filter(|p| p.lecturer_id == id);
    service.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let kpi = state.kpi_snapshots.filter(|k| k.lecturer_id == id);

    let counts = DashboardCounts {
        course_offerings: state.course_offerings.count(|o| o.taught_by(&id)),
        research_projects: research.len(),
        service_programs: service.len(),
        evidences: state.evidences.count(|e| e.lecturer_id == id),
        reviews: state.reviews.count(|r| r.lecturer_id == id),
        notes: state.notes.count(|n| n.lecturer_id == id),
        kpi_snapshots: kpi.len(),
    };
    research.truncate(RECENT);
    service.truncate(RECENT);

    Some(LecturerDashboard {
        user: state.users.get(&lecturer.user_id).as_ref().map(UserSummary::from),
        study_program: state.study_programs.get(&lecturer.study_program_id),
        recent_research_projects: research,
        recent_service_programs: service,
        latest_kpi_snapshot: kpi.into_iter().max_by_key(|k| k.calculated_at),
        counts,
        lecturer,
    })
}

/// POST /api/v1/lecturers — Create a lecturer profile (ADMIN, KAPRODI).
#[utoipa::path(
    post,
    path = "/api/v1/lecturers",
    request_body = CreateLecturerRequest,
    responses(
        (status = 201, description = "Lecturer created", body = Lecturer),
        (status = 404, description = "User or study program not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Profile or NIDN already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "lecturers"
)]
pub(crate) async fn create_lecturer(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateLecturerRequest>, JsonRejection>,
) -> Result<Success<Lecturer>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let req = extract_validated_json(body)?;
    if !state.users.contains(&req.user_id) {
        return Err(not_found("User"));
    }
    if state.lecturers.any(|l| l.user_id == req.user_id) {
        return Err(AppError::Conflict(
            "User already has a lecturer profile".into(),
        ));
    }
    if !state.study_programs.contains(&req.study_program_id) {
        return Err(not_found("Study program"));
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let lecturer = Lecturer {
        id,
        user_id: req.user_id,
        study_program_id: req.study_program_id,
        nidn: req.nidn,
        academic_rank: req.academic_rank,
        expertise_focus: req.expertise_focus,
        created_at: now,
        updated_at: now,
    };
    if !state.lecturers.insert_unique(id, lecturer.clone(), |l| {
        l.user_id == lecturer.user_id || l.nidn == lecturer.nidn
    }) {
        let message = if state.lecturers.any(|l| l.user_id == lecturer.user_id) {
            "User already has a lecturer profile"
        } else {
            NIDN_TAKEN
        };
        return Err(AppError::Conflict(message.into()));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&lecturer));

    Ok(success(lecturer)
        .message("Lecturer created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/lecturers/:id — Update a lecturer profile (ADMIN, KAPRODI).
#[utoipa::path(
    put,
    path = "/api/v1/lecturers/{id}",
    params(("id" = Uuid, Path, description = "Lecturer ID")),
    request_body = UpdateLecturerRequest,
    responses(
        (status = 200, description = "Lecturer updated", body = Lecturer),
        (status = 404, description = "Lecturer or study program not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "NIDN already registered", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "lecturers"
)]
pub(crate) async fn update_lecturer(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateLecturerRequest>, JsonRejection>,
) -> Result<Success<Lecturer>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state.lecturers.get(&id).ok_or_else(|| not_found("Lecturer"))?;
    if let Some(program) = req.study_program_id {
        if !state.study_programs.contains(&program) {
            return Err(not_found("Study program"));
        }
    }

    let updated = state
        .lecturers
        .update_unique(
            &id,
            |l| {
                if let Some(program) = req.study_program_id {
                    l.study_program_id = program;
                }
                if let Some(nidn) = req.nidn {
                    l.nidn = nidn;
                }
                if req.academic_rank.is_some() {
                    l.academic_rank = req.academic_rank;
                }
                if req.expertise_focus.is_some() {
                    l.expertise_focus = req.expertise_focus;
                }
                l.updated_at = Utc::now();
            },
            |other, updated| other.nidn == updated.nidn,
        )
        .ok_or_else(|| not_found("Lecturer"))?
        .map_err(|()| AppError::Conflict(NIDN_TAKEN.into()))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Lecturer updated successfully"))
}

/// DELETE /api/v1/lecturers/:id — Delete a lecturer profile (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/lecturers/{id}",
    params(("id" = Uuid, Path, description = "Lecturer ID")),
    responses(
        (status = 200, description = "Lecturer deleted"),
        (status = 400, description = "Lecturer still has records", body = crate::envelope::ErrorBody),
        (status = 404, description = "Lecturer not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "lecturers"
)]
pub(crate) async fn delete_lecturer(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    if !state.lecturers.contains(&id) {
        return Err(not_found("Lecturer"));
    }
    let related = state.course_offerings.any(|o| o.taught_by(&id))
        || state.research_projects.any(|r| r.lecturer_id == id)
        || state.service_programs.any(|s| s.lecturer_id == id)
        || state.evidences.any(|e| e.lecturer_id == id)
        || state.reviews.any(|r| r.lecturer_id == id)
        || state.notes.any(|n| n.lecturer_id == id)
        || state.kpi_snapshots.any(|k| k.lecturer_id == id);
    if related {
        return Err(AppError::BadRequest(
            "Cannot delete lecturer with related data".into(),
        ));
    }
    let removed = state.lecturers.remove(&id).ok_or_else(|| not_found("Lecturer"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Lecturer deleted successfully"))
}
