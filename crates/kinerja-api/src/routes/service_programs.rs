//! # Service Programs
//!
//! Community service (pengabdian) programs, structured like research
//! projects.
//!
//! - `GET    /api/v1/service-programs` — list, filters `lecturerId`, `academicPeriodId`, `status`, `search`
//! - `GET    /api/v1/service-programs/lecturer/:lecturerId` — one lecturer's programs (owner, or overseers)
//! - `POST   /api/v1/service-programs` — create (KAPRODI, LPPM, DOSEN)
//! - `GET    /api/v1/service-programs/:id` — get
//! - `PUT    /api/v1/service-programs/:id` — update (KAPRODI, LPPM, DOSEN)
//! - `DELETE /api/v1/service-programs/:id` — delete (LPPM)

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
use crate::models::{ServiceProgram, DEFAULT_ACTIVITY_STATUS};
use crate::routes::{ensure_lecturer_and_period, not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "service_program";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi, RoleName::Lppm, RoleName::Dosen]);
const DELETERS: RoleSet = RoleSet::of(&[RoleName::Lppm]);

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceProgramRequest {
    #[serde(default)]
    pub lecturer_id: Uuid,
    #[serde(default)]
    pub academic_period_id: Uuid,
    #[serde(default)]
    pub title: String,
    pub location: Option<String>,
    pub partner: Option<String>,
    pub beneficiaries_count: Option<u32>,
    /// Defaults to `PLANNED`.
    pub status: Option<String>,
}

impl Validate for CreateServiceProgramRequest {
    fn validate(&self) -> Result<(), String> {
        if self.lecturer_id.is_nil() || self.academic_period_id.is_nil() || is_blank(&self.title) {
            return Err("Lecturer ID, academic period ID, and title are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceProgramRequest {
    pub title: Option<String>,
    pub location: Option<String>,
    pub partner: Option<String>,
    pub beneficiaries_count: Option<u32>,
    pub status: Option<String>,
}

impl Validate for UpdateServiceProgramRequest {
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
        .route("/", get(list_programs).post(create_program))
        .route("/lecturer/:lecturer_id", get(list_lecturer_programs))
        .route(
            "/:id",
            get(get_program).put(update_program).delete(delete_program),
        )
}

fn newest_first(mut items: Vec<ServiceProgram>) -> Vec<ServiceProgram> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/service-programs — List programs, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/service-programs",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("lecturerId" = Option<Uuid>, Query, description = "Lecturer"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
        ("status" = Option<String>, Query, description = "Exact status"),
        ("search" = Option<String>, Query, description = "Title, location or partner substring"),
    ),
    responses((status = 200, description = "Service programs retrieved")),
    security(("bearer_auth" = [])),
    tag = "service-programs"
)]
pub(crate) async fn list_programs(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<ServiceProgram>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let items = state.service_programs.filter(|p| {
        filters.id("lecturerId", &p.lecturer_id)
            && filters.id("academicPeriodId", &p.academic_period_id)
            && filters.eq("status", &p.status)
            && filters.search([Some(p.title.as_str()), p.location.as_deref(), p.partner.as_deref()])
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Service programs retrieved successfully"))
}

/// GET /api/v1/service-programs/lecturer/:lecturerId — One lecturer's programs.
#[utoipa::path(
    get,
    path = "/api/v1/service-programs/lecturer/{lecturerId}",
    params(
        ("lecturerId" = Uuid, Path, description = "Lecturer ID"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
    ),
    responses(
        (status = 200, description = "Service programs retrieved"),
        (status = 403, description = "Neither owner nor overseer", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "service-programs"
)]
pub(crate) async fn list_lecturer_programs(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<ServiceProgram>, AppError> {
    let lecturer_id = authorize_lecturer_path(&caller, OVERSIGHT, path)?;
    if !state.lecturers.contains(&lecturer_id) {
        return Err(not_found("Lecturer"));
    }
    let filters = Filters(&query);
    let items = state.service_programs.filter(|p| {
        p.lecturer_id == lecturer_id && filters.id("academicPeriodId", &p.academic_period_id)
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Service programs retrieved successfully"))
}

/// GET /api/v1/service-programs/:id — Get one program.
#[utoipa::path(
    get,
    path = "/api/v1/service-programs/{id}",
    params(("id" = Uuid, Path, description = "Service program ID")),
    responses(
        (status = 200, description = "Service program retrieved", body = ServiceProgram),
        (status = 404, description = "Service program not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "service-programs"
)]
pub(crate) async fn get_program(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<ServiceProgram>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let program = state
        .service_programs
        .get(&id)
        .ok_or_else(|| not_found("Service program"))?;
    Ok(success(program).message("Service program retrieved successfully"))
}

/// POST /api/v1/service-programs — Create a program.
#[utoipa::path(
    post,
    path = "/api/v1/service-programs",
    request_body = CreateServiceProgramRequest,
    responses(
        (status = 201, description = "Service program created", body = ServiceProgram),
        (status = 400, description = "Missing required fields", body = crate::envelope::ErrorBody),
        (status = 404, description = "Lecturer or academic period not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "service-programs"
)]
pub(crate) async fn create_program(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateServiceProgramRequest>, JsonRejection>,
) -> Result<Success<ServiceProgram>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let req = extract_validated_json(body)?;
    ensure_lecturer_and_period(&state, &req.lecturer_id, &req.academic_period_id)?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let program = ServiceProgram {
        id,
        lecturer_id: req.lecturer_id,
        academic_period_id: req.academic_period_id,
        title: req.title,
        location: req.location,
        partner: req.partner,
        beneficiaries_count: req.beneficiaries_count,
        status: req
            .status
            .filter(|s| !is_blank(s))
            .unwrap_or_else(|| DEFAULT_ACTIVITY_STATUS.to_string()),
        created_at: now,
        updated_at: now,
    };
    state.service_programs.insert(id, program.clone());
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&program));

    Ok(success(program)
        .message("Service program created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/service-programs/:id — Update a program.
#[utoipa::path(
    put,
    path = "/api/v1/service-programs/{id}",
    params(("id" = Uuid, Path, description = "Service program ID")),
    request_body = UpdateServiceProgramRequest,
    responses(
        (status = 200, description = "Service program updated", body = ServiceProgram),
        (status = 404, description = "Service program not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "service-programs"
)]
pub(crate) async fn update_program(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateServiceProgramRequest>, JsonRejection>,
) -> Result<Success<ServiceProgram>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state
        .service_programs
        .get(&id)
        .ok_or_else(|| not_found("Service program"))?;

    let updated = state
        .service_programs
        .update(&id, |p| {
            if let Some(title) = req.title {
                p.title = title;
            }
            if req.location.is_some() {
                p.location = req.location;
            }
            if req.partner.is_some() {
                p.partner = req.partner;
            }
            if req.beneficiaries_count.is_some() {
                p.beneficiaries_count = req.beneficiaries_count;
            }
            if let Some(status) = req.status {
                p.status = status;
            }
            p.updated_at = Utc::now();
        })
        .ok_or_else(|| not_found("Service program"))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Service program updated successfully"))
}

/// DELETE /api/v1/service-programs/:id — Delete a program (ADMIN, LPPM).
#[utoipa::path(
    delete,
    path = "/api/v1/service-programs/{id}",
    params(("id" = Uuid, Path, description = "Service program ID")),
    responses(
        (status = 200, description = "Service program deleted"),
        (status = 400, description = "Service program still has an impact record", body = crate::envelope::ErrorBody),
        (status = 404, description = "Service program not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "service-programs"
)]
pub(crate) async fn delete_program(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, DELETERS)?;
    let id = extract_path(path)?;
    if !state.service_programs.contains(&id) {
        return Err(not_found("Service program"));
    }
    if state.service_impacts.any(|i| i.service_program_id == id) {
        return Err(AppError::BadRequest(
            "Cannot delete service program with related data".into(),
        ));
    }
    let removed = state
        .service_programs
        .remove(&id)
        .ok_or_else(|| not_found("Service program"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Service program deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Term;
    use crate::routes::test_support::{self, send};
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn create_and_search_by_partner() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let (user, lecturer) = test_support::dosen(&state);
        let period = test_support::period(&state, 2024, Term::Genap);

        let body = json!({
            "lecturerId": lecturer,
            "academicPeriodId": period,
            "title": "Pelatihan UMKM",
            "location": "Desa Sukamaju",
            "partner": "Koperasi Tani",
            "beneficiariesCount": 40
        });
        let (status, json) = send(&app, Method::POST, "/api/v1/service-programs", Some(user), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["status"], DEFAULT_ACTIVITY_STATUS);
        assert_eq!(json["data"]["beneficiariesCount"], 40);

        let (_, json) = send(&app, Method::GET, "/api/v1/service-programs?search=koperasi", Some(user), None).await;
        assert_eq!(json["pagination"]["total"], 1);
        let (_, json) = send(&app, Method::GET, "/api/v1/service-programs?search=sekolah", Some(user), None).await;
        assert_eq!(json["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn lpm_cannot_write() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let lpm = test_support::user(&state, &[RoleName::Lpm]);
        let (_, lecturer) = test_support::dosen(&state);
        let period = test_support::period(&state, 2024, Term::Genap);
        let body = json!({"lecturerId": lecturer, "academicPeriodId": period, "title": "x"});
        let (status, json) = send(&app, Method::POST, "/api/v1/service-programs", Some(lpm), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], "Access denied. Insufficient permissions.");
    }

    #[tokio::test]
    async fn by_lecturer_denies_other_dosen() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let (_, lecturer) = test_support::dosen(&state);
        let (intruder, _) = test_support::dosen(&state);
        let (status, _) = send(&app, Method::GET, &format!("/api/v1/service-programs/lecturer/{lecturer}"), Some(intruder), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn update_keeps_omitted_fields() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let (user, lecturer) = test_support::dosen(&state);
        let period = test_support::period(&state, 2024, Term::Genap);
        let body = json!({"lecturerId": lecturer, "academicPeriodId": period, "title": "x", "partner": "Puskesmas"});
        let (_, json) = send(&app, Method::POST, "/api/v1/service-programs", Some(user), Some(body)).await;
        let uri = format!("/api/v1/service-programs/{}", json["data"]["id"].as_str().unwrap());

        let (status, json) = send(&app, Method::PUT, &uri, Some(user), Some(json!({"status": "COMPLETED"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "COMPLETED");
        assert_eq!(json["data"]["partner"], "Puskesmas");

        let (status, json) = send(&app, Method::PUT, &uri, Some(user), Some(json!({"title": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Title must not be empty");
    }
}
