//! # Service Impacts
//!
//! The measured effect of a community service program: one record per
//! program, with baseline and endline measurements.
//!
//! - `GET    /api/v1/service-impacts/program/:serviceProgramId` — the program's record
//! - `POST   /api/v1/service-impacts/program/:serviceProgramId` — create or update (KAPRODI, LPPM, DOSEN)
//! - `GET    /api/v1/service-impacts/:id` — get
//! - `PUT    /api/v1/service-impacts/:id` — update (KAPRODI, LPPM, DOSEN)
//! - `DELETE /api/v1/service-impacts/:id` — delete (LPPM)

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use kinerja_core::{RoleName, RoleSet};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::auth::Caller;
use crate::authorize::{authenticated, authorize};
use crate::envelope::{success, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, Validate};
use crate::models::ServiceImpact;
use crate::routes::not_found;
use crate::state::AppState;

const ENTITY: &str = "service_impact";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi, RoleName::Lppm, RoleName::Dosen]);
const DELETERS: RoleSet = RoleSet::of(&[RoleName::Lppm]);

// ── Request/Response DTOs ───────────────────────────────────────────

/// Body of both the upsert and the update. Omitted fields keep their value.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceImpactRequest {
    pub impact_score: Option<f64>,
    pub baseline_value: Option<f64>,
    pub endline_value: Option<f64>,
    pub outcome_summary: Option<String>,
}

impl ServiceImpactRequest {
    fn apply(self, impact: &mut ServiceImpact) {
        if self.impact_score.is_some() {
            impact.impact_score = self.impact_score;
        }
        if self.baseline_value.is_some() {
            impact.baseline_value = self.baseline_value;
        }
        if self.endline_value.is_some() {
            impact.endline_value = self.endline_value;
        }
        if self.outcome_summary.is_some() {
            impact.outcome_summary = self.outcome_summary;
        }
    }
}

impl Validate for ServiceImpactRequest {
    fn validate(&self) -> Result<(), String> {
        let values = [self.impact_score, self.baseline_value, self.endline_value];
        if values.into_iter().flatten().any(|v| !v.is_finite()) {
            return Err("Scores must be finite numbers".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/program/:service_program_id",
            get(get_program_impact).post(save_program_impact),
        )
        .route(
            "/:id",
            get(get_impact).put(update_impact).delete(delete_impact),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/service-impacts/:id — Get one record.
#[utoipa::path(
    get,
    path = "/api/v1/service-impacts/{id}",
    params(("id" = Uuid, Path, description = "Service impact ID")),
    responses(
        (status = 200, description = "Service impact retrieved", body = ServiceImpact),
        (status = 404, description = "Service impact not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "service-impacts"
)]
pub(crate) async fn get_impact(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<ServiceImpact>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let impact = state
        .service_impacts
        .get(&id)
        .ok_or_else(|| not_found("Service impact"))?;
    Ok(success(impact).message("Service impact retrieved successfully"))
}

/// GET /api/v1/service-impacts/program/:serviceProgramId — The record of one program.
#[utoipa::path(
    get,
    path = "/api/v1/service-impacts/program/{serviceProgramId}",
    params(("serviceProgramId" = Uuid, Path, description = "Service program ID")),
    responses(
        (status = 200, description = "Service impact retrieved", body = ServiceImpact),
        (status = 404, description = "Service impact not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "service-impacts"
)]
pub(crate) async fn get_program_impact(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<ServiceImpact>, AppError> {
    authenticated(&caller)?;
    let program_id = extract_path(path)?;
    let impact = state
        .service_impacts
        .find(|i| i.service_program_id == program_id)
        .ok_or_else(|| not_found("Service impact"))?;
    Ok(success(impact).message("Service impact retrieved successfully"))
}

/// POST /api/v1/service-impacts/program/:serviceProgramId — Create the
/// program's record, or update it when one exists (ADMIN, KAPRODI, LPPM, DOSEN).
#[utoipa::path(
    post,
    path = "/api/v1/service-impacts/program/{serviceProgramId}",
    params(("serviceProgramId" = Uuid, Path, description = "Service program ID")),
    request_body = ServiceImpactRequest,
    responses(
        (status = 200, description = "Service impact saved", body = ServiceImpact),
        (status = 404, description = "Service program not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "service-impacts"
)]
pub(crate) async fn save_program_impact(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ServiceImpactRequest>, JsonRejection>,
) -> Result<Success<ServiceImpact>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let program_id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    if !state.service_programs.contains(&program_id) {
        return Err(not_found("Service program"));
    }

    if let Some(before) = state
        .service_impacts
        .find(|i| i.service_program_id == program_id)
    {
        let updated = state
            .service_impacts
            .update(&before.id, |i| {
                req.apply(i);
                i.updated_at = Utc::now();
            })
            .ok_or_else(|| not_found("Service impact"))?;
        state.record(actor, AuditAction::Update, ENTITY, updated.id, Some(&before), Some(&updated));
        return Ok(success(updated).message("Service impact saved successfully"));
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let mut impact = ServiceImpact {
        id,
        service_program_id: program_id,
        impact_score: None,
        baseline_value: None,
        endline_value: None,
        outcome_summary: None,
        created_at: now,
        updated_at: now,
    };
    req.apply(&mut impact);
    if !state.service_impacts.insert_unique(id, impact.clone(), |i| {
        i.service_program_id == program_id
    }) {
        return Err(AppError::Conflict(
            "Service impact already exists for this service program".into(),
        ));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&impact));

    Ok(success(impact).message("Service impact saved successfully"))
}

/// PUT /api/v1/service-impacts/:id — Update a record.
#[utoipa::path(
    put,
    path = "/api/v1/service-impacts/{id}",
    params(("id" = Uuid, Path, description = "Service impact ID")),
    request_body = ServiceImpactRequest,
    responses(
        (status = 200, description = "Service impact updated", body = ServiceImpact),
        (status = 404, description = "Service impact not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "service-impacts"
)]
pub(crate) async fn update_impact(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ServiceImpactRequest>, JsonRejection>,
) -> Result<Success<ServiceImpact>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state
        .service_impacts
        .get(&id)
        .ok_or_else(|| not_found("Service impact"))?;

    let updated = state
        .service_impacts
        .update(&id, |i| {
            req.apply(i);
            i.updated_at = Utc::now();
        })
        .ok_or_else(|| not_found("Service impact"))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Service impact updated successfully"))
}

/// DELETE /api/v1/service-impacts/:id — Delete a record (ADMIN, LPPM).
#[utoipa::path(
    delete,
    path = "/api/v1/service-impacts/{id}",
    params(("id" = Uuid, Path, description = "Service impact ID")),
    responses(
        (status = 200, description = "Service impact deleted"),
        (status = 404, description = "Service impact not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "service-impacts"
)]
pub(crate) async fn delete_impact(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, DELETERS)?;
    let id = extract_path(path)?;
    let removed = state
        .service_impacts
        .remove(&id)
        .ok_or_else(|| not_found("Service impact"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Service impact deleted successfully"))
}
