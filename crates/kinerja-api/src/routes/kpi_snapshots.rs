//! # KPI Snapshots
//!
//! Performance indicators computed for a lecturer in one academic period.
//! Scores are supplied by the caller; the snapshot records who calculated
//! them and when. Updating a snapshot re-stamps both.
//!
//! - `GET    /api/v1/kpi-snapshots` — list, filters `academicPeriodId`, `lecturerId`
//! - `GET    /api/v1/kpi-snapshots/lecturer/:lecturerId` — one lecturer's snapshots (owner, or overseers)
//! - `GET    /api/v1/kpi-snapshots/lecturer/:lecturerId/latest` — most recent snapshot
//! - `POST   /api/v1/kpi-snapshots` — create (KAPRODI, LPM)
//! - `GET    /api/v1/kpi-snapshots/:id` — get (overseers and DOSEN)
//! - `PUT    /api/v1/kpi-snapshots/:id` — recalculate (KAPRODI, LPM)
//! - `DELETE /api/v1/kpi-snapshots/:id` — delete (ADMIN)

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
use crate::authorize::{
    authorize, authorize_lecturer_path, ADMIN_ONLY, OVERSIGHT, OVERSIGHT_AND_DOSEN,
};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, Validate};
use crate::models::KpiSnapshot;
use crate::routes::{ensure_lecturer_and_period, not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "kpi_snapshot";
const CALCULATORS: RoleSet = RoleSet::of(&[RoleName::Kaprodi, RoleName::Lpm]);

// ── Request/Response DTOs ───────────────────────────────────────────

/// Indicator scores. Absent scores stay unset; `riskScore` defaults to 0.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiScores {
    pub teaching_score: Option<f64>,
    pub research_score: Option<f64>,
    pub service_score: Option<f64>,
    pub support_score: Option<f64>,
    pub tridharma_index: Option<f64>,
    pub evidence_score: Option<f64>,
    pub bkd_compliance_score: Option<f64>,
    pub risk_score: Option<f64>,
}

impl KpiScores {
    fn all(&self) -> [Option<f64>; 8] {
        [
            self.teaching_score,
            self.research_score,
            self.service_score,
            self.support_score,
            self.tridharma_index,
            self.evidence_score,
            self.bkd_compliance_score,
            self.risk_score,
        ]
    }

    fn check_finite(&self) -> Result<(), String> {
        if self.all().into_iter().flatten().any(|s| !s.is_finite()) {
            return Err("Scores must be finite numbers".to_string());
        }
        Ok(())
    }

    /// Overwrite the scores present in `self`.
    fn apply(self, snapshot: &mut KpiSnapshot) {
        let Self {
            teaching_score,
            research_score,
            service_score,
            support_score,
            tridharma_index,
            evidence_score,
            bkd_compliance_score,
            risk_score,
        } = self;
        snapshot.teaching_score = teaching_score.or(snapshot.teaching_score);
        snapshot.research_score = research_score.or(snapshot.research_score);
        snapshot.service_score = service_score.or(snapshot.service_score);
        snapshot.support_score = support_score.or(snapshot.support_score);
        snapshot.tridharma_index = tridharma_index.or(snapshot.tridharma_index);
        snapshot.evidence_score = evidence_score.or(snapshot.evidence_score);
        snapshot.bkd_compliance_score = bkd_compliance_score.or(snapshot.bkd_compliance_score);
        if let Some(risk) = risk_score {
            snapshot.risk_score = risk;
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateKpiSnapshotRequest {
    #[serde(default)]
    pub academic_period_id: Uuid,
    #[serde(default)]
    pub lecturer_id: Uuid,
    #[serde(flatten)]
    pub scores: KpiScores,
}

impl Validate for CreateKpiSnapshotRequest {
    fn validate(&self) -> Result<(), String> {
        if self.academic_period_id.is_nil() || self.lecturer_id.is_nil() {
            return Err("Academic period ID and lecturer ID are required".to_string());
        }
        self.scores.check_finite()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKpiSnapshotRequest {
    #[serde(flatten)]
    pub scores: KpiScores,
}

impl Validate for UpdateKpiSnapshotRequest {
    fn validate(&self) -> Result<(), String> {
        self.scores.check_finite()
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_snapshots).post(create_snapshot))
        .route("/lecturer/:lecturer_id", get(list_lecturer_snapshots))
        .route("/lecturer/:lecturer_id/latest", get(latest_lecturer_snapshot))
        .route(
            "/:id",
            get(get_snapshot).put(update_snapshot).delete(delete_snapshot),
        )
}

fn latest_first(mut items: Vec<KpiSnapshot>) -> Vec<KpiSnapshot> {
    items.sort_by(|a, b| b.calculated_at.cmp(&a.calculated_at));
    items
}

/// Owner-or-overseer gate on the `:lecturerId` segment, then 404 unless the
/// lecturer exists.
fn owner_gate(
    state: &AppState,
    caller: &Caller,
    path: Result<Path<String>, PathRejection>,
) -> Result<Uuid, AppError> {
    let lecturer_id = authorize_lecturer_path(caller, OVERSIGHT, path)?;
    if !state.lecturers.contains(&lecturer_id) {
        return Err(not_found("Lecturer"));
    }
    Ok(lecturer_id)
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/kpi-snapshots — List snapshots, latest calculation first.
#[utoipa::path(
    get,
    path = "/api/v1/kpi-snapshots",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
        ("lecturerId" = Option<Uuid>, Query, description = "Lecturer"),
    ),
    responses((status = 200, description = "KPI snapshots retrieved")),
    security(("bearer_auth" = [])),
    tag = "kpi-snapshots"
)]
pub(crate) async fn list_snapshots(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<KpiSnapshot>, AppError> {
    authorize(&caller, OVERSIGHT)?;
    let filters = Filters(&query);
    let items = state.kpi_snapshots.filter(|k| {
        filters.id("academicPeriodId", &k.academic_period_id)
            && filters.id("lecturerId", &k.lecturer_id)
    });
    let page = state.page_request(&query).slice(latest_first(items));
    Ok(Paginated::from(page).message("KPI snapshots retrieved successfully"))
}

/// GET /api/v1/kpi-snapshots/lecturer/:lecturerId — One lecturer's snapshots.
#[utoipa::path(
    get,
    path = "/api/v1/kpi-snapshots/lecturer/{lecturerId}",
    params(
        ("lecturerId" = Uuid, Path, description = "Lecturer ID"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
    ),
    responses(
        (status = 200, description = "KPI snapshots retrieved"),
        (status = 403, description = "Neither owner nor overseer", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi-snapshots"
)]
pub(crate) async fn list_lecturer_snapshots(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<KpiSnapshot>, AppError> {
    let lecturer_id = owner_gate(&state, &caller, path)?;
    let filters = Filters(&query);
    let items = state.kpi_snapshots.filter(|k| {
        k.lecturer_id == lecturer_id && filters.id("academicPeriodId", &k.academic_period_id)
    });
    let page = state.page_request(&query).slice(latest_first(items));
    Ok(Paginated::from(page).message("KPI snapshots retrieved successfully"))
}

/// GET /api/v1/kpi-snapshots/lecturer/:lecturerId/latest — Most recent snapshot.
#[utoipa::path(
    get,
    path = "/api/v1/kpi-snapshots/lecturer/{lecturerId}/latest",
    params(("lecturerId" = Uuid, Path, description = "Lecturer ID")),
    responses(
        (status = 200, description = "Latest KPI snapshot retrieved", body = KpiSnapshot),
        (status = 403, description = "Neither owner nor overseer", body = crate::envelope::ErrorBody),
        (status = 404, description = "No snapshot yet", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi-snapshots"
)]
pub(crate) async fn latest_lecturer_snapshot(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
) -> Result<Success<KpiSnapshot>, AppError> {
    let lecturer_id = owner_gate(&state, &caller, path)?;
    let latest = state
        .kpi_snapshots
        .filter(|k| k.lecturer_id == lecturer_id)
        .into_iter()
        .max_by_key(|k| k.calculated_at)
        .ok_or_else(|| {
            AppError::NotFound("No KPI snapshot found for this lecturer".into())
        })?;
    Ok(success(latest).message("Latest KPI snapshot retrieved successfully"))
}

/// GET /api/v1/kpi-snapshots/:id — Get one snapshot.
#[utoipa::path(
    get,
    path = "/api/v1/kpi-snapshots/{id}",
    params(("id" = Uuid, Path, description = "KPI snapshot ID")),
    responses(
        (status = 200, description = "KPI snapshot retrieved", body = KpiSnapshot),
        (status = 404, description = "KPI snapshot not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi-snapshots"
)]
pub(crate) async fn get_snapshot(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<KpiSnapshot>, AppError> {
    authorize(&caller, OVERSIGHT_AND_DOSEN)?;
    let id = extract_path(path)?;
    let snapshot = state
        .kpi_snapshots
        .get(&id)
        .ok_or_else(|| not_found("KPI snapshot"))?;
    Ok(success(snapshot).message("KPI snapshot retrieved successfully"))
}

/// POST /api/v1/kpi-snapshots — Record a calculation.
#[utoipa::path(
    post,
    path = "/api/v1/kpi-snapshots",
    request_body = CreateKpiSnapshotRequest,
    responses(
        (status = 201, description = "KPI snapshot created", body = KpiSnapshot),
        (status = 400, description = "Missing ids", body = crate::envelope::ErrorBody),
        (status = 404, description = "Lecturer or academic period not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi-snapshots"
)]
pub(crate) async fn create_snapshot(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateKpiSnapshotRequest>, JsonRejection>,
) -> Result<Success<KpiSnapshot>, AppError> {
    let actor = authorize(&caller, CALCULATORS)?;
    let req = extract_validated_json(body)?;
    ensure_lecturer_and_period(&state, &req.lecturer_id, &req.academic_period_id)?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let mut snapshot = KpiSnapshot {
        id,
        academic_period_id: req.academic_period_id,
        lecturer_id: req.lecturer_id,
        teaching_score: None,
        research_score: None,
        service_score: None,
        support_score: None,
        tridharma_index: None,
        evidence_score: None,
        bkd_compliance_score: None,
        risk_score: 0.0,
        calculated_by_user_id: *actor.id.as_uuid(),
        calculated_at: now,
        created_at: now,
    };
    req.scores.apply(&mut snapshot);
    state.kpi_snapshots.insert(id, snapshot.clone());
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&snapshot));

    Ok(success(snapshot)
        .message("KPI snapshot created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/kpi-snapshots/:id — Recalculate a snapshot.
#[utoipa::path(
    put,
    path = "/api/v1/kpi-snapshots/{id}",
    params(("id" = Uuid, Path, description = "KPI snapshot ID")),
    request_body = UpdateKpiSnapshotRequest,
    responses(
        (status = 200, description = "KPI snapshot updated", body = KpiSnapshot),
        (status = 404, description = "KPI snapshot not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi-snapshots"
)]
pub(crate) async fn update_snapshot(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateKpiSnapshotRequest>, JsonRejection>,
) -> Result<Success<KpiSnapshot>, AppError> {
    let actor = authorize(&caller, CALCULATORS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state
        .kpi_snapshots
        .get(&id)
        .ok_or_else(|| not_found("KPI snapshot"))?;

    let updated = state
        .kpi_snapshots
        .update(&id, |k| {
            req.scores.apply(k);
            k.calculated_by_user_id = *actor.id.as_uuid();
            k.calculated_at = Utc::now();
        })
        .ok_or_else(|| not_found("KPI snapshot"))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("KPI snapshot updated successfully"))
}

/// DELETE /api/v1/kpi-snapshots/:id — Delete a snapshot (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/kpi-snapshots/{id}",
    params(("id" = Uuid, Path, description = "KPI snapshot ID")),
    responses(
        (status = 200, description = "KPI snapshot deleted"),
        (status = 404, description = "KPI snapshot not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi-snapshots"
)]
pub(crate) async fn delete_snapshot(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    let removed = state
        .kpi_snapshots
        .remove(&id)
        .ok_or_else(|| not_found("KPI snapshot"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("KPI snapshot deleted successfully"))
}
