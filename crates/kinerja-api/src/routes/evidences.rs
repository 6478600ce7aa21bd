//! # Evidences
//!
//! Supporting documents for a lecturer's activities. Files live elsewhere;
//! a record only carries the URL and metadata. New evidence starts as
//! `DRAFT` until a reviewer sets its verification status.
//!
//! - `GET    /api/v1/evidences` — list, filters `lecturerId`, `academicPeriodId`, `evidenceType`, `verifiedStatus`, `search`
//! - `GET    /api/v1/evidences/lecturer/:lecturerId` — one lecturer's evidence (owner, or overseers)
//! - `POST   /api/v1/evidences` — create (KAPRODI, DOSEN)
//! - `GET    /api/v1/evidences/:id` — get
//! - `PUT    /api/v1/evidences/:id` — update (KAPRODI, DOSEN)
//! - `PUT    /api/v1/evidences/:id/status` — set verification status (KAPRODI, LPM)
//! - `DELETE /api/v1/evidences/:id` — delete (KAPRODI)
//! - `POST   /api/v1/evidences/:id/links` — link to another resource (KAPRODI, DOSEN)
//! - `DELETE /api/v1/evidences/:id/links/:linkId` — remove a link (KAPRODI, DOSEN)
//!
//! `GET /:id` embeds the evidence's links. Deleting an evidence drops its
//! links with it.

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use kinerja_core::{RoleName, RoleSet};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::auth::Caller;
use crate::authorize::{authenticated, authorize, authorize_lecturer_path, OVERSIGHT};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::{Evidence, EvidenceLink, DEFAULT_EVIDENCE_STATUS};
use crate::routes::{ensure_lecturer_and_period, not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "evidence";
const LINK_ENTITY: &str = "evidence_link";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi, RoleName::Dosen]);
const VERIFIERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi, RoleName::Lpm]);
const DELETERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi]);

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvidenceRequest {
    #[serde(default)]
    pub lecturer_id: Uuid,
    #[serde(default)]
    pub academic_period_id: Uuid,
    #[serde(default)]
    pub evidence_type: String,
    pub evidence_type_id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    pub file_url: Option<String>,
    pub mime_type: Option<String>,
    pub issued_at: Option<NaiveDate>,
}

impl Validate for CreateEvidenceRequest {
    fn validate(&self) -> Result<(), String> {
        if is_blank(&self.evidence_type)
            || is_blank(&self.title)
            || self.lecturer_id.is_nil()
            || self.academic_period_id.is_nil()
        {
            return Err(
                "Evidence type, title, lecturer ID, and academic period ID are required"
                    .to_string(),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvidenceRequest {
    pub evidence_type: Option<String>,
    pub evidence_type_id: Option<Uuid>,
    pub title: Option<String>,
    pub file_url: Option<String>,
    pub mime_type: Option<String>,
    pub issued_at: Option<NaiveDate>,
}

impl Validate for UpdateEvidenceRequest {
    fn validate(&self) -> Result<(), String> {
        if self.evidence_type.as_deref().is_some_and(is_blank)
            || self.title.as_deref().is_some_and(is_blank)
        {
            return Err("Evidence type and title must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvidenceStatusRequest {
    #[serde(default)]
    pub verified_status: String,
}

impl Validate for UpdateEvidenceStatusRequest {
    fn validate(&self) -> Result<(), String> {
        if is_blank(&self.verified_status) {
            return Err("Verified status is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvidenceLinkRequest {
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: Uuid,
}

impl Validate for CreateEvidenceLinkRequest {
    fn validate(&self) -> Result<(), String> {
        if is_blank(&self.entity_type) || self.entity_id.is_nil() {
            return Err("Entity type and entity ID are required".to_string());
        }
        Ok(())
    }
}

/// An evidence together with the resources it is linked to.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceDetail {
    #[serde(flatten)]
    pub evidence: Evidence,
    pub links: Vec<EvidenceLink>,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_evidences).post(create_evidence))
        .route("/lecturer/:lecturer_id", get(list_lecturer_evidences))
        .route(
            "/:id",
            get(get_evidence).put(update_evidence).delete(delete_evidence),
        )
        .route("/:id/status", put(update_evidence_status))
        .route("/:id/links", post(create_link))
        .route("/:id/links/:link_id", delete(delete_link))
}

/// 404 unless the referenced evidence type exists.
fn ensure_evidence_type(state: &AppState, evidence_type_id: Option<&Uuid>) -> Result<(), AppError> {
    match evidence_type_id {
        Some(id) if !state.evidence_types.contains(id) => Err(not_found("Evidence type")),
        _ => Ok(()),
    }
}

fn newest_first(mut items: Vec<Evidence>) -> Vec<Evidence> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/evidences — List evidence, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/evidences",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("lecturerId" = Option<Uuid>, Query, description = "Lecturer"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
        ("evidenceType" = Option<String>, Query, description = "Exact evidence type"),
        ("verifiedStatus" = Option<String>, Query, description = "Exact verification status"),
        ("search" = Option<String>, Query, description = "Title substring"),
    ),
    responses((status = 200, description = "Evidences retrieved")),
    security(("bearer_auth" = [])),
    tag = "evidences"
)]
pub(crate) async fn list_evidences(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Evidence>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let items = state.evidences.filter(|e| {
        filters.id("lecturerId", &e.lecturer_id)
            && filters.id("academicPeriodId", &e.academic_period_id)
            && filters.eq("evidenceType", &e.evidence_type)
            && filters.eq("verifiedStatus", &e.verified_status)
            && filters.search([Some(e.title.as_str())])
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Evidences retrieved successfully"))
}

/// GET /api/v1/evidences/lecturer/:lecturerId — One lecturer's evidence.
#[utoipa::path(
    get,
    path = "/api/v1/evidences/lecturer/{lecturerId}",
    params(
        ("lecturerId" = Uuid, Path, description = "Lecturer ID"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
    ),
    responses(
        (status = 200, description = "Evidences retrieved"),
        (status = 403, description = "Neither owner nor overseer", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidences"
)]
pub(crate) async fn list_lecturer_evidences(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Evidence>, AppError> {
    let lecturer_id = authorize_lecturer_path(&caller, OVERSIGHT, path)?;
    if !state.lecturers.contains(&lecturer_id) {
        return Err(not_found("Lecturer"));
    }
    let filters = Filters(&query);
    let items = state.evidences.filter(|e| {
        e.lecturer_id == lecturer_id && filters.id("academicPeriodId", &e.academic_period_id)
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Evidences retrieved successfully"))
}

/// GET /api/v1/evidences/:id — Get one evidence record.
#[utoipa::path(
    get,
    path = "/api/v1/evidences/{id}",
    params(("id" = Uuid, Path, description = "Evidence ID")),
    responses(
        (status = 200, description = "Evidence retrieved", body = EvidenceDetail),
        (status = 404, description = "Evidence not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidences"
)]
pub(crate) async fn get_evidence(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<EvidenceDetail>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let evidence = state.evidences.get(&id).ok_or_else(|| not_found("Evidence"))?;
    let mut links = state.evidence_links.filter(|l| l.evidence_id == id);
    links.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(success(EvidenceDetail { evidence, links }).message("Evidence retrieved successfully"))
}

/// POST /api/v1/evidences — File new evidence as `DRAFT`.
#[utoipa::path(
    post,
    path = "/api/v1/evidences",
    request_body = CreateEvidenceRequest,
    responses(
        (status = 201, description = "Evidence created", body = Evidence),
        (status = 400, description = "Missing required fields", body = crate::envelope::ErrorBody),
        (status = 404, description = "Lecturer, academic period or evidence type not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidences"
)]
pub(crate) async fn create_evidence(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateEvidenceRequest>, JsonRejection>,
) -> Result<Success<Evidence>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let req = extract_validated_json(body)?;
    ensure_lecturer_and_period(&state, &req.lecturer_id, &req.academic_period_id)?;
    ensure_evidence_type(&state, req.evidence_type_id.as_ref())?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let evidence = Evidence {
        id,
        lecturer_id: req.lecturer_id,
        academic_period_id: req.academic_period_id,
        evidence_type: req.evidence_type,
        evidence_type_id: req.evidence_type_id,
        title: req.title,
        file_url: req.file_url,
        mime_type: req.mime_type,
        issued_at: req.issued_at,
        verified_status: DEFAULT_EVIDENCE_STATUS.to_string(),
        uploaded_by_user_id: *actor.id.as_uuid(),
        created_at: now,
        updated_at: now,
    };
    state.evidences.insert(id, evidence.clone());
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&evidence));

    Ok(success(evidence)
        .message("Evidence created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/evidences/:id — Update evidence metadata.
#[utoipa::path(
    put,
    path = "/api/v1/evidences/{id}",
    params(("id" = Uuid, Path, description = "Evidence ID")),
    request_body = UpdateEvidenceRequest,
    responses(
        (status = 200, description = "Evidence updated", body = Evidence),
        (status = 404, description = "Evidence not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidences"
)]
pub(crate) async fn update_evidence(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateEvidenceRequest>, JsonRejection>,
) -> Result<Success<Evidence>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state.evidences.get(&id).ok_or_else(|| not_found("Evidence"))?;
    ensure_evidence_type(&state, req.evidence_type_id.as_ref())?;

    let updated = state
        .evidences
        .update(&id, |e| {
            if let Some(evidence_type) = req.evidence_type {
                e.evidence_type = evidence_type;
            }
            if req.evidence_type_id.is_some() {
                e.evidence_type_id = req.evidence_type_id;
            }
            if let Some(title) = req.title {
                e.title = title;
            }
            if req.file_url.is_some() {
                e.file_url = req.file_url;
            }
            if req.mime_type.is_some() {
                e.mime_type = req.mime_type;
            }
            if req.issued_at.is_some() {
                e.issued_at = req.issued_at;
            }
            e.updated_at = Utc::now();
        })
        .ok_or_else(|| not_found("Evidence"))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Evidence updated successfully"))
}

/// PUT /api/v1/evidences/:id/status — Set the verification status.
#[utoipa::path(
    put,
    path = "/api/v1/evidences/{id}/status",
    params(("id" = Uuid, Path, description = "Evidence ID")),
    request_body = UpdateEvidenceStatusRequest,
    responses(
        (status = 200, description = "Evidence status updated", body = Evidence),
        (status = 400, description = "Verified status missing", body = crate::envelope::ErrorBody),
        (status = 404, description = "Evidence not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidences"
)]
pub(crate) async fn update_evidence_status(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateEvidenceStatusRequest>, JsonRejection>,
) -> Result<Success<Evidence>, AppError> {
    let actor = authorize(&caller, VERIFIERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state.evidences.get(&id).ok_or_else(|| not_found("Evidence"))?;

    let updated = state
        .evidences
        .update(&id, |e| {
            e.verified_status = req.verified_status;
            e.updated_at = Utc::now();
        })
        .ok_or_else(|| not_found("Evidence"))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Evidence status updated successfully"))
}

/// DELETE /api/v1/evidences/:id — Delete evidence (ADMIN, KAPRODI).
#[utoipa::path(
    delete,
    path = "/api/v1/evidences/{id}",
    params(("id" = Uuid, Path, description = "Evidence ID")),
    responses(
        (status = 200, description = "Evidence deleted"),
        (status = 404, description = "Evidence not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidences"
)]
pub(crate) async fn delete_evidence(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, DELETERS)?;
    let id = extract_path(path)?;
    let removed = state.evidences.remove(&id).ok_or_else(|| not_found("Evidence"))?;
    for link in state.evidence_links.filter(|l| l.evidence_id == id) {
        state.evidence_links.remove(&link.id);
    }
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Evidence deleted successfully"))
}

/// POST /api/v1/evidences/:id/links — Link an evidence to another resource.
#[utoipa::path(
    post,
    path = "/api/v1/evidences/{id}/links",
    params(("id" = Uuid, Path, description = "Evidence ID")),
    request_body = CreateEvidenceLinkRequest,
    responses(
        (status = 201, description = "Evidence link created", body = EvidenceLink),
        (status = 400, description = "Missing required fields", body = crate::envelope::ErrorBody),
        (status = 404, description = "Evidence not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidences"
)]
pub(crate) async fn create_link(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<CreateEvidenceLinkRequest>, JsonRejection>,
) -> Result<Success<EvidenceLink>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let evidence_id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    if !state.evidences.contains(&evidence_id) {
        return Err(not_found("Evidence"));
    }

    let id = Uuid::new_v4();
    let link = EvidenceLink {
        id,
        evidence_id,
        entity_type: req.entity_type,
        entity_id: req.entity_id,
        created_at: Utc::now(),
    };
    state.evidence_links.insert(id, link.clone());
    state.record(actor, AuditAction::Create, LINK_ENTITY, id, None, Some(&link));

    Ok(success(link)
        .message("Evidence link created successfully")
        .status(StatusCode::CREATED))
}

/// DELETE /api/v1/evidences/:id/links/:linkId — Remove one of an evidence's links.
#[utoipa::path(
    delete,
    path = "/api/v1/evidences/{id}/links/{linkId}",
    params(
        ("id" = Uuid, Path, description = "Evidence ID"),
        ("linkId" = Uuid, Path, description = "Evidence link ID"),
    ),
    responses(
        (status = 200, description = "Evidence link deleted"),
        (status = 404, description = "Evidence link not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidences"
)]
pub(crate) async fn delete_link(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let (evidence_id, link_id) = extract_path(path)?;
    let belongs = state
        .evidence_links
        .get(&link_id)
        .is_some_and(|l| l.evidence_id == evidence_id);
    if !belongs {
        return Err(not_found("Evidence link"));
    }
    let removed = state
        .evidence_links
        .remove(&link_id)
        .ok_or_else(|| not_found("Evidence link"))?;
    state.record(actor, AuditAction::Delete, LINK_ENTITY, link_id, Some(&removed), None);

    Ok(success(()).message("Evidence link deleted successfully"))
}
