//! # Evidence Types
//!
//! The catalogue of evidence document kinds. Small and rarely changed, so
//! the listing is not paginated.
//!
//! - `GET    /api/v1/evidence-types` — list by name, filter `requiredForBkd`
//! - `POST   /api/v1/evidence-types` — create (ADMIN)
//! - `GET    /api/v1/evidence-types/:id` — get
//! - `PUT    /api/v1/evidence-types/:id` — update (ADMIN)
//! - `DELETE /api/v1/evidence-types/:id` — delete (ADMIN)
//!
//! Codes are unique. A type referenced by an evidence cannot be deleted.

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::auth::Caller;
use crate::authorize::{authenticated, authorize, ADMIN_ONLY};
use crate::envelope::{success, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::EvidenceType;
use crate::routes::{not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "evidence_type";
const CODE_TAKEN: &str = "Evidence type code already exists";

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvidenceTypeRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub required_for_bkd: bool,
}

impl Validate for CreateEvidenceTypeRequest {
    fn validate(&self) -> Result<(), String> {
        if is_blank(&self.code) || is_blank(&self.name) {
            return Err("Code and name are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvidenceTypeRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub required_for_bkd: Option<bool>,
}

impl Validate for UpdateEvidenceTypeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.code.as_deref().is_some_and(is_blank) || self.name.as_deref().is_some_and(is_blank)
        {
            return Err("Code and name must not be empty".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_evidence_types).post(create_evidence_type))
        .route(
            "/:id",
            get(get_evidence_type)
                .put(update_evidence_type)
                .delete(delete_evidence_type),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/evidence-types — The whole catalogue, by name.
#[utoipa::path(
    get,
    path = "/api/v1/evidence-types",
    params(("requiredForBkd" = Option<bool>, Query, description = "Only types the BKD report requires (or not)")),
    responses((status = 200, description = "Evidence types retrieved", body = [EvidenceType])),
    security(("bearer_auth" = [])),
    tag = "evidence-types"
)]
pub(crate) async fn list_evidence_types(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Success<Vec<EvidenceType>>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let mut items = state
        .evidence_types
        .filter(|t| filters.flag("requiredForBkd", t.required_for_bkd));
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(success(items).message("Evidence types retrieved successfully"))
}

/// GET /api/v1/evidence-types/:id — Get one type.
#[utoipa::path(
    get,
    path = "/api/v1/evidence-types/{id}",
    params(("id" = Uuid, Path, description = "Evidence type ID")),
    responses(
        (status = 200, description = "Evidence type retrieved", body = EvidenceType),
        (status = 404, description = "Evidence type not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidence-types"
)]
pub(crate) async fn get_evidence_type(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<EvidenceType>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let evidence_type = state
        .evidence_types
        .get(&id)
        .ok_or_else(|| not_found("Evidence type"))?;
    Ok(success(evidence_type).message("Evidence type retrieved successfully"))
}

/// POST /api/v1/evidence-types — Register a type (ADMIN).
#[utoipa::path(
    post,
    path = "/api/v1/evidence-types",
    request_body = CreateEvidenceTypeRequest,
    responses(
        (status = 201, description = "Evidence type created", body = EvidenceType),
        (status = 400, description = "Missing required fields", body = crate::envelope::ErrorBody),
        (status = 409, description = "Code already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidence-types"
)]
pub(crate) async fn create_evidence_type(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateEvidenceTypeRequest>, JsonRejection>,
) -> Result<Success<EvidenceType>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let req = extract_validated_json(body)?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let evidence_type = EvidenceType {
        id,
        code: req.code,
        name: req.name,
        description: req.description,
        required_for_bkd: req.required_for_bkd,
        created_at: now,
        updated_at: now,
    };
    if !state
        .evidence_types
        .insert_unique(id, evidence_type.clone(), |t| t.code == evidence_type.code)
    {
        return Err(AppError::Conflict(CODE_TAKEN.into()));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&evidence_type));

    Ok(success(evidence_type)
        .message("Evidence type created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/evidence-types/:id — Update a type (ADMIN).
#[utoipa::path(
    put,
    path = "/api/v1/evidence-types/{id}",
    params(("id" = Uuid, Path, description = "Evidence type ID")),
    request_body = UpdateEvidenceTypeRequest,
    responses(
        (status = 200, description = "Evidence type updated", body = EvidenceType),
        (status = 404, description = "Evidence type not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Code already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidence-types"
)]
pub(crate) async fn update_evidence_type(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateEvidenceTypeRequest>, JsonRejection>,
) -> Result<Success<EvidenceType>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state
        .evidence_types
        .get(&id)
        .ok_or_else(|| not_found("Evidence type"))?;

    let updated = state
        .evidence_types
        .update_unique(
            &id,
            |t| {
                if let Some(code) = req.code {
                    t.code = code;
                }
                if let Some(name) = req.name {
                    t.name = name;
                }
                if req.description.is_some() {
                    t.description = req.description;
                }
                if let Some(required) = req.required_for_bkd {
                    t.required_for_bkd = required;
                }
                t.updated_at = Utc::now();
            },
            |other, updated| other.code == updated.code,
        )
        .ok_or_else(|| not_found("Evidence type"))?
        .map_err(|()| AppError::Conflict(CODE_TAKEN.into()))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Evidence type updated successfully"))
}

/// DELETE /api/v1/evidence-types/:id — Delete an unused type (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/evidence-types/{id}",
    params(("id" = Uuid, Path, description = "Evidence type ID")),
    responses(
        (status = 200, description = "Evidence type deleted"),
        (status = 400, description = "Type is referenced by evidences", body = crate::envelope::ErrorBody),
        (status = 404, description = "Evidence type not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "evidence-types"
)]
pub(crate) async fn delete_evidence_type(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    if !state.evidence_types.contains(&id) {
        return Err(not_found("Evidence type"));
    }
    if state.evidences.any(|e| e.evidence_type_id == Some(id)) {
        return Err(AppError::BadRequest(
            "Cannot delete evidence type with related evidences".into(),
        ));
    }
    let removed = state
        .evidence_types
        .remove(&id)
        .ok_or_else(|| not_found("Evidence type"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Evidence type deleted successfully"))
}
