//! # Audit Logs
//!
//! Read access to the hash-chained audit trail. Every route is ADMIN only;
//! the gate is applied once to the whole router.
//!
//! - `GET /api/v1/audit-logs` — list, filters `actorUserId`, `entityType`, `entityId`, `action`
//! - `GET /api/v1/audit-logs/verify` — walk the chain
//! - `GET /api/v1/audit-logs/entity/:entityType/:entityId` — history of one record
//! - `GET /api/v1/audit-logs/user/:userId` — everything one user did
//! - `GET /api/v1/audit-logs/:id` — one record

use std::collections::HashMap;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Query, State};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use uuid::Uuid;

use crate::audit::{AuditRecord, ChainIntegrity};
use crate::authorize::{require_roles, ADMIN_ONLY};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::extract_path;
use crate::routes::{not_found, Filters};
use crate::state::AppState;

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/verify", get(verify_chain))
        .route("/entity/:entity_type/:entity_id", get(list_entity_history))
        .route("/user/:user_id", get(list_user_activity))
        .route("/:id", get(get_audit_log))
        .route_layer(from_fn_with_state(ADMIN_ONLY, require_roles))
}

fn newest_first(mut records: Vec<AuditRecord>) -> Vec<AuditRecord> {
    records.reverse();
    records
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/audit-logs — List audit records, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("actorUserId" = Option<Uuid>, Query, description = "Acting user"),
        ("entityType" = Option<String>, Query, description = "Entity type, e.g. lecturer"),
        ("entityId" = Option<Uuid>, Query, description = "Entity ID"),
        ("action" = Option<String>, Query, description = "CREATE, UPDATE or DELETE"),
    ),
    responses((status = 200, description = "Audit logs retrieved")),
    security(("bearer_auth" = [])),
    tag = "audit-logs"
)]
pub(crate) async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<AuditRecord>, AppError> {
    let filters = Filters(&query);
    let records: Vec<AuditRecord> = state
        .audit
        .list()
        .into_iter()
        .filter(|r| {
            filters.id("actorUserId", &r.actor_user_id)
                && filters.eq("entityType", &r.entity_type)
                && filters.id("entityId", &r.entity_id)
                && filters.eq("action", r.action.as_str())
        })
        .collect();
    let page = state.page_request(&query).slice(newest_first(records));
    Ok(Paginated::from(page).message("Audit logs retrieved successfully"))
}

/// GET /api/v1/audit-logs/verify — Verify the hash chain.
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs/verify",
    responses((status = 200, description = "Chain verified", body = ChainIntegrity)),
    security(("bearer_auth" = [])),
    tag = "audit-logs"
)]
pub(crate) async fn verify_chain(State(state): State<AppState>) -> Success<ChainIntegrity> {
    let integrity = state.audit.verify();
    if !integrity.chain_valid {
        tracing::error!(
            broken_links = integrity.broken_links,
            total_events = integrity.total_events,
            "audit chain integrity check failed"
        );
    }
    success(integrity).message("Audit chain verified")
}

/// GET /api/v1/audit-logs/entity/:entityType/:entityId — History of one record.
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs/entity/{entityType}/{entityId}",
    params(
        ("entityType" = String, Path, description = "Entity type, e.g. lecturer"),
        ("entityId" = Uuid, Path, description = "Entity ID"),
    ),
    responses((status = 200, description = "Audit logs retrieved")),
    security(("bearer_auth" = [])),
    tag = "audit-logs"
)]
pub(crate) async fn list_entity_history(
    State(state): State<AppState>,
    path: Result<Path<(String, Uuid)>, PathRejection>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<AuditRecord>, AppError> {
    let (entity_type, entity_id) = extract_path(path)?;
    let records: Vec<AuditRecord> = state
        .audit
        .list()
        .into_iter()
        .filter(|r| r.entity_type == entity_type && r.entity_id == entity_id)
        .collect();
    let page = state.page_request(&query).slice(newest_first(records));
    Ok(Paginated::from(page).message("Audit logs retrieved successfully"))
}

/// GET /api/v1/audit-logs/user/:userId — Everything one user did.
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs/user/{userId}",
    params(("userId" = Uuid, Path, description = "Acting user ID")),
    responses((status = 200, description = "Audit logs retrieved")),
    security(("bearer_auth" = [])),
    tag = "audit-logs"
)]
pub(crate) async fn list_user_activity(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<AuditRecord>, AppError> {
    let user_id = extract_path(path)?;
    let records: Vec<AuditRecord> = state
        .audit
        .list()
        .into_iter()
        .filter(|r| r.actor_user_id == user_id)
        .collect();
    let page = state.page_request(&query).slice(newest_first(records));
    Ok(Paginated::from(page).message("Audit logs retrieved successfully"))
}

/// GET /api/v1/audit-logs/:id — One audit record.
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs/{id}",
    params(("id" = Uuid, Path, description = "Audit record ID")),
    responses(
        (status = 200, description = "Audit log retrieved", body = AuditRecord),
        (status = 404, description = "Audit log not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "audit-logs"
)]
pub(crate) async fn get_audit_log(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<AuditRecord>, AppError> {
    let id = extract_path(path)?;
    let record = state.audit.get(&id).ok_or_else(|| not_found("Audit log"))?;
    Ok(success(record).message("Audit log retrieved successfully"))
}
