//! # Institutions
//!
//! Root of the organisation tree. Every authenticated caller may read;
//! only ADMIN may write.
//!
//! - `GET    /api/v1/institutions` — list, filter `search` (name or code)
//! - `POST   /api/v1/institutions` — create
//! - `GET    /api/v1/institutions/:id` — get
//! - `PUT    /api/v1/institutions/:id` — update
//! - `DELETE /api/v1/institutions/:id` — delete (400 while faculties or users reference it)

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
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::Institution;
use crate::routes::{not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "institution";
const CODE_TAKEN: &str = "Institution code already exists";

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstitutionRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
}

impl Validate for CreateInstitutionRequest {
    fn validate(&self) -> Result<(), String> {
        if is_blank(&self.name) || is_blank(&self.code) {
            return Err("Name and code are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstitutionRequest {
    pub name: Option<String>,
    pub code: Option<String>,
}

impl Validate for UpdateInstitutionRequest {
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
        .route("/", get(list_institutions).post(create_institution))
        .route(
            "/:id",
            get(get_institution)
                .put(update_institution)
                .delete(delete_institution),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/institutions — List institutions by name.
#[utoipa::path(
    get,
    path = "/api/v1/institutions",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("search" = Option<String>, Query, description = "Name or code substring"),
    ),
    responses(
        (status = 200, description = "Institutions retrieved"),
        (status = 401, description = "Unauthenticated", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "institutions"
)]
pub(crate) async fn list_institutions(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Institution>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let mut items = state
        .institutions
        .filter(|i| filters.search([Some(i.name.as_str()), Some(i.code.as_str())]));
    items.sort_by(|a, b| a.name.cmp(&b.name));
    let page = state.page_request(&query).slice(items);
    Ok(Paginated::from(page).message("Institutions retrieved successfully"))
}

/// GET /api/v1/institutions/:id — Get one institution.
#[utoipa::path(
    get,
    path = "/api/v1/institutions/{id}",
    params(("id" = Uuid, Path, description = "Institution ID")),
    responses(
        (status = 200, description = "Institution retrieved", body = Institution),
        (status = 404, description = "Institution not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "institutions"
)]
pub(crate) async fn get_institution(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<Institution>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let institution = state
        .institutions
        .get(&id)
        .ok_or_else(|| not_found("Institution"))?;
    Ok(success(institution).message("Institution retrieved successfully"))
}

/// POST /api/v1/institutions — Create an institution (ADMIN).
#[utoipa::path(
    post,
    path = "/api/v1/institutions",
    request_body = CreateInstitutionRequest,
    responses(
        (status = 201, description = "Institution created", body = Institution),
        (status = 400, description = "Missing fields", body = crate::envelope::ErrorBody),
        (status = 403, description = "Not ADMIN", body = crate::envelope::ErrorBody),
        (status = 409, description = "Code already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "institutions"
)]
pub(crate) async fn create_institution(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateInstitutionRequest>, JsonRejection>,
) -> Result<Success<Institution>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let req = extract_validated_json(body)?;
    let now = Utc::now();
    let id = Uuid::new_v4();
    let institution = Institution {
        id,
        name: req.name,
        code: req.code,
        created_at: now,
        updated_at: now,
    };

    if !state
        .institutions
        .insert_unique(id, institution.clone(), |i| i.code == institution.code)
    {
        return Err(AppError::Conflict(CODE_TAKEN.into()));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&institution));

    Ok(success(institution)
        .message("Institution created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/institutions/:id — Update an institution (ADMIN).
#[utoipa::path(
    put,
    path = "/api/v1/institutions/{id}",
    params(("id" = Uuid, Path, description = "Institution ID")),
    request_body = UpdateInstitutionRequest,
    responses(
        (status = 200, description = "Institution updated", body = Institution),
        (status = 404, description = "Institution not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Code already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "institutions"
)]
pub(crate) async fn update_institution(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateInstitutionRequest>, JsonRejection>,
) -> Result<Success<Institution>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state
        .institutions
        .get(&id)
        .ok_or_else(|| not_found("Institution"))?;

    let updated = state
        .institutions
        .update_unique(
            &id,
            |i| {
                if let Some(name) = req.name {
                    i.name = name;
                }
                if let Some(code) = req.code {
                    i.code = code;
                }
                i.updated_at = Utc::now();
            },
            |other, updated| other.code == updated.code,
        )
        .ok_or_else(|| not_found("Institution"))?
        .map_err(|()| AppError::Conflict(CODE_TAKEN.into()))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Institution updated successfully"))
}

/// DELETE /api/v1/institutions/:id — Delete an institution (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/institutions/{id}",
    params(("id" = Uuid, Path, description = "Institution ID")),
    responses(
        (status = 200, description = "Institution deleted"),
        (status = 400, description = "Institution still referenced", body = crate::envelope::ErrorBody),
        (status = 404, description = "Institution not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "institutions"
)]
pub(crate) async fn delete_institution(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    if !state.institutions.contains(&id) {
        return Err(not_found("Institution"));
    }
    if state.faculties.any(|f| f.institution_id == id)
        || state.users.any(|u| u.institution_id == Some(id))
    {
        return Err(AppError::BadRequest(
            "Cannot delete institution with related data".into(),
        ));
    }
    let removed = state
        .institutions
        .remove(&id)
        .ok_or_else(|| not_found("Institution"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Institution deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{self, send};
    use axum::http::Method;
    use kinerja_core::RoleName;
    use serde_json::json;

    #[tokio::test]
    async fn admin_creates_and_duplicate_code_conflicts() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let admin = test_support::user(&state, &[RoleName::Admin]);

        let body = json!({"name": "Universitas Contoh", "code": "UC"});
        let (status, json) = send(&app, Method::POST, "/api/v1/institutions", Some(admin), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Institution created successfully");
        assert_eq!(json["data"]["code"], "UC");

        let (status, json) = send(&app, Method::POST, "/api/v1/institutions", Some(admin), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], CODE_TAKEN);
        assert_eq!(state.audit.len(), 1);
    }

    #[tokio::test]
    async fn non_admin_cannot_create() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let dekan = test_support::user(&state, &[RoleName::Dekan]);
        let (status, json) = send(
            &app,
            Method::POST,
            "/api/v1/institutions",
            Some(dekan),
            Some(json!({"name": "X", "code": "X"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], "Access denied. Insufficient permissions.");
        assert!(state.institutions.is_empty());
    }

    #[tokio::test]
    async fn missing_fields_are_400() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let admin = test_support::user(&state, &[RoleName::Admin]);
        let (status, json) = send(
            &app,
            Method::POST,
            "/api/v1/institutions",
            Some(admin),
            Some(json!({"name": "Tanpa Kode"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Name and code are required");
    }

    #[tokio::test]
    async fn list_is_sorted_searched_and_paginated() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let dosen = test_support::user(&state, &[RoleName::Dosen]);
        for code in ["C", "A", "B"] {
            test_support::institution(&state, code);
        }

        let (status, json) = send(&app, Method::GET, "/api/v1/institutions?limit=2", Some(dosen), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"][0]["code"], "A");
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
        assert_eq!(json["pagination"]["total"], 3);
        assert_eq!(json["pagination"]["totalPages"], 2);
        assert_eq!(json["pagination"]["hasNext"], true);

        let (_, json) = send(&app, Method::GET, "/api/v1/institutions?search=universitas%20b", Some(dosen), None).await;
        assert_eq!(json["pagination"]["total"], 1);
        assert_eq!(json["data"][0]["code"], "B");
    }

    #[tokio::test]
    async fn update_rejects_taken_code_and_keeps_own() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let admin = test_support::user(&state, &[RoleName::Admin]);
        let a = test_support::institution(&state, "A");
        test_support::institution(&state, "B");

        let uri = format!("/api/v1/institutions/{a}");
        let (status, _) = send(&app, Method::PUT, &uri, Some(admin), Some(json!({"code": "A", "name": "Baru"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.institutions.get(&a).unwrap().name, "Baru");

        let (status, json) = send(&app, Method::PUT, &uri, Some(admin), Some(json!({"code": "B"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], CODE_TAKEN);
    }

    #[tokio::test]
    async fn delete_blocked_by_faculties() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let admin = test_support::user(&state, &[RoleName::Admin]);
        let id = test_support::institution(&state, "A");
        let faculty = test_support::faculty(&state, id, "FT");
        let uri = format!("/api/v1/institutions/{id}");

        let (status, json) = send(&app, Method::DELETE, &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Cannot delete institution with related data");

        state.faculties.remove(&faculty);
        let (status, json) = send(&app, Method::DELETE, &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], serde_json::Value::Null);

        let (status, json) = send(&app, Method::GET, &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Institution not found");
    }

    #[tokio::test]
    async fn malformed_id_is_400_envelope() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let admin = test_support::user(&state, &[RoleName::Admin]);
        let (status, json) = send(&app, Method::GET, "/api/v1/institutions/not-a-uuid", Some(admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
    }
}
