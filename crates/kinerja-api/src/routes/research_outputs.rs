//! # Research Outputs
//!
//! Publications, patents and other products of a research project.
//!
//! - `GET    /api/v1/research-outputs` — list, filters `researchProjectId`, `type`, `status`, `targetIndex`, `search`
//! - `GET    /api/v1/research-outputs/project/:projectId` — every output of one project (unpaginated)
//! - `POST   /api/v1/research-outputs` — create (KAPRODI, LPPM, DOSEN)
//! - `GET    /api/v1/research-outputs/:id` — get
//! - `PUT    /api/v1/research-outputs/:id` — update (KAPRODI, LPPM, DOSEN)
//! - `DELETE /api/v1/research-outputs/:id` — delete (LPPM)

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use kinerja_core::{RoleName, RoleSet};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::auth::Caller;
use crate::authorize::{authenticated, authorize};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::{ResearchOutput, DEFAULT_OUTPUT_STATUS, DEFAULT_TARGET_INDEX};
use crate::routes::{not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "research_output";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi, RoleName::Lppm, RoleName::Dosen]);
const DELETERS: RoleSet = RoleSet::of(&[RoleName::Lppm]);

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateResearchOutputRequest {
    #[serde(default)]
    pub research_project_id: Uuid,
    #[serde(default, rename = "type")]
    pub output_type: String,
    #[serde(default)]
    pub title: String,
    /// Defaults to `NONE`.
    pub target_index: Option<String>,
    /// Defaults to `DRAFT`.
    pub status: Option<String>,
    pub doi: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub citation_count_ytd: Option<u32>,
}

impl Validate for CreateResearchOutputRequest {
    fn validate(&self) -> Result<(), String> {
        if self.research_project_id.is_nil() || is_blank(&self.output_type) || is_blank(&self.title)
        {
            return Err("Research project ID, type, and title are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResearchOutputRequest {
    #[serde(rename = "type")]
    pub output_type: Option<String>,
    pub title: Option<String>,
    pub target_index: Option<String>,
    pub status: Option<String>,
    pub doi: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub citation_count_ytd: Option<u32>,
}

impl Validate for UpdateResearchOutputRequest {
    fn validate(&self) -> Result<(), String> {
        let labels = [&self.output_type, &self.title, &self.target_index, &self.status];
        if labels.into_iter().flatten().any(|v| is_blank(v)) {
            return Err("Type, title, target index, and status must not be empty".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_outputs).post(create_output))
        .route("/project/:project_id", get(list_project_outputs))
        .route(
            "/:id",
            get(get_output).put(update_output).delete(delete_output),
        )
}

fn newest_first(mut items: Vec<ResearchOutput>) -> Vec<ResearchOutput> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/research-outputs — List outputs, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/research-outputs",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("researchProjectId" = Option<Uuid>, Query, description = "Research project"),
        ("type" = Option<String>, Query, description = "Exact output type"),
        ("status" = Option<String>, Query, description = "Exact status"),
        ("targetIndex" = Option<String>, Query, description = "Exact index target"),
        ("search" = Option<String>, Query, description = "Title substring"),
    ),
    responses((status = 200, description = "Research outputs retrieved")),
    security(("bearer_auth" = [])),
    tag = "research-outputs"
)]
pub(crate) async fn list_outputs(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<ResearchOutput>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let items = state.research_outputs.filter(|o| {
        filters.id("researchProjectId", &o.research_project_id)
            && filters.eq("type", &o.output_type)
            && filters.eq("status", &o.status)
            && filters.eq("targetIndex", &o.target_index)
            && filters.search([Some(o.title.as_str())])
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Research outputs retrieved successfully"))
}

/// GET /api/v1/research-outputs/project/:projectId — All outputs of a project.
#[utoipa::path(
    get,
    path = "/api/v1/research-outputs/project/{projectId}",
    params(("projectId" = Uuid, Path, description = "Research project ID")),
    responses(
        (status = 200, description = "Research outputs retrieved", body = [ResearchOutput]),
        (status = 404, description = "Research project not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "research-outputs"
)]
pub(crate) async fn list_project_outputs(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<Vec<ResearchOutput>>, AppError> {
    authenticated(&caller)?;
    let project_id = extract_path(path)?;
    if !state.research_projects.contains(&project_id) {
        return Err(not_found("Research project"));
    }
    let items = state
        .research_outputs
        .filter(|o| o.research_project_id == project_id);
    Ok(success(newest_first(items)).message("Research outputs retrieved successfully"))
}

/// GET /api/v1/research-outputs/:id — Get one output.
#[utoipa::path(
    get,
    path = "/api/v1/research-outputs/{id}",
    params(("id" = Uuid, Path, description = "Research output ID")),
    responses(
        (status = 200, description = "Research output retrieved", body = ResearchOutput),
        (status = 404, description = "Research output not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "research-outputs"
)]
pub(crate) async fn get_output(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<ResearchOutput>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let output = state
        .research_outputs
        .get(&id)
        .ok_or_else(|| not_found("Research output"))?;
    Ok(success(output).message("Research output retrieved successfully"))
}

/// POST /api/v1/research-outputs — Record an output of a project.
#[utoipa::path(
    post,
    path = "/api/v1/research-outputs",
    request_body = CreateResearchOutputRequest,
    responses(
        (status = 201, description = "Research output created", body = ResearchOutput),
        (status = 400, description = "Missing required fields", body = crate::envelope::ErrorBody),
        (status = 404, description = "Research project not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "research-outputs"
)]
pub(crate) async fn create_output(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateResearchOutputRequest>, JsonRejection>,
) -> Result<Success<ResearchOutput>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let req = extract_validated_json(body)?;
    if !state.research_projects.contains(&req.research_project_id) {
        return Err(not_found("Research project"));
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let label = |value: Option<String>, default: &str| {
        value
            .filter(|v| !is_blank(v))
            .unwrap_or_else(|| default.to_string())
    };
    let output = ResearchOutput {
        id,
        research_project_id: req.research_project_id,
        output_type: req.output_type,
        title: req.title,
        target_index: label(req.target_index, DEFAULT_TARGET_INDEX),
        status: label(req.status, DEFAULT_OUTPUT_STATUS),
        doi: req.doi,
        publish_date: req.publish_date,
        citation_count_ytd: req.citation_count_ytd.unwrap_or(0),
        created_at: now,
        updated_at: now,
    };
    state.research_outputs.insert(id, output.clone());
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&output));

    Ok(success(output)
        .message("Research output created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/research-outputs/:id — Update an output.
#[utoipa::path(
    put,
    path = "/api/v1/research-outputs/{id}",
    params(("id" = Uuid, Path, description = "Research output ID")),
    request_body = UpdateResearchOutputRequest,
    responses(
        (status = 200, description = "Research output updated", body = ResearchOutput),
        (status = 404, description = "Research output not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "research-outputs"
)]
pub(crate) async fn update_output(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateResearchOutputRequest>, JsonRejection>,
) -> Result<Success<ResearchOutput>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state
        .research_outputs
        .get(&id)
        .ok_or_else(|| not_found("Research output"))?;

    let updated = state
        .research_outputs
        .update(&id, |o| {
            if let Some(output_type) = req.output_type {
                o.output_type = output_type;
            }
            if let Some(title) = req.title {
                o.title = title;
            }
            if let Some(target_index) = req.target_index {
                o.target_index = target_index;
            }
            if let Some(status) = req.status {
                o.status = status;
            }
            if req.doi.is_some() {
                o.doi = req.doi;
            }
            if req.publish_date.is_some() {
                o.publish_date = req.publish_date;
            }
            if let Some(citations) = req.citation_count_ytd {
                o.citation_count_ytd = citations;
            }
            o.updated_at = Utc::now();
        })
        .ok_or_else(|| not_found("Research output"))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Research output updated successfully"))
}

/// DELETE /api/v1/research-outputs/:id — Delete an output (ADMIN, LPPM).
#[utoipa::path(
    delete,
    path = "/api/v1/research-outputs/{id}",
    params(("id" = Uuid, Path, description = "Research output ID")),
    responses(
        (status = 200, description = "Research output deleted"),
        (status = 404, description = "Research output not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "research-outputs"
)]
pub(crate) async fn delete_output(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, DELETERS)?;
    let id = extract_path(path)?;
    let removed = state
        .research_outputs
        .remove(&id)
        .ok_or_else(|| not_found("Research output"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Research output deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Term;
    use crate::routes::test_support::{self, send};
    use axum::http::Method;
    use serde_json::{json, Value};

    async fn project(state: &AppState, app: &Router, user: Uuid, lecturer: Uuid) -> String {
        let period = test_support::period(state, 2024, Term::Ganjil);
        let body = json!({"lecturerId": lecturer, "academicPeriodId": period, "title": "Deteksi Banjir"});
        let (_, json) = send(app, Method::POST, "/api/v1/research-projects", Some(user), Some(body)).await;
        json["data"]["id"].as_str().unwrap().to_string()
    }

    fn journal(project_id: &str, title: &str) -> Value {
        json!({"researchProjectId": project_id, "type": "JOURNAL", "title": title})
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let (user, lecturer) = test_support::dosen(&state);
        let project_id = project(&state, &app, user, lecturer).await;

        let (status, json) = send(&app, Method::POST, "/api/v1/research-outputs", Some(user), Some(journal(&project_id, "Sensor Curah Hujan"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["message"], "Research output created successfully");
        assert_eq!(json["data"]["type"], "JOURNAL");
        assert_eq!(json["data"]["targetIndex"], DEFAULT_TARGET_INDEX);
        assert_eq!(json["data"]["status"], DEFAULT_OUTPUT_STATUS);
        assert_eq!(json["data"]["citationCountYtd"], 0);
    }

    #[tokio::test]
    async fn create_validates_fields_and_project() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let (user, _) = test_support::dosen(&state);

        let (status, json) = send(&app, Method::POST, "/api/v1/research-outputs", Some(user), Some(json!({"title": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Research project ID, type, and title are required");

        let missing = Uuid::new_v4().to_string();
        let (status, json) = send(&app, Method::POST, "/api/v1/research-outputs", Some(user), Some(journal(&missing, "x"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Research project not found");
    }

    #[tokio::test]
    async fn project_listing_is_unpaginated() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let (user, lecturer) = test_support::dosen(&state);
        let project_id = project(&state, &app, user, lecturer).await;
        let other_id = project(&state, &app, user, lecturer).await;
        for (id, title) in [(&project_id, "A"), (&project_id, "B"), (&other_id, "C")] {
            send(&app, Method::POST, "/api/v1/research-outputs", Some(user), Some(journal(id, title))).await;
        }

        let uri = format!("/api/v1/research-outputs/project/{project_id}");
        let (status, json) = send(&app, Method::GET, &uri, Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
        assert!(json.get("pagination").is_none());

        let (_, json) = send(&app, Method::GET, "/api/v1/research-outputs?search=c", Some(user), None).await;
        assert_eq!(json["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn writer_and_deleter_gates() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let (user, lecturer) = test_support::dosen(&state);
        let lpm = test_support::user(&state, &[RoleName::Lpm]);
        let lppm = test_support::user(&state, &[RoleName::Lppm]);
        let project_id = project(&state, &app, user, lecturer).await;

        let (status, _) = send(&app, Method::POST, "/api/v1/research-outputs", Some(lpm), Some(journal(&project_id, "x"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, json) = send(&app, Method::POST, "/api/v1/research-outputs", Some(lppm), Some(journal(&project_id, "x"))).await;
        let uri = format!("/api/v1/research-outputs/{}", json["data"]["id"].as_str().unwrap());

        let (status, json) = send(&app, Method::PUT, &uri, Some(user), Some(json!({"status": "PUBLISHED", "citationCountYtd": 4}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "PUBLISHED");
        assert_eq!(json["data"]["citationCountYtd"], 4);

        let (status, json) = send(&app, Method::DELETE, &format!("/api/v1/research-projects/{project_id}"), Some(lppm), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Cannot delete research project with related data");

        let (status, _) = send(&app, Method::DELETE, &uri, Some(user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(lppm), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
