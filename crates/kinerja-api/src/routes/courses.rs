//! # Courses
//!
//! The curriculum of each study program.
//!
//! - `GET    /api/v1/courses` — list, filters `studyProgramId`, `search`
//! - `POST   /api/v1/courses` — create (KAPRODI)
//! - `GET    /api/v1/courses/:id` — get
//! - `PUT    /api/v1/courses/:id` — update (KAPRODI)
//! - `DELETE /api/v1/courses/:id` — delete (ADMIN)
//!
//! Codes are unique within a study program. A course with offerings cannot
//! be deleted.

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
use crate::authorize::{authenticated, authorize, ADMIN_ONLY};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::Course;
use crate::routes::{not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "course";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi]);
const CODE_TAKEN: &str = "Course code already exists in this study program";

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[serde(default)]
    pub study_program_id: Uuid,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub credits: Option<u32>,
}

impl Validate for CreateCourseRequest {
    fn validate(&self) -> Result<(), String> {
        if self.study_program_id.is_nil()
            || is_blank(&self.code)
            || is_blank(&self.name)
            || self.credits.is_none()
        {
            return Err("Study program ID, code, name, and credits are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub credits: Option<u32>,
}

impl Validate for UpdateCourseRequest {
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
        .route("/", get(list_courses).post(create_course))
        .route(
            "/:id",
            get(get_course).put(update_course).delete(delete_course),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/courses — List courses by name.
#[utoipa::path(
    get,
    path = "/api/v1/courses",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("studyProgramId" = Option<Uuid>, Query, description = "Study program"),
        ("search" = Option<String>, Query, description = "Name or code substring"),
    ),
    responses((status = 200, description = "Courses retrieved")),
    security(("bearer_auth" = [])),
    tag = "courses"
)]
pub(crate) async fn list_courses(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Course>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let mut items = state.courses.filter(|c| {
        filters.id("studyProgramId", &c.study_program_id)
            && filters.search([Some(c.name.as_str()), Some(c.code.as_str())])
    });
    items.sort_by(|a, b| a.name.cmp(&b.name));
    let page = state.page_request(&query).slice(items);
    Ok(Paginated::from(page).message("Courses retrieved successfully"))
}

/// GET /api/v1/courses/:id — Get one course.
#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course retrieved", body = Course),
        (status = 404, description = "Course not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "courses"
)]
pub(crate) async fn get_course(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<Course>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let course = state.courses.get(&id).ok_or_else(|| not_found("Course"))?;
    Ok(success(course).message("Course retrieved successfully"))
}

/// POST /api/v1/courses — Create a course (ADMIN, KAPRODI).
#[utoipa::path(
    post,
    path = "/api/v1/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 400, description = "Missing required fields", body = crate::envelope::ErrorBody),
        (status = 404, description = "Study program not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Code already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "courses"
)]
pub(crate) async fn create_course(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateCourseRequest>, JsonRejection>,
) -> Result<Success<Course>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let req = extract_validated_json(body)?;
    if !state.study_programs.contains(&req.study_program_id) {
        return Err(not_found("Study program"));
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let course = Course {
        id,
        study_program_id: req.study_program_id,
        code: req.code,
        name: req.name,
        credits: req.credits.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };
    if !state.courses.insert_unique(id, course.clone(), |c| {
        c.study_program_id == course.study_program_id && c.code == course.code
    }) {
        return Err(AppError::Conflict(CODE_TAKEN.into()));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&course));

    Ok(success(course)
        .message("Course created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/courses/:id — Update a course (ADMIN, KAPRODI).
#[utoipa::path(
    put,
    path = "/api/v1/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Course updated", body = Course),
        (status = 404, description = "Course not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Code already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "courses"
)]
pub(crate) async fn update_course(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateCourseRequest>, JsonRejection>,
) -> Result<Success<Course>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state.courses.get(&id).ok_or_else(|| not_found("Course"))?;

    let updated = state
        .courses
        .update_unique(
            &id,
            |c| {
                if let Some(code) = req.code {
                    c.code = code;
                }
                if let Some(name) = req.name {
                    c.name = name;
                }
                if let Some(credits) = req.credits {
                    c.credits = credits;
                }
                c.updated_at = Utc::now();
            },
            |other, updated| {
                other.study_program_id == updated.study_program_id && other.code == updated.code
            },
        )
        .ok_or_else(|| not_found("Course"))?
        .map_err(|()| AppError::Conflict(CODE_TAKEN.into()))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Course updated successfully"))
}

/// DELETE /api/v1/courses/:id — Delete a course (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course deleted"),
        (status = 400, description = "Course still has offerings", body = crate::envelope::ErrorBody),
        (status = 404, description = "Course not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "courses"
)]
pub(crate) async fn delete_course(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    if !state.courses.contains(&id) {
        return Err(not_found("Course"));
    }
    if state.course_offerings.any(|o| o.course_id == id) {
        return Err(AppError::BadRequest(
            "Cannot delete course with related data".into(),
        ));
    }
    let removed = state.courses.remove(&id).ok_or_else(|| not_found("Course"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Course deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{self, send};
    use axum::http::Method;
    use serde_json::json;

    fn prodi(state: &AppState) -> Uuid {
        let institution = test_support::institution(state, "UNJ");
        let faculty = test_support::faculty(state, institution, "FT");
        test_support::study_program(state, faculty, "TI")
    }

    #[tokio::test]
    async fn kaprodi_creates_and_any_caller_reads() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let kaprodi = test_support::user(&state, &[RoleName::Kaprodi]);
        let (dosen, _) = test_support::dosen(&state);
        let program = prodi(&state);

        let body = json!({"studyProgramId": program, "code": "TI101", "name": "Algoritma", "credits": 3});
        let (status, _) = send(&app, Method::POST, "/api/v1/courses", Some(dosen), Some(body.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, json) = send(&app, Method::POST, "/api/v1/courses", Some(kaprodi), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["message"], "Course created successfully");
        assert_eq!(json["data"]["credits"], 3);

        let (status, json) = send(&app, Method::GET, "/api/v1/courses?search=algo", Some(dosen), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["pagination"]["total"], 1);
        let (status, _) = send(&app, Method::GET, "/api/v1/courses", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_validates_fields_and_program() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let kaprodi = test_support::user(&state, &[RoleName::Kaprodi]);

        let (status, json) = send(&app, Method::POST, "/api/v1/courses", Some(kaprodi), Some(json!({"code": "X", "name": "Y"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Study program ID, code, name, and credits are required");

        let body = json!({"studyProgramId": Uuid::new_v4(), "code": "X", "name": "Y", "credits": 2});
        let (status, json) = send(&app, Method::POST, "/api/v1/courses", Some(kaprodi), Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Study program not found");
    }

    #[tokio::test]
    async fn code_is_unique_per_study_program() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let kaprodi = test_support::user(&state, &[RoleName::Kaprodi]);
        let program = prodi(&state);
        let faculty = state.study_programs.get(&program).unwrap().faculty_id;
        let other_program = test_support::study_program(&state, faculty, "SI");

        let body = json!({"studyProgramId": program, "code": "TI101", "name": "Algoritma", "credits": 3});
        send(&app, Method::POST, "/api/v1/courses", Some(kaprodi), Some(body.clone())).await;
        let (status, json) = send(&app, Method::POST, "/api/v1/courses", Some(kaprodi), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], CODE_TAKEN);

        let body = json!({"studyProgramId": other_program, "code": "TI101", "name": "Algoritma", "credits": 3});
        let (status, _) = send(&app, Method::POST, "/api/v1/courses", Some(kaprodi), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn only_admin_deletes() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let kaprodi = test_support::user(&state, &[RoleName::Kaprodi]);
        let admin = test_support::user(&state, &[RoleName::Admin]);
        let program = prodi(&state);
        let body = json!({"studyProgramId": program, "code": "TI101", "name": "Algoritma", "credits": 3});
        let (_, json) = send(&app, Method::POST, "/api/v1/courses", Some(kaprodi), Some(body)).await;
        let uri = format!("/api/v1/courses/{}", json["data"]["id"].as_str().unwrap());

        let (status, _) = send(&app, Method::DELETE, &uri, Some(kaprodi), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, json) = send(&app, Method::DELETE, &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Course deleted successfully");
        assert!(state.courses.is_empty());
    }
}
