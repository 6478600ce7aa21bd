//! # Course Offerings
//!
//! Classes of a course in one academic period, each with a lecturer and an
//! optional co-lecturer.
//!
//! - `GET    /api/v1/course-offerings` — list, filters `courseId`, `academicPeriodId`, `lecturerId`
//! - `GET    /api/v1/course-offerings/lecturer/:lecturerId` — classes a lecturer teaches (owner, or KAPRODI/DEKAN/LPM)
//! - `POST   /api/v1/course-offerings` — create (KAPRODI)
//! - `GET    /api/v1/course-offerings/:id` — get
//! - `PUT    /api/v1/course-offerings/:id` — update (KAPRODI)
//! - `DELETE /api/v1/course-offerings/:id` — delete (ADMIN)
//!
//! `(courseId, academicPeriodId, className, lecturerId)` is unique.

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
use crate::authorize::{authenticated, authorize, authorize_lecturer_path, ADMIN_ONLY};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::CourseOffering;
use crate::routes::{ensure_lecturer_and_period, not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "course_offering";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi]);
/// Overseers of teaching loads. LPPM oversees research and service only.
const TEACHING_OVERSIGHT: RoleSet =
    RoleSet::of(&[RoleName::Kaprodi, RoleName::Dekan, RoleName::Lpm]);
const OFFERING_EXISTS: &str = "Course offering already exists";

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseOfferingRequest {
    #[serde(default)]
    pub course_id: Uuid,
    #[serde(default)]
    pub academic_period_id: Uuid,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub lecturer_id: Uuid,
    pub co_lecturer_id: Option<Uuid>,
    pub student_count: Option<u32>,
}

impl Validate for CreateCourseOfferingRequest {
    fn validate(&self) -> Result<(), String> {
        if self.course_id.is_nil()
            || self.academic_period_id.is_nil()
            || is_blank(&self.class_name)
            || self.lecturer_id.is_nil()
        {
            return Err(
                "Course ID, academic period ID, class name, and lecturer ID are required"
                    .to_string(),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseOfferingRequest {
    pub class_name: Option<String>,
    pub co_lecturer_id: Option<Uuid>,
    pub student_count: Option<u32>,
}

impl Validate for UpdateCourseOfferingRequest {
    fn validate(&self) -> Result<(), String> {
        if self.class_name.as_deref().is_some_and(is_blank) {
            return Err("Class name must not be empty".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_offerings).post(create_offering))
        .route("/lecturer/:lecturer_id", get(list_lecturer_offerings))
        .route(
            "/:id",
            get(get_offering).put(update_offering).delete(delete_offering),
        )
}

fn newest_first(mut items: Vec<CourseOffering>) -> Vec<CourseOffering> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

fn same_class(a: &CourseOffering, b: &CourseOffering) -> bool {
    a.course_id == b.course_id
        && a.academic_period_id == b.academic_period_id
        && a.class_name == b.class_name
        && a.lecturer_id == b.lecturer_id
}

fn ensure_co_lecturer(state: &AppState, co_lecturer_id: Option<&Uuid>) -> Result<(), AppError> {
    match co_lecturer_id {
        Some(id) if !state.lecturers.contains(id) => Err(not_found("Co-lecturer")),
        _ => Ok(()),
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/course-offerings — List offerings, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/course-offerings",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("courseId" = Option<Uuid>, Query, description = "Course"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
        ("lecturerId" = Option<Uuid>, Query, description = "Main lecturer"),
    ),
    responses((status = 200, description = "Course offerings retrieved")),
    security(("bearer_auth" = [])),
    tag = "course-offerings"
)]
pub(crate) async fn list_offerings(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<CourseOffering>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let items = state.course_offerings.filter(|o| {
        filters.id("courseId", &o.course_id)
            && filters.id("academicPeriodId", &o.academic_period_id)
            && filters.id("lecturerId", &o.lecturer_id)
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Course offerings retrieved successfully"))
}

/// GET /api/v1/course-offerings/lecturer/:lecturerId — Classes a lecturer
/// teaches, as main or co-lecturer.
#[utoipa::path(
    get,
    path = "/api/v1/course-offerings/lecturer/{lecturerId}",
    params(
        ("lecturerId" = Uuid, Path, description = "Lecturer ID"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
    ),
    responses(
        (status = 200, description = "Lecturer offerings retrieved"),
        (status = 403, description = "Neither owner nor overseer", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "course-offerings"
)]
pub(crate) async fn list_lecturer_offerings(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<CourseOffering>, AppError> {
    let lecturer_id = authorize_lecturer_path(&caller, TEACHING_OVERSIGHT, path)?;
    if !state.lecturers.contains(&lecturer_id) {
        return Err(not_found("Lecturer"));
    }
    let filters = Filters(&query);
    let items = state.course_offerings.filter(|o| {
        o.taught_by(&lecturer_id) && filters.id("academicPeriodId", &o.academic_period_id)
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Lecturer offerings retrieved successfully"))
}

/// GET /api/v1/course-offerings/:id — Get one offering.
#[utoipa::path(
    get,
    path = "/api/v1/course-offerings/{id}",
    params(("id" = Uuid, Path, description = "Course offering ID")),
    responses(
        (status = 200, description = "Course offering retrieved", body = CourseOffering),
        (status = 404, description = "Course offering not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "course-offerings"
)]
pub(crate) async fn get_offering(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<CourseOffering>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let offering = state
        .course_offerings
        .get(&id)
        .ok_or_else(|| not_found("Course offering"))?;
    Ok(success(offering).message("Course offering retrieved successfully"))
}

/// POST /api/v1/course-offerings — Open a class (ADMIN, KAPRODI).
#[utoipa::path(
    post,
    path = "/api/v1/course-offerings",
    request_body = CreateCourseOfferingRequest,
    responses(
        (status = 201, description = "Course offering created", body = CourseOffering),
        (status = 400, description = "Missing required fields", body = crate::envelope::ErrorBody),
        (status = 404, description = "Course, period, lecturer or co-lecturer not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Course offering already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "course-offerings"
)]
pub(crate) async fn create_offering(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateCourseOfferingRequest>, JsonRejection>,
) -> Result<Success<CourseOffering>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let req = extract_validated_json(body)?;
    if !state.courses.contains(&req.course_id) {
        return Err(not_found("Course"));
    }
    ensure_lecturer_and_period(&state, &req.lecturer_id, &req.academic_period_id)?;
    ensure_co_lecturer(&state, req.co_lecturer_id.as_ref())?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let offering = CourseOffering {
        id,
        course_id: req.course_id,
        academic_period_id: req.academic_period_id,
        class_name: req.class_name,
        lecturer_id: req.lecturer_id,
        co_lecturer_id: req.co_lecturer_id,
        student_count: req.student_count,
        created_at: now,
        updated_at: now,
    };
    if !state
        .course_offerings
        .insert_unique(id, offering.clone(), |o| same_class(o, &offering))
    {
        return Err(AppError::Conflict(OFFERING_EXISTS.into()));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&offering));

    Ok(success(offering)
        .message("Course offering created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/course-offerings/:id — Rename the class or change its
/// co-lecturer and size (ADMIN, KAPRODI).
#[utoipa::path(
    put,
    path = "/api/v1/course-offerings/{id}",
    params(("id" = Uuid, Path, description = "Course offering ID")),
    request_body = UpdateCourseOfferingRequest,
    responses(
        (status = 200, description = "Course offering updated", body = CourseOffering),
        (status = 404, description = "Course offering or co-lecturer not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Course offering already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "course-offerings"
)]
pub(crate) async fn update_offering(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateCourseOfferingRequest>, JsonRejection>,
) -> Result<Success<CourseOffering>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state
        .course_offerings
        .get(&id)
        .ok_or_else(|| not_found("Course offering"))?;
    ensure_co_lecturer(&state, req.co_lecturer_id.as_ref())?;

    let updated = state
        .course_offerings
        .update_unique(
            &id,
            |o| {
                if let Some(class_name) = req.class_name {
                    o.class_name = class_name;
                }
                if req.co_lecturer_id.is_some() {
                    o.co_lecturer_id = req.co_lecturer_id;
                }
                if req.student_count.is_some() {
                    o.student_count = req.student_count;
                }
                o.updated_at = Utc::now();
            },
            same_class,
        )
        .ok_or_else(|| not_found("Course offering"))?
        .map_err(|()| AppError::Conflict(OFFERING_EXISTS.into()))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Course offering updated successfully"))
}

/// DELETE /api/v1/course-offerings/:id — Delete an offering (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/course-offerings/{id}",
    params(("id" = Uuid, Path, description = "Course offering ID")),
    responses(
        (status = 200, description = "Course offering deleted"),
        (status = 400, description = "Offering has a teaching activity", body = crate::envelope::ErrorBody),
        (status = 404, description = "Course offering not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "course-offerings"
)]
pub(crate) async fn delete_offering(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    if !state.course_offerings.contains(&id) {
        return Err(not_found("Course offering"));
    }
    if state.teaching_activities.any(|t| t.course_offering_id == id) {
        return Err(AppError::BadRequest(
            "Cannot delete course offering with related data".into(),
        ));
    }
    let removed = state
        .course_offerings
        .remove(&id)
        .ok_or_else(|| not_found("Course offering"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Course offering deleted successfully"))
}
