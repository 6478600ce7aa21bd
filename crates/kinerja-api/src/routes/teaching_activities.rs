//! # Teaching Activities
//!
//! Teaching quality indicators, one record per course offering: the status
//! of the semester plan (RPS) and scores for LMS upkeep, on-time
//! assessment, syllabus progress, student feedback and attendance.
//!
//! - `GET    /api/v1/teaching-activities` — list, filters `lecturerId`, `academicPeriodId`, `rpsStatus`
//! - `GET    /api/v1/teaching-activities/offering/:courseOfferingId` — the offering's record
//! - `POST   /api/v1/teaching-activities/offering/:courseOfferingId` — create or update (KAPRODI, DOSEN)
//! - `GET    /api/v1/teaching-activities/:id` — get
//! - `PUT    /api/v1/teaching-activities/:id` — update (KAPRODI, DOSEN)
//! - `DELETE /api/v1/teaching-activities/:id` — delete (ADMIN)
//!
//! Every write stamps the caller as `updatedByUserId`.

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
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
use crate::models::{CourseOffering, TeachingActivity, DEFAULT_RPS_STATUS};
use crate::routes::{not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "teaching_activity";
const WRITERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi, RoleName::Dosen]);

// ── Request/Response DTOs ───────────────────────────────────────────

/// Body of both the upsert and the update. Omitted fields keep their value.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeachingActivityRequest {
    /// Defaults to `DRAFT` on creation.
    pub rps_status: Option<String>,
    pub lms_health_score: Option<f64>,
    pub assessment_ontime_score: Option<f64>,
    pub progress_score: Option<f64>,
    pub student_feedback_score: Option<f64>,
    pub attendance_rate: Option<f64>,
}

impl TeachingActivityRequest {
    fn scores(&self) -> [Option<f64>; 5] {
        [
            self.lms_health_score,
            self.assessment_ontime_score,
            self.progress_score,
            self.student_feedback_score,
            self.attendance_rate,
        ]
    }

    fn apply(self, activity: &mut TeachingActivity) {
        if let Some(rps_status) = self.rps_status {
            activity.rps_status = rps_status;
        }
        let slots = [
            (&mut activity.lms_health_score, self.lms_health_score),
            (&mut activity.assessment_ontime_score, self.assessment_ontime_score),
            (&mut activity.progress_score, self.progress_score),
            (&mut activity.student_feedback_score, self.student_feedback_score),
            (&mut activity.attendance_rate, self.attendance_rate),
        ];
        for (slot, value) in slots {
            if value.is_some() {
                *slot = value;
            }
        }
    }
}

impl Validate for TeachingActivityRequest {
    fn validate(&self) -> Result<(), String> {
        if self.rps_status.as_deref().is_some_and(is_blank) {
            return Err("RPS status must not be empty".to_string());
        }
        if self.scores().into_iter().flatten().any(|s| !s.is_finite()) {
            return Err("Scores must be finite numbers".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_activities))
        .route(
            "/offering/:course_offering_id",
            get(get_offering_activity).post(save_offering_activity),
        )
        .route(
            "/:id",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/teaching-activities — List records, newest first.
///
/// Lecturer and period filters apply to the record's course offering.
#[utoipa::path(
    get,
    path = "/api/v1/teaching-activities",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("lecturerId" = Option<Uuid>, Query, description = "Main lecturer of the offering"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period of the offering"),
        ("rpsStatus" = Option<String>, Query, description = "Exact RPS status"),
    ),
    responses((status = 200, description = "Teaching activities retrieved")),
    security(("bearer_auth" = [])),
    tag = "teaching-activities"
)]
pub(crate) async fn list_activities(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<TeachingActivity>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let offerings: HashMap<Uuid, CourseOffering> = state
        .course_offerings
        .list()
        .into_iter()
        .map(|o| (o.id, o))
        .collect();
    let mut items = state.teaching_activities.filter(|t| {
        let offering_matches = match offerings.get(&t.course_offering_id) {
            Some(o) => {
                filters.id("lecturerId", &o.lecturer_id)
                    && filters.id("academicPeriodId", &o.academic_period_id)
            }
            None => filters.get("lecturerId").is_none() && filters.get("academicPeriodId").is_none(),
        };
        offering_matches && filters.eq("rpsStatus", &t.rps_status)
    });
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let page = state.page_request(&query).slice(items);
    Ok(Paginated::from(page).message("Teaching activities retrieved successfully"))
}

/// GET /api/v1/teaching-activities/:id — Get one record.
#[utoipa::path(
    get,
    path = "/api/v1/teaching-activities/{id}",
    params(("id" = Uuid, Path, description = "Teaching activity ID")),
    responses(
        (status = 200, description = "Teaching activity retrieved", body = TeachingActivity),
        (status = 404, description = "Teaching activity not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "teaching-activities"
)]
pub(crate) async fn get_activity(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<TeachingActivity>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let activity = state
        .teaching_activities
        .get(&id)
        .ok_or_else(|| not_found("Teaching activity"))?;
    Ok(success(activity).message("Teaching activity retrieved successfully"))
}

/// GET /api/v1/teaching-activities/offering/:courseOfferingId — The record of one offering.
#[utoipa::path(
    get,
    path = "/api/v1/teaching-activities/offering/{courseOfferingId}",
    params(("courseOfferingId" = Uuid, Path, description = "Course offering ID")),
    responses(
        (status = 200, description = "Teaching activity retrieved", body = TeachingActivity),
        (status = 404, description = "Teaching activity not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "teaching-activities"
)]
pub(crate) async fn get_offering_activity(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<TeachingActivity>, AppError> {
    authenticated(&caller)?;
    let offering_id = extract_path(path)?;
    let activity = state
        .teaching_activities
        .find(|t| t.course_offering_id == offering_id)
        .ok_or_else(|| not_found("Teaching activity"))?;
    Ok(success(activity).message("Teaching activity retrieved successfully"))
}

/// POST /api/v1/teaching-activities/offering/:courseOfferingId — Create the
/// offering's record, or update it when one exists (ADMIN, KAPRODI, DOSEN).
#[utoipa::path(
    post,
    path = "/api/v1/teaching-activities/offering/{courseOfferingId}",
    params(("courseOfferingId" = Uuid, Path, description = "Course offering ID")),
    request_body = TeachingActivityRequest,
    responses(
        (status = 200, description = "Teaching activity saved", body = TeachingActivity),
        (status = 404, description = "Course offering not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "teaching-activities"
)]
pub(crate) async fn save_offering_activity(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<TeachingActivityRequest>, JsonRejection>,
) -> Result<Success<TeachingActivity>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let offering_id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    if !state.course_offerings.contains(&offering_id) {
        return Err(not_found("Course offering"));
    }
    let user_id = *actor.id.as_uuid();

    if let Some(before) = state
        .teaching_activities
        .find(|t| t.course_offering_id == offering_id)
    {
        let updated = state
            .teaching_activities
            .update(&before.id, |t| {
                req.apply(t);
                t.updated_by_user_id = user_id;
                t.updated_at = Utc::now();
            })
            .ok_or_else(|| not_found("Teaching activity"))?;
        state.record(actor, AuditAction::Update, ENTITY, updated.id, Some(&before), Some(&updated));
        return Ok(success(updated).message("Teaching activity saved successfully"));
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let mut activity = TeachingActivity {
        id,
        course_offering_id: offering_id,
        rps_status: DEFAULT_RPS_STATUS.to_string(),
        lms_health_score: None,
        assessment_ontime_score: None,
        progress_score: None,
        student_feedback_score: None,
        attendance_rate: None,
        updated_by_user_id: user_id,
        created_at: now,
        updated_at: now,
    };
    req.apply(&mut activity);
    if !state.teaching_activities.insert_unique(id, activity.clone(), |t| {
        t.course_offering_id == offering_id
    }) {
        return Err(AppError::Conflict(
            "Teaching activity already exists for this course offering".into(),
        ));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&activity));

    Ok(success(activity).message("Teaching activity saved successfully"))
}

/// PUT /api/v1/teaching-activities/:id — Update a record (ADMIN, KAPRODI, DOSEN).
#[utoipa::path(
    put,
    path = "/api/v1/teaching-activities/{id}",
    params(("id" = Uuid, Path, description = "Teaching activity ID")),
    request_body = TeachingActivityRequest,
    responses(
        (status = 200, description = "Teaching activity updated", body = TeachingActivity),
        (status = 404, description = "Teaching activity not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "teaching-activities"
)]
pub(crate) async fn update_activity(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<TeachingActivityRequest>, JsonRejection>,
) -> Result<Success<TeachingActivity>, AppError> {
    let actor = authorize(&caller, WRITERS)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let before = state
        .teaching_activities
        .get(&id)
        .ok_or_else(|| not_found("Teaching activity"))?;
    let user_id = *actor.id.as_uuid();

    let updated = state
        .teaching_activities
        .update(&id, |t| {
            req.apply(t);
            t.updated_by_user_id = user_id;
            t.updated_at = Utc::now();
        })
        .ok_or_else(|| not_found("Teaching activity"))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Teaching activity updated successfully"))
}

/// DELETE /api/v1/teaching-activities/:id — Delete a record (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/teaching-activities/{id}",
    params(("id" = Uuid, Path, description = "Teaching activity ID")),
    responses(
        (status = 200, description = "Teaching activity deleted"),
        (status = 404, description = "Teaching activity not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "teaching-activities"
)]
pub(crate) async fn delete_activity(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    let removed = state
        .teaching_activities
        .remove(&id)
        .ok_or_else(|| not_found("Teaching activity"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Teaching activity deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Term;
    use crate::routes::test_support::{self, send};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn upsert_creates_then_updates_one_record() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let (dosen, lecturer) = test_support::dosen(&state);
        let kaprodi = test_support::user(&state, &[RoleName::Kaprodi]);
        let course = test_support::course(&state, "TI101");
        let period = test_support::period(&state, 2024, Term::Ganjil);
        let offering = test_support::offering(&state, course, period, lecturer);
        let uri = format!("/api/v1/teaching-activities/offering/{offering}");

        let (status, json) = send(&app, Method::POST, &uri, Some(dosen), Some(json!({"lmsHealthScore": 80.5}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Teaching activity saved successfully");
        assert_eq!(json["data"]["rpsStatus"], DEFAULT_RPS_STATUS);
        assert_eq!(json["data"]["updatedByUserId"], dosen.to_string());

        let body = json!({"rpsStatus": "APPROVED", "attendanceRate": 92.0});
        let (status, json) = send(&app, Method::POST, &uri, Some(kaprodi), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["rpsStatus"], "APPROVED");
        assert_eq!(json["data"]["lmsHealthScore"], 80.5);
        assert_eq!(json["data"]["updatedByUserId"], kaprodi.to_string());
        assert_eq!(state.teaching_activities.len(), 1);

        let (status, json) = send(&app, Method::GET, &uri, Some(dosen), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["attendanceRate"], 92.0);
    }

    #[tokio::test]
    async fn upsert_gate_and_missing_offering() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let lpm = test_support::user(&state, &[RoleName::Lpm]);
        let (dosen, _) = test_support::dosen(&state);
        let uri = format!("/api/v1/teaching-activities/offering/{}", Uuid::new_v4());

        let (status, _) = send(&app, Method::POST, &uri, Some(lpm), Some(json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, json) = send(&app, Method::POST, &uri, Some(dosen), Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Course offering not found");
        let (status, json) = send(&app, Method::GET, &uri, Some(lpm), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Teaching activity not found");
    }

    #[tokio::test]
    async fn list_filters_through_offering() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let (dosen, lecturer) = test_support::dosen(&state);
        let (_, other) = test_support::dosen(&state);
        let course = test_support::course(&state, "TI101");
        let period = test_support::period(&state, 2024, Term::Ganjil);
        for lecturer_id in [lecturer, other] {
            let offering = test_support::offering(&state, course, period, lecturer_id);
            let uri = format!("/api/v1/teaching-activities/offering/{offering}");
            send(&app, Method::POST, &uri, Some(dosen), Some(json!({}))).await;
        }

        let uri = format!("/api/v1/teaching-activities?lecturerId={lecturer}");
        let (_, json) = send(&app, Method::GET, &uri, Some(dosen), None).await;
        assert_eq!(json["pagination"]["total"], 1);
        let uri = format!("/api/v1/teaching-activities?academicPeriodId={period}&rpsStatus=DRAFT");
        let (_, json) = send(&app, Method::GET, &uri, Some(dosen), None).await;
        assert_eq!(json["pagination"]["total"], 2);
    }

    #[tokio::test]
    async fn put_and_delete_gates() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let (dosen, lecturer) = test_support::dosen(&state);
        let kaprodi = test_support::user(&state, &[RoleName::Kaprodi]);
        let dekan = test_support::user(&state, &[RoleName::Dekan]);
        let admin = test_support::user(&state, &[RoleName::Admin]);
        let offering = test_support::offering(
            &state,
            test_support::course(&state, "TI101"),
            test_support::period(&state, 2024, Term::Ganjil),
            lecturer,
        );
        let (_, json) = send(&app, Method::POST, &format!("/api/v1/teaching-activities/offering/{offering}"), Some(dosen), Some(json!({}))).await;
        let uri = format!("/api/v1/teaching-activities/{}", json["data"]["id"].as_str().unwrap());

        let (status, _) = send(&app, Method::PUT, &uri, Some(dekan), Some(json!({"progressScore": 70.0}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, json) = send(&app, Method::PUT, &uri, Some(kaprodi), Some(json!({"progressScore": 70.0}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["progressScore"], 70.0);

        let (status, json) = send(&app, Method::DELETE, &format!("/api/v1/course-offerings/{offering}"), Some(admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Cannot delete course offering with related data");

        let (status, _) = send(&app, Method::DELETE, &uri, Some(kaprodi), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.teaching_activities.is_empty());
    }
}
