//! # Reviews
//!
//! Performance reviews of a lecturer for one academic period. A review is
//! opened by an overseer, who becomes its reviewer, and is closed with a
//! decision. Completed reviews are immutable.
//!
//! - `GET    /api/v1/reviews` — list (KAPRODI, DEKAN, LPM, LPPM)
//! - `GET    /api/v1/reviews/my-reviews` — reviews the caller opened
//! - `GET    /api/v1/reviews/lecturer/:lecturerId` — one lecturer's reviews (owner, or overseers)
//! - `POST   /api/v1/reviews` — open a review
//! - `GET    /api/v1/reviews/:id` — get (overseers and DOSEN)
//! - `PUT    /api/v1/reviews/:id` — update an open review
//! - `PUT    /api/v1/reviews/:id/complete` — close with a decision
//! - `DELETE /api/v1/reviews/:id` — delete (ADMIN)

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use kinerja_core::RoleName;
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
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::{Review, ReviewStatus};
use crate::routes::{ensure_lecturer_and_period, not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "review";

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    #[serde(default)]
    pub academic_period_id: Uuid,
    #[serde(default)]
    pub lecturer_id: Uuid,
    /// Role the reviewer acts under, e.g. `KAPRODI`.
    #[serde(default)]
    pub reviewer_role: String,
    /// Review kind, e.g. `BKD` or `ANNUAL`.
    #[serde(default, rename = "type")]
    pub review_type: String,
    pub summary: Option<String>,
}

impl Validate for CreateReviewRequest {
    fn validate(&self) -> Result<(), String> {
        if self.academic_period_id.is_nil()
            || self.lecturer_id.is_nil()
            || is_blank(&self.reviewer_role)
            || is_blank(&self.review_type)
        {
            return Err(
                "Academic period ID, lecturer ID, reviewer role, and type are required"
                    .to_string(),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReviewRequest {
    pub reviewer_role: Option<String>,
    #[serde(rename = "type")]
    pub review_type: Option<String>,
    pub summary: Option<String>,
}

impl Validate for UpdateReviewRequest {
    fn validate(&self) -> Result<(), String> {
        if self.review_type.as_deref().is_some_and(is_blank) {
            return Err("Type must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteReviewRequest {
    #[serde(default)]
    pub decision: String,
    pub summary: Option<String>,
}

impl Validate for CompleteReviewRequest {
    fn validate(&self) -> Result<(), String> {
        if is_blank(&self.decision) {
            return Err("Decision is required".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reviews).post(create_review))
        .route("/my-reviews", get(list_my_reviews))
        .route("/lecturer/:lecturer_id", get(list_lecturer_reviews))
        .route(
            "/:id",
            get(get_review).put(update_review).delete(delete_review),
        )
        .route("/:id/complete", put(complete_review))
}

fn newest_first(mut items: Vec<Review>) -> Vec<Review> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

fn review_matches(filters: &Filters<'_>, r: &Review) -> bool {
    filters.id("academicPeriodId", &r.academic_period_id)
        && filters.id("lecturerId", &r.lecturer_id)
        && filters.id("reviewerUserId", &r.reviewer_user_id)
        && filters.eq("reviewerRole", r.reviewer_role.as_str())
        && filters.eq("type", &r.review_type)
        && filters.eq(
            "status",
            match r.status {
                ReviewStatus::Open => "OPEN",
                ReviewStatus::Completed => "COMPLETED",
            },
        )
        && filters.eq("decision", r.decision.as_deref().unwrap_or_default())
}

fn completed() -> AppError {
    AppError::BadRequest("Cannot update completed review".into())
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/reviews — List reviews, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/reviews",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
        ("lecturerId" = Option<Uuid>, Query, description = "Lecturer"),
        ("reviewerUserId" = Option<Uuid>, Query, description = "Reviewer"),
        ("reviewerRole" = Option<String>, Query, description = "Reviewer role label"),
        ("type" = Option<String>, Query, description = "Review type"),
        ("status" = Option<String>, Query, description = "OPEN or COMPLETED"),
        ("decision" = Option<String>, Query, description = "Decision"),
    ),
    responses((status = 200, description = "Reviews retrieved")),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub(crate) async fn list_reviews(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Review>, AppError> {
    authorize(&caller, OVERSIGHT)?;
    let filters = Filters(&query);
    let items = state.reviews.filter(|r| review_matches(&filters, r));
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Reviews retrieved successfully"))
}

/// GET /api/v1/reviews/my-reviews — Reviews opened by the caller.
#[utoipa::path(
    get,
    path = "/api/v1/reviews/my-reviews",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("status" = Option<String>, Query, description = "OPEN or COMPLETED"),
    ),
    responses((status = 200, description = "Reviews retrieved")),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub(crate) async fn list_my_reviews(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Review>, AppError> {
    let actor = authorize(&caller, OVERSIGHT)?;
    let reviewer = *actor.id.as_uuid();
    let filters = Filters(&query);
    let items = state
        .reviews
        .filter(|r| r.reviewer_user_id == reviewer && review_matches(&filters, r));
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Reviews retrieved successfully"))
}

/// GET /api/v1/reviews/lecturer/:lecturerId — One lecturer's reviews.
#[utoipa::path(
    get,
    path = "/api/v1/reviews/lecturer/{lecturerId}",
    params(
        ("lecturerId" = Uuid, Path, description = "Lecturer ID"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
    ),
    responses(
        (status = 200, description = "Reviews retrieved"),
        (status = 403, description = "Neither owner nor overseer", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub(crate) async fn list_lecturer_reviews(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Review>, AppError> {
    let lecturer_id = authorize_lecturer_path(&caller, OVERSIGHT, path)?;
    if !state.lecturers.contains(&lecturer_id) {
        return Err(not_found("Lecturer"));
    }
    let filters = Filters(&query);
    let items = state
        .reviews
        .filter(|r| r.lecturer_id == lecturer_id && review_matches(&filters, r));
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Reviews retrieved successfully"))
}

/// GET /api/v1/reviews/:id — Get one review.
#[utoipa::path(
    get,
    path = "/api/v1/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review retrieved", body = Review),
        (status = 404, description = "Review not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub(crate) async fn get_review(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<Review>, AppError> {
    authorize(&caller, OVERSIGHT_AND_DOSEN)?;
    let id = extract_path(path)?;
    let review = state.reviews.get(&id).ok_or_else(|| not_found("Review"))?;
    Ok(success(review).message("Review retrieved successfully"))
}

/// POST /api/v1/reviews — Open a review. The caller becomes the reviewer.
#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Missing fields or unknown role", body = crate::envelope::ErrorBody),
        (status = 404, description = "Lecturer or academic period not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub(crate) async fn create_review(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<Success<Review>, AppError> {
    let actor = authorize(&caller, OVERSIGHT)?;
    let req = extract_validated_json(body)?;
    let reviewer_role: RoleName = req.reviewer_role.parse()?;
    ensure_lecturer_and_period(&state, &req.lecturer_id, &req.academic_period_id)?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let review = Review {
        id,
        academic_period_id: req.academic_period_id,
        lecturer_id: req.lecturer_id,
        reviewer_user_id: *actor.id.as_uuid(),
        reviewer_role,
        review_type: req.review_type,
        status: ReviewStatus::Open,
        summary: req.summary,
        decision: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };
    state.reviews.insert(id, review.clone());
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&review));

    Ok(success(review)
        .message("Review created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/reviews/:id — Update an open review.
#[utoipa::path(
    put,
    path = "/api/v1/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 400, description = "Review already completed", body = crate::envelope::ErrorBody),
        (status = 404, description = "Review not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub(crate) async fn update_review(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateReviewRequest>, JsonRejection>,
) -> Result<Success<Review>, AppError> {
    let actor = authorize(&caller, OVERSIGHT)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let reviewer_role = req
        .reviewer_role
        .as_deref()
        .map(str::parse::<RoleName>)
        .transpose()?;

    let (before, updated) = state
        .reviews
        .try_update(&id, |r| {
            if r.status == ReviewStatus::Completed {
                return Err(completed());
            }
            let before = r.clone();
            if let Some(role) = reviewer_role {
                r.reviewer_role = role;
            }
            if let Some(review_type) = req.review_type {
                r.review_type = review_type;
            }
            if req.summary.is_some() {
                r.summary = req.summary;
            }
            r.updated_at = Utc::now();
            Ok((before, r.clone()))
        })
        .ok_or_else(|| not_found("Review"))??;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Review updated successfully"))
}

/// PUT /api/v1/reviews/:id/complete — Close a review with a decision.
#[utoipa::path(
    put,
    path = "/api/v1/reviews/{id}/complete",
    params(("id" = Uuid, Path, description = "Review ID")),
    request_body = CompleteReviewRequest,
    responses(
        (status = 200, description = "Review completed", body = Review),
        (status = 400, description = "Decision missing or review already completed", body = crate::envelope::ErrorBody),
        (status = 404, description = "Review not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub(crate) async fn complete_review(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<CompleteReviewRequest>, JsonRejection>,
) -> Result<Success<Review>, AppError> {
    let actor = authorize(&caller, OVERSIGHT)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;

    let (before, updated) = state
        .reviews
        .try_update(&id, |r| {
            if r.status == ReviewStatus::Completed {
                return Err(AppError::BadRequest("Review already completed".into()));
            }
            let before = r.clone();
            let now = Utc::now();
            r.status = ReviewStatus::Completed;
            r.decision = Some(req.decision);
            if req.summary.is_some() {
                r.summary = req.summary;
            }
            r.completed_at = Some(now);
            r.updated_at = now;
            Ok((before, r.clone()))
        })
        .ok_or_else(|| not_found("Review"))??;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Review completed successfully"))
}

/// DELETE /api/v1/reviews/:id — Delete a review (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 404, description = "Review not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "reviews"
)]
pub(crate) async fn delete_review(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    let removed = state.reviews.remove(&id).ok_or_else(|| not_found("Review"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Review deleted successfully"))
}
