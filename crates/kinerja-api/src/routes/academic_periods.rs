//! # Academic Periods
//!
//! One period per (`yearStart`, term). The odd term (GANJIL) starts in
//! August; February to July is the even term (GENAP) of the year that
//! started the previous August.
//!
//! - `GET    /api/v1/academic-periods` — list, filters `yearStart`, `term`
//! - `GET    /api/v1/academic-periods/current` — the period in effect today
//! - `POST   /api/v1/academic-periods` — create (ADMIN)
//! - `GET    /api/v1/academic-periods/:id` — get
//! - `PUT    /api/v1/academic-periods/:id` — update (ADMIN)
//! - `DELETE /api/v1/academic-periods/:id` — delete (ADMIN)

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::auth::Caller;
use crate::authorize::{authenticated, authorize, ADMIN_ONLY};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::{AcademicPeriod, Term};
use crate::routes::{not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "academic_period";
const PERIOD_EXISTS: &str = "Academic period already exists";

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAcademicPeriodRequest {
    /// First calendar year of the academic year, e.g. 2024 for 2024/2025.
    pub year_start: Option<i32>,
    /// `GANJIL` or `GENAP`.
    #[serde(default)]
    pub term: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bkd_deadline: Option<NaiveDate>,
    pub research_deadline: Option<NaiveDate>,
    pub service_deadline: Option<NaiveDate>,
}

impl Validate for CreateAcademicPeriodRequest {
    fn validate(&self) -> Result<(), String> {
        if self.year_start.is_none() || is_blank(&self.term) {
            return Err("Academic year and term are required".to_string());
        }
        self.term.parse::<Term>()?;
        check_range(self.start_date, self.end_date)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAcademicPeriodRequest {
    pub year_start: Option<i32>,
    pub term: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bkd_deadline: Option<NaiveDate>,
    pub research_deadline: Option<NaiveDate>,
    pub service_deadline: Option<NaiveDate>,
}

impl Validate for UpdateAcademicPeriodRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(term) = &self.term {
            term.parse::<Term>()?;
        }
        check_range(self.start_date, self.end_date)
    }
}

fn check_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), String> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err("End date must not be before start date".to_string())
        }
        _ => Ok(()),
    }
}

// ── Current period ──────────────────────────────────────────────────

/// The (`yearStart`, term) a calendar day falls in.
pub fn calendar_term(day: NaiveDate) -> (i32, Term) {
    let year_start = if day.month() >= 8 {
        day.year()
    } else {
        day.year() - 1
    };
    let term = if (2..=7).contains(&day.month()) {
        Term::Genap
    } else {
        Term::Ganjil
    };
    (year_start, term)
}

/// The period whose dates contain `today`, else the one matching
/// [`calendar_term`].
pub fn current_period(periods: &[AcademicPeriod], today: NaiveDate) -> Option<&AcademicPeriod> {
    periods.iter().find(|p| p.contains(today)).or_else(|| {
        let (year_start, term) = calendar_term(today);
        periods
            .iter()
            .find(|p| p.year_start == year_start && p.term == term)
    })
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_periods).post(create_period))
        .route("/current", get(get_current_period))
        .route(
            "/:id",
            get(get_period).put(update_period).delete(delete_period),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/academic-periods — List periods, newest year first.
#[utoipa::path(
    get,
    path = "/api/v1/academic-periods",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("yearStart" = Option<i32>, Query, description = "Academic year start"),
        ("term" = Option<String>, Query, description = "GANJIL or GENAP"),
    ),
    responses((status = 200, description = "Academic periods retrieved")),
    security(("bearer_auth" = [])),
    tag = "academic-periods"
)]
pub(crate) async fn list_periods(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<AcademicPeriod>, AppError> {
    authenticated(&caller)?;
    let filters = Filters(&query);
    let mut items = state.academic_periods.filter(|p| {
        filters.eq("yearStart", &p.year_start.to_string()) && filters.eq("term", p.term.as_str())
    });
    items.sort_by(|a, b| {
        b.year_start
            .cmp(&a.year_start)
            .then_with(|| a.term.as_str().cmp(b.term.as_str()))
    });
    let page = state.page_request(&query).slice(items);
    Ok(Paginated::from(page).message("Academic periods retrieved successfully"))
}

/// GET /api/v1/academic-periods/current — The period in effect today.
#[utoipa::path(
    get,
    path = "/api/v1/academic-periods/current",
    responses(
        (status = 200, description = "Current academic period retrieved", body = AcademicPeriod),
        (status = 404, description = "No period covers today", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "academic-periods"
)]
pub(crate) async fn get_current_period(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Success<AcademicPeriod>, AppError> {
    authenticated(&caller)?;
    let periods = state.academic_periods.list();
    let today = Utc::now().date_naive();
    let period = current_period(&periods, today)
        .cloned()
        .ok_or_else(|| not_found("Current academic period"))?;
    Ok(success(period).message("Current academic period retrieved successfully"))
}

/// GET /api/v1/academic-periods/:id — Get one period.
#[utoipa::path(
    get,
    path = "/api/v1/academic-periods/{id}",
    params(("id" = Uuid, Path, description = "Academic period ID")),
    responses(
        (status = 200, description = "Academic period retrieved", body = AcademicPeriod),
        (status = 404, description = "Academic period not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "academic-periods"
)]
pub(crate) async fn get_period(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<AcademicPeriod>, AppError> {
    authenticated(&caller)?;
    let id = extract_path(path)?;
    let period = state
        .academic_periods
        .get(&id)
        .ok_or_else(|| not_found("Academic period"))?;
    Ok(success(period).message("Academic period retrieved successfully"))
}

/// POST /api/v1/academic-periods — Create a period (ADMIN).
#[utoipa::path(
    post,
    path = "/api/v1/academic-periods",
    request_body = CreateAcademicPeriodRequest,
    responses(
        (status = 201, description = "Academic period created", body = AcademicPeriod),
        (status = 400, description = "Missing year or invalid term", body = crate::envelope::ErrorBody),
        (status = 409, description = "Period already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "academic-periods"
)]
pub(crate) async fn create_period(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateAcademicPeriodRequest>, JsonRejection>,
) -> Result<Success<AcademicPeriod>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let req = extract_validated_json(body)?;
    let term: Term = req.term.parse().map_err(AppError::BadRequest)?;
    let year_start = req
        .year_start
        .ok_or_else(|| AppError::BadRequest("Academic year and term are required".into()))?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let period = AcademicPeriod {
        id,
        year_start,
        term,
        start_date: req.start_date,
        end_date: req.end_date,
        bkd_deadline: req.bkd_deadline,
        research_deadline: req.research_deadline,
        service_deadline: req.service_deadline,
        created_at: now,
        updated_at: now,
    };
    if !state.academic_periods.insert_unique(id, period.clone(), |p| {
        p.year_start == period.year_start && p.term == period.term
    }) {
        return Err(AppError::Conflict(PERIOD_EXISTS.into()));
    }
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&period));

    Ok(success(period)
        .message("Academic period created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/academic-periods/:id — Update a period (ADMIN).
#[utoipa::path(
    put,
    path = "/api/v1/academic-periods/{id}",
    params(("id" = Uuid, Path, description = "Academic period ID")),
    request_body = UpdateAcademicPeriodRequest,
    responses(
        (status = 200, description = "Academic period updated", body = AcademicPeriod),
        (status = 404, description = "Academic period not found", body = crate::envelope::ErrorBody),
        (status = 409, description = "Period already exists", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "academic-periods"
)]
pub(crate) async fn update_period(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateAcademicPeriodRequest>, JsonRejection>,
) -> Result<Success<AcademicPeriod>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let term = req
        .term
        .as_deref()
        .map(str::parse::<Term>)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let before = state
        .academic_periods
        .get(&id)
        .ok_or_else(|| not_found("Academic period"))?;

    let updated = state
        .academic_periods
        .update_unique(
            &id,
            |p| {
                if let Some(year_start) = req.year_start {
                    p.year_start = year_start;
                }
                if let Some(term) = term {
                    p.term = term;
                }
                p.start_date = req.start_date.or(p.start_date);
                p.end_date = req.end_date.or(p.end_date);
                p.bkd_deadline = req.bkd_deadline.or(p.bkd_deadline);
                p.research_deadline = req.research_deadline.or(p.research_deadline);
                p.service_deadline = req.service_deadline.or(p.service_deadline);
                p.updated_at = Utc::now();
            },
            |other, updated| other.year_start == updated.year_start && other.term == updated.term,
        )
        .ok_or_else(|| not_found("Academic period"))?
        .map_err(|()| AppError::Conflict(PERIOD_EXISTS.into()))?;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Academic period updated successfully"))
}

/// DELETE /api/v1/academic-periods/:id — Delete a period (ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/academic-periods/{id}",
    params(("id" = Uuid, Path, description = "Academic period ID")),
    responses(
        (status = 200, description = "Academic period deleted"),
        (status = 400, description = "Period still referenced", body = crate::envelope::ErrorBody),
        (status = 404, description = "Academic period not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "academic-periods"
)]
pub(crate) async fn delete_period(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, ADMIN_ONLY)?;
    let id = extract_path(path)?;
    if !state.academic_periods.contains(&id) {
        return Err(not_found("Academic period"));
    }
    let related = state.course_offerings.any(|o| o.academic_period_id == id)
        || state.research_projects.any(|r| r.academic_period_id == id)
        || state.service_programs.any(|s| s.academic_period_id == id)
        || state.evidences.any(|e| e.academic_period_id == id)
        || state.reviews.any(|r| r.academic_period_id == id)
        || state.notes.any(|n| n.academic_period_id == id)
        || state.kpi_snapshots.any(|k| k.academic_period_id == id);
    if related {
        return Err(AppError::BadRequest(
            "Cannot delete academic period with related data".into(),
        ));
    }
    let removed = state
        .academic_periods
        .remove(&id)
        .ok_or_else(|| not_found("Academic period"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Academic period deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{self, date, send};
    use axum::http::Method;
    use kinerja_core::RoleName;
    use serde_json::json;

    fn period(year_start: i32, term: Term, range: Option<(NaiveDate, NaiveDate)>) -> AcademicPeriod {
        let now = Utc::now();
        AcademicPeriod {
            id: Uuid::new_v4(),
            year_start,
            term,
            start_date: range.map(|r| r.0),
            end_date: range.map(|r| r.1),
            bkd_deadline: None,
            research_deadline: None,
            service_deadline: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn calendar_term_boundaries() {
        assert_eq!(calendar_term(date(2024, 8, 1)), (2024, Term::Ganjil));
        assert_eq!(calendar_term(date(2024, 12, 31)), (2024, Term::Ganjil));
        assert_eq!(calendar_term(date(2025, 1, 15)), (2024, Term::Ganjil));
        assert_eq!(calendar_term(date(2025, 2, 1)), (2024, Term::Genap));
        assert_eq!(calendar_term(date(2025, 7, 31)), (2024, Term::Genap));
    }

    #[test]
    fn date_range_wins_over_calendar() {
        let today = date(2025, 1, 20);
        let by_calendar = period(2024, Term::Ganjil, None);
        // An early-starting even term that already covers today.
        let by_range = period(2024, Term::Genap, Some((date(2025, 1, 15), date(2025, 6, 30))));
        let periods = vec![by_calendar.clone(), by_range.clone()];
        assert_eq!(current_period(&periods, today).unwrap().id, by_range.id);

        let only_calendar = vec![by_calendar.clone()];
        assert_eq!(current_period(&only_calendar, today).unwrap().id, by_calendar.id);

        assert!(current_period(&[period(2020, Term::Ganjil, None)], today).is_none());
    }

    #[tokio::test]
    async fn create_validates_term_and_uniqueness() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let admin = test_support::user(&state, &[RoleName::Admin]);

        let (status, json) = send(&app, Method::POST, "/api/v1/academic-periods", Some(admin), Some(json!({"term": "GANJIL"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Academic year and term are required");

        let (status, json) = send(&app, Method::POST, "/api/v1/academic-periods", Some(admin), Some(json!({"yearStart": 2024, "term": "GASAL"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Term must be GANJIL or GENAP");

        let body = json!({"yearStart": 2024, "term": "GANJIL", "startDate": "2024-08-01", "endDate": "2025-01-31"});
        let (status, json) = send(&app, Method::POST, "/api/v1/academic-periods", Some(admin), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["startDate"], "2024-08-01");

        let (status, json) = send(&app, Method::POST, "/api/v1/academic-periods", Some(admin), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], PERIOD_EXISTS);
    }

    #[tokio::test]
    async fn current_period_endpoint() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let dosen = test_support::user(&state, &[RoleName::Dosen]);

        let (status, json) = send(&app, Method::GET, "/api/v1/academic-periods/current", Some(dosen), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Current academic period not found");

        let (year_start, term) = calendar_term(Utc::now().date_naive());
        let id = test_support::period(&state, year_start, term);
        let (status, json) = send(&app, Method::GET, "/api/v1/academic-periods/current", Some(dosen), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["id"], id.to_string());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filters_term() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let dosen = test_support::user(&state, &[RoleName::Dosen]);
        test_support::period(&state, 2023, Term::Genap);
        test_support::period(&state, 2024, Term::Genap);
        test_support::period(&state, 2024, Term::Ganjil);

        let (_, json) = send(&app, Method::GET, "/api/v1/academic-periods", Some(dosen), None).await;
        assert_eq!(json["data"][0]["yearStart"], 2024);
        assert_eq!(json["data"][0]["term"], "GANJIL");
        assert_eq!(json["data"][2]["yearStart"], 2023);

        let (_, json) = send(&app, Method::GET, "/api/v1/academic-periods?term=GENAP", Some(dosen), None).await;
        assert_eq!(json["pagination"]["total"], 2);
    }

    #[tokio::test]
    async fn only_admin_writes() {
        let state = test_support::state();
        let app = test_support::app(&state);
        let kaprodi = test_support::user(&state, &[RoleName::Kaprodi]);
        let (status, _) = send(&app, Method::POST, "/api/v1/academic-periods", Some(kaprodi), Some(json!({"yearStart": 2024, "term": "GANJIL"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
