//! # API Route Modules
//!
//! One module per resource, each exposing `router()`. [`api_router`] nests
//! them under `/api/v1`:
//!
//! - `auth` — the caller's own profile.
//! - `institutions`, `faculties`, `study_programs` — organisation tree.
//! - `users`, `lecturers`, `roles` — people, including the lecturer dashboard.
//! - `academic_periods` — terms and the current-period lookup.
//! - `courses`, `course_offerings`, `teaching_activities` — teaching.
//! - `research_projects`, `research_outputs` — research.
//! - `service_programs`, `service_impacts` — community service.
//! - `evidence_types`, `evidences` — supporting documents and their links.
//! - `reviews`, `notes`, `kpi_snapshots` — evaluation.
//! - `audit_logs` — the hash-chained audit trail (ADMIN only).

pub mod academic_periods;
pub mod audit_logs;
pub mod auth;
pub mod course_offerings;
pub mod courses;
pub mod evidence_types;
pub mod evidences;
pub mod faculties;
pub mod institutions;
pub mod kpi_snapshots;
pub mod lecturers;
pub mod notes;
pub mod research_outputs;
pub mod research_projects;
pub mod reviews;
pub mod roles;
pub mod service_impacts;
pub mod service_programs;
pub mod study_programs;
pub mod teaching_activities;
pub mod users;

use std::collections::HashMap;

use axum::Router;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::contains_ci;
use crate::state::AppState;

/// Every resource router, nested under `/api/v1`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1/auth", auth::router())
        .nest("/api/v1/institutions", institutions::router())
        .nest("/api/v1/faculties", faculties::router())
        .nest("/api/v1/study-programs", study_programs::router())
        .nest("/api/v1/users", users::router())
        .nest("/api/v1/lecturers", lecturers::router())
        .nest("/api/v1/roles", roles::router())
        .nest("/api/v1/academic-periods", academic_periods::router())
        .nest("/api/v1/courses", courses::router())
        .nest("/api/v1/course-offerings", course_offerings::router())
        .nest("/api/v1/teaching-activities", teaching_activities::router())
        .nest("/api/v1/research-projects", research_projects::router())
        .nest("/api/v1/research-outputs", research_outputs::router())
        .nest("/api/v1/service-programs", service_programs::router())
        .nest("/api/v1/service-impacts", service_impacts::router())
        .nest("/api/v1/evidence-types", evidence_types::router())
        .nest("/api/v1/evidences", evidences::router())
        .nest("/api/v1/reviews", reviews::router())
        .nest("/api/v1/notes", notes::router())
        .nest("/api/v1/kpi-snapshots", kpi_snapshots::router())
        .nest("/api/v1/audit-logs", audit_logs::router())
}

/// `"{entity} not found"` as a 404.
pub(crate) fn not_found(entity: &str) -> AppError {
    AppError::NotFound(format!("{entity} not found"))
}

/// 404 unless both the lecturer and the academic period exist.
pub(crate) fn ensure_lecturer_and_period(
    state: &AppState,
    lecturer_id: &Uuid,
    academic_period_id: &Uuid,
) -> Result<(), AppError> {
    if !state.lecturers.contains(lecturer_id) {
        return Err(not_found("Lecturer"));
    }
    if !state.academic_periods.contains(academic_period_id) {
        return Err(not_found("Academic period"));
    }
    Ok(())
}

// ── Query filters ───────────────────────────────────────────────────

/// List filters read from the query string. A filter that is absent or
/// blank matches everything.
pub(crate) struct Filters<'a>(pub &'a HashMap<String, String>);

impl<'a> Filters<'a> {
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Exact id match. A value that is not a UUID matches nothing.
    pub fn id(&self, key: &str, value: &Uuid) -> bool {
        self.get(key)
            .map_or(true, |f| f.parse::<Uuid>().map_or(false, |u| u == *value))
    }

    /// Exact, case-sensitive label match.
    pub fn eq(&self, key: &str, value: &str) -> bool {
        self.get(key).map_or(true, |f| f == value)
    }

    /// `true`/`false` match. Any other value is `false`.
    pub fn flag(&self, key: &str, value: bool) -> bool {
        self.get(key).map_or(true, |f| (f == "true") == value)
    }

    /// Case-insensitive substring match against any of `fields`.
    pub fn search<'f>(&self, fields: impl IntoIterator<Item = Option<&'f str>>) -> bool {
        match self.get("search") {
            None => true,
            Some(needle) => fields
                .into_iter()
                .flatten()
                .any(|field| contains_ci(field, needle)),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the route tests: an app with authentication
    //! enabled, seeded records and a request helper.

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use chrono::{NaiveDate, Utc};
    use http_body_util::BodyExt;
    use kinerja_core::{RoleName, RoleSet};
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::auth::AuthSecret;
    use crate::config::AppConfig;
    use crate::models::{
        AcademicPeriod, Course, CourseOffering, Faculty, Institution, Lecturer, StudyProgram,
        Term, User,
    };
    use crate::state::AppState;

    pub const SECRET: &str = "test-secret";

    pub fn state() -> AppState {
        AppState::with_config(AppConfig {
            auth_secret: Some(AuthSecret::new(SECRET)),
            ..AppConfig::default()
        })
    }

    pub fn app(state: &AppState) -> Router {
        crate::app(state.clone())
    }

    pub fn institution(state: &AppState, code: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        state.institutions.insert(
            id,
            Institution {
                id,
                name: format!("Universitas {code}"),
                code: code.into(),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn faculty(state: &AppState, institution_id: Uuid, code: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        state.faculties.insert(
            id,
            Faculty {
                id,
                institution_id,
                name: format!("Fakultas {code}"),
                code: code.into(),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn study_program(state: &AppState, faculty_id: Uuid, code: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        state.study_programs.insert(
            id,
            StudyProgram {
                id,
                faculty_id,
                name: format!("Prodi {code}"),
                code: code.into(),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// An active user holding `roles`.
    pub fn user(state: &AppState, roles: &[RoleName]) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        state.users.insert(
            id,
            User {
                id,
                institution_id: None,
                email: format!("{id}@kampus.ac.id"),
                full_name: format!("Pengguna {}", &id.to_string()[..8]),
                roles: RoleSet::of(roles),
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// A lecturer profile for `user_id` in a fresh study program.
    pub fn lecturer(state: &AppState, user_id: Uuid) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        state.lecturers.insert(
            id,
            Lecturer {
                id,
                user_id,
                study_program_id: Uuid::new_v4(),
                nidn: id.to_string()[..10].to_string(),
                academic_rank: None,
                expertise_focus: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// A DOSEN user with their own lecturer profile: `(user_id, lecturer_id)`.
    pub fn dosen(state: &AppState) -> (Uuid, Uuid) {
        let user_id = user(state, &[RoleName::Dosen]);
        (user_id, lecturer(state, user_id))
    }

    pub fn period(state: &AppState, year_start: i32, term: Term) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        state.academic_periods.insert(
            id,
            AcademicPeriod {
                id,
                year_start,
                term,
                start_date: None,
                end_date: None,
                bkd_deadline: None,
                research_deadline: None,
                service_deadline: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// A three-credit course in a fresh study program.
    pub fn course(state: &AppState, code: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        state.courses.insert(
            id,
            Course {
                id,
                study_program_id: Uuid::new_v4(),
                code: code.into(),
                name: format!("Mata Kuliah {code}"),
                credits: 3,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Class `A` of `course_id` taught by `lecturer_id` in `period_id`.
    pub fn offering(state: &AppState, course_id: Uuid, period_id: Uuid, lecturer_id: Uuid) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        state.course_offerings.insert(
            id,
            CourseOffering {
                id,
                course_id,
                academic_period_id: period_id,
                class_name: "A".into(),
                lecturer_id,
                co_lecturer_id: None,
                student_count: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Send a request as `user` (or anonymously) and decode the JSON body.
    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("Authorization", format!("Bearer {user}:{SECRET}"));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
