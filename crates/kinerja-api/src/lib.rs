//! # kinerja-api — Academic Performance REST API
//!
//! Axum service over the [`kinerja_core`] domain: bearer authentication,
//! role and ownership gates, uniform response envelopes, in-memory resource
//! stores and a hash-chained audit trail.
//!
//! ## API Surface
//!
//! | Prefix                          | Module                           |
//! |---------------------------------|----------------------------------|
//! | `/api/v1/auth/*`                | [`routes::auth`]                 |
//! | `/api/v1/institutions/*`        | [`routes::institutions`]         |
//! | `/api/v1/faculties/*`           | [`routes::faculties`]            |
//! | `/api/v1/study-programs/*`      | [`routes::study_programs`]       |
//! | `/api/v1/users/*`               | [`routes::users`]                |
//! | `/api/v1/lecturers/*`           | [`routes::lecturers`]            |
//! | `/api/v1/roles`                 | [`routes::roles`]                |
//! | `/api/v1/academic-periods/*`    | [`routes::academic_periods`]     |
//! | `/api/v1/courses/*`             | [`routes::courses`]              |
//! | `/api/v1/course-offerings/*`    | [`routes::course_offerings`]     |
//! | `/api/v1/teaching-activities/*` | [`routes::teaching_activities`]  |
//! | `/api/v1/research-projects/*`   | [`routes::research_projects`]    |
//! | `/api/v1/research-outputs/*`    | [`routes::research_outputs`]     |
//! | `/api/v1/service-programs/*`    | [`routes::service_programs`]     |
//! | `/api/v1/service-impacts/*`     | [`routes::service_impacts`]      |
//! | `/api/v1/evidence-types/*`      | [`routes::evidence_types`]       |
//! | `/api/v1/evidences/*`           | [`routes::evidences`]            |
//! | `/api/v1/reviews/*`             | [`routes::reviews`]              |
//! | `/api/v1/notes/*`               | [`routes::notes`]                |
//! | `/api/v1/kpi-snapshots/*`       | [`routes::kpi_snapshots`]        |
//! | `/api/v1/audit-logs/*`          | [`routes::audit_logs`]           |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Health checks, `/api/v1/health` and `/metrics` sit outside the stack and
//! need no credentials.

pub mod audit;
pub mod auth;
pub mod authorize;
pub mod config;
pub mod envelope;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;

use crate::envelope::{error_response, success, Success};
use crate::middleware::metrics::{metrics_middleware, MetricsSnapshot};
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    // Authenticated API routes.
    let api = routes::api_router()
        .merge(openapi::router())
        .fallback(api_not_found)
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(Extension(metrics))
        .with_state(state.clone());

    // Unauthenticated health checks.
    let public = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/api/v1/health", get(api_health))
        .route("/metrics", get(metrics_json))
        .with_state(state);

    Router::new().merge(public).merge(api)
}

/// Liveness check: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check: returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatus {
    status: &'static str,
    version: &'static str,
}

/// GET /api/v1/health
async fn api_health() -> Success<HealthStatus> {
    success(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
    .message("Kinerja API is running")
}

/// GET /metrics — request and error counters.
async fn metrics_json(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

async fn api_not_found() -> impl IntoResponse {
    error_response()
        .message("API endpoint not found")
        .status(StatusCode::NOT_FOUND)
}
