//! # Integration Tests for kinerja-api
//!
//! Drives the assembled application end to end: health checks, the
//! authentication gate, role and ownership gates, response envelopes,
//! pagination, the audit chain and the OpenAPI document.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use kinerja_core::{RoleName, RoleSet};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use kinerja_api::auth::AuthSecret;
use kinerja_api::config::AppConfig;
use kinerja_api::models::{Lecturer, User};
use kinerja_api::state::AppState;

const SECRET: &str = "integration-secret";

/// Helper: build the test app with auth disabled.
fn test_app() -> axum::Router {
    kinerja_api::app(AppState::new())
}

/// Helper: build state with auth enabled.
fn test_state_with_auth() -> AppState {
    AppState::with_config(AppConfig {
        auth_secret: Some(AuthSecret::new(SECRET)),
        ..AppConfig::default()
    })
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

fn seed_user(state: &AppState, roles: &[RoleName]) -> Uuid {
    let now = Utc::now();
    let id = Uuid::new_v4();
    state.users.insert(
        id,
        User {
            id,
            institution_id: None,
            email: format!("{id}@univ.ac.id"),
            full_name: format!("User {id}"),
            roles: RoleSet::of(roles),
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    );
    id
}

fn seed_lecturer(state: &AppState, user_id: Uuid) -> Uuid {
    let now = Utc::now();
    let id = Uuid::new_v4();
    state.lecturers.insert(
        id,
        Lecturer {
            id,
            user_id,
            study_program_id: Uuid::new_v4(),
            nidn: id.simple().to_string()[..10].to_string(),
            academic_rank: None,
            expertise_focus: None,
            created_at: now,
            updated_at: now,
        },
    );
    id
}

fn get(uri: &str, user: Option<Uuid>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(user) = user {
        builder = builder.header("authorization", format!("Bearer {user}:{SECRET}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, user: Uuid, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {user}:{SECRET}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// -- Health Checks ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_check() {
    let response = test_app().oneshot(get("/health/liveness", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_check() {
    let response = test_app().oneshot(get("/health/readiness", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

#[tokio::test]
async fn test_api_health_needs_no_token() {
    let app = kinerja_api::app(test_state_with_auth());
    let response = app.oneshot(get("/api/v1/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_missing_token_is_401() {
    let app = kinerja_api::app(test_state_with_auth());
    let response = app.oneshot(get("/api/v1/institutions", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(
        body,
        json!({"success": false, "message": "Access token is required"})
    );
}

#[tokio::test]
async fn test_wrong_secret_is_401() {
    let state = test_state_with_auth();
    let user = seed_user(&state, &[RoleName::Admin]);
    let app = kinerja_api::app(state);
    let request = Request::builder()
        .uri("/api/v1/institutions")
        .header("authorization", format!("Bearer {user}:wrong"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid token");
}

#[tokio::test]
async fn test_inactive_user_is_401() {
    let state = test_state_with_auth();
    let user = seed_user(&state, &[RoleName::Admin]);
    state.users.update(&user, |u| u.is_active = false);
    let app = kinerja_api::app(state);
    let response = app.oneshot(get("/api/v1/institutions", Some(user))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["message"],
        "User not found or inactive"
    );
}

#[tokio::test]
async fn test_auth_disabled_runs_as_admin() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/institutions")
                .header("content-type", "application/json")
                .body(Body::from(json!({"name": "Universitas Dev", "code": "DEV"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

// -- Role and Ownership Gates -------------------------------------------------

#[tokio::test]
async fn test_dosen_on_dekan_route_is_forbidden_without_errors_key() {
    let state = test_state_with_auth();
    let dosen = seed_user(&state, &[RoleName::Dosen]);
    let app = kinerja_api::app(state);
    let response = app
        .oneshot(send_json(
            "POST",
            "/api/v1/faculties",
            dosen,
            json!({"institutionId": Uuid::new_v4(), "name": "Teknik", "code": "FT"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Access denied. Insufficient permissions.");
    assert!(!body.as_object().unwrap().contains_key("errors"));
}

#[tokio::test]
async fn test_lecturer_reads_own_records_but_not_others() {
    let state = test_state_with_auth();
    let owner = seed_user(&state, &[RoleName::Dosen]);
    let own = seed_lecturer(&state, owner);
    let other_user = seed_user(&state, &[RoleName::Dosen]);
    let other = seed_lecturer(&state, other_user);
    let app = kinerja_api::app(state);

    for prefix in [
        "course-offerings",
        "research-projects",
        "service-programs",
        "evidences",
        "reviews",
        "notes",
        "kpi-snapshots",
    ] {
        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/{prefix}/lecturer/{own}"), Some(owner)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{prefix} own");

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/{prefix}/lecturer/{other}"), Some(owner)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{prefix} other");
        assert_eq!(
            body_json(response).await["message"],
            "Access denied. You can only access your own data."
        );
    }

    let response = app
        .oneshot(get(&format!("/api/v1/lecturers/{own}/dashboard"), Some(owner)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ownership_gate_runs_before_lecturer_id_is_parsed() {
    let state = test_state_with_auth();
    let dosen = seed_user(&state, &[RoleName::Dosen]);
    seed_lecturer(&state, dosen);
    let kaprodi = seed_user(&state, &[RoleName::Kaprodi]);
    let app = kinerja_api::app(state);

    for uri in [
        "/api/v1/course-offerings/lecturer/lec-123",
        "/api/v1/research-projects/lecturer/lec-123",
        "/api/v1/service-programs/lecturer/lec-123",
        "/api/v1/evidences/lecturer/lec-123",
        "/api/v1/reviews/lecturer/lec-123",
        "/api/v1/notes/lecturer/lec-123",
        "/api/v1/kpi-snapshots/lecturer/lec-123",
        "/api/v1/kpi-snapshots/lecturer/lec-123/latest",
        "/api/v1/lecturers/lec-123/dashboard",
    ] {
        let response = app.clone().oneshot(get(uri, Some(dosen))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri} dosen");

        let response = app.clone().oneshot(get(uri, Some(kaprodi))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri} kaprodi");
    }
}

// -- Envelopes and Pagination -------------------------------------------------

#[tokio::test]
async fn test_list_pagination_meta() {
    let state = test_state_with_auth();
    let admin = seed_user(&state, &[RoleName::Admin]);
    let app = kinerja_api::app(state);
    for i in 0..3 {
        let response = app
            .clone()
            .oneshot(send_json(
                "POST",
                "/api/v1/institutions",
                admin,
                json!({"name": format!("Universitas {i}"), "code": format!("U{i}")}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(get("/api/v1/institutions?page=2&limit=2", Some(admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Institutions retrieved successfully");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(
        body["pagination"],
        json!({"total": 3, "page": 2, "limit": 2, "totalPages": 2, "hasNext": false, "hasPrev": true})
    );
}

#[tokio::test]
async fn test_malformed_pagination_falls_back() {
    let state = test_state_with_auth();
    let admin = seed_user(&state, &[RoleName::Admin]);
    let app = kinerja_api::app(state);
    let response = app
        .oneshot(get("/api/v1/users?page=abc&limit=-5", Some(admin)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 10);
}

#[tokio::test]
async fn test_pagination_reads_leading_integer() {
    let state = test_state_with_auth();
    let admin = seed_user(&state, &[RoleName::Admin]);
    let app = kinerja_api::app(state);
    let response = app
        .oneshot(get("/api/v1/users?page=2.5&limit=20abc", Some(admin)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["limit"], 20);
}

#[tokio::test]
async fn test_unknown_api_route_is_404_envelope() {
    let state = test_state_with_auth();
    let admin = seed_user(&state, &[RoleName::Admin]);
    let app = kinerja_api::app(state);
    let response = app.oneshot(get("/api/v1/nope", Some(admin))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"success": false, "message": "API endpoint not found"})
    );
}

#[tokio::test]
async fn test_malformed_body_is_400_with_errors() {
    let state = test_state_with_auth();
    let admin = seed_user(&state, &[RoleName::Admin]);
    let app = kinerja_api::app(state);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/institutions")
        .header("authorization", format!("Bearer {admin}:{SECRET}"))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["errors"].is_array());
}

// -- Audit Trail --------------------------------------------------------------

#[tokio::test]
async fn test_writes_chain_into_audit_log() {
    let state = test_state_with_auth();
    let admin = seed_user(&state, &[RoleName::Admin]);
    let app = kinerja_api::app(state.clone());

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/v1/academic-periods",
            admin,
            json!({"yearStart": 2025, "term": "GANJIL"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let period_id = body_json(response).await["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(send_json(
            "DELETE",
            &format!("/api/v1/academic-periods/{period_id}"),
            admin,
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/api/v1/audit-logs/verify", Some(admin)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(
        body["data"],
        json!({"totalEvents": 2, "brokenLinks": 0, "chainValid": true})
    );
    assert_eq!(state.audit.list()[1].action.as_str(), "DELETE");
}

// -- Metrics ------------------------------------------------------------------

#[tokio::test]
async fn test_metrics_count_requests_and_errors() {
    let state = test_state_with_auth();
    let app = kinerja_api::app(state);
    let _ = app.clone().oneshot(get("/api/v1/institutions", None)).await.unwrap();

    let response = app.oneshot(get("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["requests"], 1);
    assert_eq!(body["clientErrors"], 1);
    assert_eq!(body["serverErrors"], 0);
}

// -- OpenAPI ------------------------------------------------------------------

#[tokio::test]
async fn test_openapi_document_is_served() {
    let response = test_app().oneshot(get("/api/v1/openapi.json", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["info"]["title"], "Kinerja API");
    assert!(body["paths"]["/api/v1/lecturers/{id}/dashboard"].is_object());
    assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
}
