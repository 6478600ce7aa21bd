//! # Authentication Middleware
//!
//! Resolves the bearer credential on each request to an [`Identity`] and
//! injects it into the request extensions.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {user_id}:{secret}
//! ```
//!
//! The secret is shared with the token issuer and compared in constant
//! time. The user id is looked up in the user store: the identity carries
//! that user's roles and the id of the lecturer profile they own, if any.
//!
//! When no secret is configured authentication is disabled and every
//! request runs as an ADMIN system identity (development mode).
//!
//! ## Caller
//!
//! Handlers read the identity through the [`Caller`] extractor, which never
//! rejects. An absent identity is passed on to the access policies so they
//! can answer with the proper 401.

use std::convert::Infallible;

use axum::extract::{Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kinerja_core::{Identity, LecturerId, RoleName, UserId};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Missing header or non-Bearer scheme.
pub const MSG_TOKEN_REQUIRED: &str = "Access token is required";
/// Malformed token or wrong secret.
pub const MSG_INVALID_TOKEN: &str = "Invalid token";
/// Token names a user that does not exist or is deactivated.
pub const MSG_USER_INACTIVE: &str = "User not found or inactive";

// ── AuthSecret ──────────────────────────────────────────────────────

/// The shared bearer secret.
///
/// Custom `Debug` redacts the value to prevent credential leakage in logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AuthSecret(String);

impl AuthSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Constant-time comparison against a provided secret.
    ///
    /// When lengths differ a dummy comparison still runs so timing does not
    /// reveal the expected length.
    pub fn matches(&self, provided: &str) -> bool {
        let provided = provided.as_bytes();
        let expected = self.0.as_bytes();
        if provided.len() != expected.len() {
            let _ = expected.ct_eq(expected);
            return false;
        }
        provided.ct_eq(expected).into()
    }
}

impl std::fmt::Debug for AuthSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthSecret([REDACTED])")
    }
}

// ── Caller ──────────────────────────────────────────────────────────

/// The identity attached to the current request, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller(pub Option<Identity>);

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(parts.extensions.get::<Identity>().cloned()))
    }
}

/// The identity used while authentication is disabled.
pub fn system_identity() -> Identity {
    Identity::new(UserId::from_uuid(Uuid::nil()), RoleName::Admin.into(), None)
}

// ── Token Validation ────────────────────────────────────────────────

/// Parse `{user_id}:{secret}` and check the secret.
///
/// Only the first `:` separates the fields, so the secret may itself
/// contain colons.
pub fn parse_bearer_token(provided: &str, expected: &AuthSecret) -> Result<UserId, &'static str> {
    let (user, secret) = provided.split_once(':').ok_or(MSG_INVALID_TOKEN)?;
    if !expected.matches(secret) {
        return Err(MSG_INVALID_TOKEN);
    }
    user.parse::<UserId>().map_err(|_| MSG_INVALID_TOKEN)
}

/// Build the identity for an active user, or `None` if the user is unknown
/// or deactivated.
pub fn resolve_identity(state: &AppState, user_id: UserId) -> Option<Identity> {
    let user = state.users.get(user_id.as_uuid()).filter(|u| u.is_active)?;
    let lecturer_id = state
        .lecturers
        .find(|l| l.user_id == user.id)
        .map(|l| LecturerId::from_uuid(l.id));
    Some(Identity::new(user_id, user.roles, lecturer_id))
}

// ── Middleware ──────────────────────────────────────────────────────

/// Authenticate the request and inject its [`Identity`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(secret) = state.config.auth_secret.clone() else {
        request.extensions_mut().insert(system_identity());
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(provided) = provided else {
        tracing::warn!("authentication failed: missing or non-Bearer authorization header");
        return AppError::Unauthorized(MSG_TOKEN_REQUIRED.into()).into_response();
    };

    let user_id = match parse_bearer_token(provided.trim(), &secret) {
        Ok(user_id) => user_id,
        Err(msg) => {
            tracing::warn!("authentication failed: invalid bearer token");
            return AppError::Unauthorized(msg.into()).into_response();
        }
    };

    match resolve_identity(&state, user_id) {
        Some(identity) => {
            tracing::debug!(user_id = %identity.id, roles = %identity.roles, "authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => {
            tracing::warn!(%user_id, "authentication failed: user not found or inactive");
            AppError::Unauthorized(MSG_USER_INACTIVE.into()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::{Lecturer, User};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use kinerja_core::RoleSet;
    use tower::ServiceExt;

    const SECRET: &str = "s3cr3t";

    fn state_with_secret(secret: Option<&str>) -> AppState {
        AppState::with_config(AppConfig {
            auth_secret: secret.map(AuthSecret::new),
            ..AppConfig::default()
        })
    }

    fn add_user(state: &AppState, roles: RoleSet, active: bool) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        state.users.insert(
            id,
            User {
                id,
                institution_id: None,
                email: format!("{id}@kampus.ac.id"),
                full_name: "Dosen Uji".into(),
                roles,
                is_active: active,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Echo the resolved identity back as JSON.
    fn test_app(state: AppState) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|caller: Caller| async move { Json(caller.0) }),
            )
            .layer(from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn call(app: Router, auth: Option<String>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    // ── AuthSecret ───────────────────────────────────────────────

    #[test]
    fn secret_matches_exactly() {
        let secret = AuthSecret::new(SECRET);
        assert!(secret.matches(SECRET));
        assert!(!secret.matches("s3cr3"));
        assert!(!secret.matches("s3cr3t!"));
        assert!(!secret.matches(""));
    }

    #[test]
    fn secret_debug_is_redacted() {
        let debug = format!("{:?}", AuthSecret::new(SECRET));
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn parse_token_accepts_user_and_secret() {
        let id = Uuid::new_v4();
        let user = parse_bearer_token(&format!("{id}:{SECRET}"), &AuthSecret::new(SECRET)).unwrap();
        assert_eq!(user.as_uuid(), &id);
    }

    #[test]
    fn parse_token_allows_colons_in_secret() {
        let id = Uuid::new_v4();
        let secret = AuthSecret::new("a:b:c");
        assert!(parse_bearer_token(&format!("{id}:a:b:c"), &secret).is_ok());
    }

    #[test]
    fn parse_token_rejects_bad_input() {
        let secret = AuthSecret::new(SECRET);
        let id = Uuid::new_v4();
        assert_eq!(parse_bearer_token(SECRET, &secret), Err(MSG_INVALID_TOKEN));
        assert_eq!(
            parse_bearer_token(&format!("{id}:wrong"), &secret),
            Err(MSG_INVALID_TOKEN)
        );
        assert_eq!(
            parse_bearer_token(&format!("not-a-uuid:{SECRET}"), &secret),
            Err(MSG_INVALID_TOKEN)
        );
    }

    // ── Middleware ───────────────────────────────────────────────

    #[tokio::test]
    async fn auth_disabled_injects_admin() {
        let (status, body) = call(test_app(state_with_secret(None)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["roles"], serde_json::json!(["ADMIN"]));
        assert_eq!(body["id"], Uuid::nil().to_string());
    }

    #[tokio::test]
    async fn missing_header_rejected() {
        let (status, body) = call(test_app(state_with_secret(Some(SECRET))), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], MSG_TOKEN_REQUIRED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_rejected() {
        let app = test_app(state_with_secret(Some(SECRET)));
        let (status, body) = call(app, Some("Basic dXNlcjpwYXNz".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], MSG_TOKEN_REQUIRED);
    }

    #[tokio::test]
    async fn wrong_secret_rejected() {
        let state = state_with_secret(Some(SECRET));
        let id = add_user(&state, RoleName::Dosen.into(), true);
        let (status, body) = call(test_app(state), Some(format!("Bearer {id}:nope"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], MSG_INVALID_TOKEN);
    }

    #[tokio::test]
    async fn unknown_user_rejected() {
        let app = test_app(state_with_secret(Some(SECRET)));
        let token = format!("Bearer {}:{SECRET}", Uuid::new_v4());
        let (status, body) = call(app, Some(token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], MSG_USER_INACTIVE);
    }

    #[tokio::test]
    async fn inactive_user_rejected() {
        let state = state_with_secret(Some(SECRET));
        let id = add_user(&state, RoleName::Dosen.into(), false);
        let (status, body) = call(test_app(state), Some(format!("Bearer {id}:{SECRET}"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], MSG_USER_INACTIVE);
    }

    #[tokio::test]
    async fn valid_token_resolves_roles_and_lecturer_profile() {
        let state = state_with_secret(Some(SECRET));
        let user_id = add_user(&state, RoleSet::of(&[RoleName::Dosen, RoleName::Kaprodi]), true);
        let lecturer_id = Uuid::new_v4();
        let now = Utc::now();
        state.lecturers.insert(
            lecturer_id,
            Lecturer {
                id: lecturer_id,
                user_id,
                study_program_id: Uuid::new_v4(),
                nidn: "0011223344".into(),
                academic_rank: None,
                expertise_focus: None,
                created_at: now,
                updated_at: now,
            },
        );

        let (status, body) =
            call(test_app(state), Some(format!("Bearer {user_id}:{SECRET}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], user_id.to_string());
        assert_eq!(body["roles"], serde_json::json!(["DOSEN", "KAPRODI"]));
        assert_eq!(body["lecturerId"], lecturer_id.to_string());
    }
}
