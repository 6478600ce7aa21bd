//! # HTTP Gates
//!
//! Binds the access policies of [`kinerja_core::authz`] to requests.
//! Handlers call [`authorize`], [`authorize_owner_or_roles`] or
//! [`authorize_lecturer_path`] before they touch the body or the stores;
//! [`require_roles`] guards a whole router.
//!
//! A denial stops the request: the reason becomes the error envelope with
//! 401 (no identity) or 403.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kinerja_core::authz::resolve_target_owner_id;
use kinerja_core::{AccessPolicy, DenyReason, Identity, LecturerId, RoleName, RoleSet};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_path;

/// Roles that oversee lecturers without owning them.
pub const OVERSIGHT: RoleSet = RoleSet::of(&[
    RoleName::Kaprodi,
    RoleName::Dekan,
    RoleName::Lpm,
    RoleName::Lppm,
]);

/// [`OVERSIGHT`] plus lecturers themselves.
pub const OVERSIGHT_AND_DOSEN: RoleSet = OVERSIGHT.union(RoleSet::of(&[RoleName::Dosen]));

/// ADMIN only.
pub const ADMIN_ONLY: RoleSet = RoleSet::EMPTY;

/// Require any authenticated caller.
pub fn authenticated(caller: &Caller) -> Result<&Identity, AppError> {
    caller.identity().ok_or_else(|| {
        tracing::warn!("access denied: unauthenticated");
        DenyReason::Unauthenticated.into()
    })
}

/// Role gate: ADMIN, or any role in `allowed`.
pub fn authorize(caller: &Caller, allowed: RoleSet) -> Result<&Identity, AppError> {
    check(caller, AccessPolicy::Roles(allowed), None)
}

/// Owner-or-role gate: ADMIN, the owner of `target`, or any role in `allowed`.
pub fn authorize_owner_or_roles(
    caller: &Caller,
    allowed: RoleSet,
    target: Option<LecturerId>,
) -> Result<&Identity, AppError> {
    check(caller, AccessPolicy::OwnerOrRoles(allowed), target.as_ref())
}

/// Owner-or-role gate on a raw `:lecturerId` path segment, then parse it.
///
/// The gate sees the segment before it is validated: a caller who may not
/// read the lecturer's data gets 403 even for a malformed id, and only
/// callers who pass get the 400. A malformed segment owns nothing, so only
/// ADMIN or a role in `allowed` gets that far.
///
/// Routes guarded this way are reads without a body, so the target always
/// comes from the path.
pub fn authorize_lecturer_path(
    caller: &Caller,
    allowed: RoleSet,
    path: Result<Path<String>, PathRejection>,
) -> Result<Uuid, AppError> {
    let raw = extract_path(path)?;
    let parsed = raw.trim().parse::<Uuid>();
    let from_path = parsed.as_ref().ok().copied().map(LecturerId::from_uuid);
    authorize_owner_or_roles(caller, allowed, resolve_target_owner_id(from_path, None))?;
    parsed.map_err(|err| AppError::BadRequest(format!("Invalid path parameter: {err}")))
}

fn check<'a>(
    caller: &'a Caller,
    policy: AccessPolicy,
    target: Option<&LecturerId>,
) -> Result<&'a Identity, AppError> {
    let identity = caller.identity();
    if let Err(reason) = policy.evaluate(identity, target).into_result() {
        tracing::warn!(
            reason = reason.as_str(),
            user_id = identity.map(|i| i.id.to_string()),
            allowed = %policy.allowed(),
            target = target.map(|t| t.to_string()),
            "access denied"
        );
        return Err(reason.into());
    }
    // Allow implies an identity was present.
    identity.ok_or_else(|| DenyReason::Unauthenticated.into())
}

/// Apply the role gate to every route of a router.
///
/// ```ignore
/// router.route_layer(from_fn_with_state(ADMIN_ONLY, require_roles))
/// ```
pub async fn require_roles(
    State(allowed): State<RoleSet>,
    request: Request,
    next: Next,
) -> Response {
    let caller = Caller(request.extensions().get::<Identity>().cloned());
    match authorize(&caller, allowed) {
        Ok(_) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::{Extension, Router};
    use http_body_util::BodyExt;
    use kinerja_core::UserId;
    use tower::ServiceExt;

    fn caller(roles: &[RoleName], lecturer: Option<LecturerId>) -> Caller {
        Caller(Some(Identity::new(UserId::new(), RoleSet::of(roles), lecturer)))
    }

    fn status(err: AppError) -> (StatusCode, String) {
        let message = err.client_message().to_string();
        (err.into_response().status(), message)
    }

    #[test]
    fn role_sets() {
        assert!(OVERSIGHT.contains(RoleName::Lppm));
        assert!(!OVERSIGHT.contains(RoleName::Dosen));
        assert!(OVERSIGHT_AND_DOSEN.contains(RoleName::Dosen));
        assert!(ADMIN_ONLY.is_empty());
    }

    #[test]
    fn authenticated_requires_identity() {
        assert!(authenticated(&caller(&[], None)).is_ok());
        let (code, _) = status(authenticated(&Caller(None)).unwrap_err());
        assert_eq!(code, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn dosen_denied_on_kaprodi_dekan_route() {
        let gate = RoleSet::of(&[RoleName::Kaprodi, RoleName::Dekan]);
        let err = authorize(&caller(&[RoleName::Dosen], None), gate).unwrap_err();
        assert_eq!(
            status(err),
            (
                StatusCode::FORBIDDEN,
                "Access denied. Insufficient permissions.".to_string()
            )
        );
    }

    #[test]
    fn admin_passes_admin_only() {
        let c = caller(&[RoleName::Admin], None);
        assert!(authorize(&c, ADMIN_ONLY).is_ok());
        assert!(authorize(&caller(&[RoleName::Kaprodi], None), ADMIN_ONLY).is_err());
    }

    #[test]
    fn missing_identity_is_401() {
        let err = authorize(&Caller(None), OVERSIGHT).unwrap_err();
        assert_eq!(status(err).0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn owner_passes_without_roles() {
        let lecturer = LecturerId::new();
        let c = caller(&[RoleName::Dosen], Some(lecturer));
        let identity = authorize_owner_or_roles(&c, ADMIN_ONLY, Some(lecturer)).unwrap();
        assert_eq!(identity.lecturer_id, Some(lecturer));
    }

    #[test]
    fn foreign_lecturer_gets_ownership_message() {
        let c = caller(&[RoleName::Dosen], Some(LecturerId::new()));
        let err = authorize_owner_or_roles(&c, OVERSIGHT, Some(LecturerId::new())).unwrap_err();
        assert_eq!(
            status(err),
            (
                StatusCode::FORBIDDEN,
                "Access denied. You can only access your own data.".to_string()
            )
        );
    }

    #[test]
    fn oversight_role_passes_foreign_target() {
        let c = caller(&[RoleName::Lpm], None);
        assert!(authorize_owner_or_roles(&c, OVERSIGHT, Some(LecturerId::new())).is_ok());
    }

    #[test]
    fn lecturer_path_is_gated_before_it_is_parsed() {
        let segment = |raw: &str| Ok(Path(raw.to_string()));

        let dosen = caller(&[RoleName::Dosen], Some(LecturerId::new()));
        let err = authorize_lecturer_path(&dosen, OVERSIGHT, segment("not-a-uuid")).unwrap_err();
        assert_eq!(status(err).0, StatusCode::FORBIDDEN);

        let kaprodi = caller(&[RoleName::Kaprodi], None);
        let err = authorize_lecturer_path(&kaprodi, OVERSIGHT, segment("not-a-uuid")).unwrap_err();
        assert_eq!(status(err).0, StatusCode::BAD_REQUEST);

        let err = authorize_lecturer_path(&Caller(None), OVERSIGHT, segment("x")).unwrap_err();
        assert_eq!(status(err).0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn lecturer_path_resolves_own_id() {
        let own = LecturerId::new();
        let dosen = caller(&[RoleName::Dosen], Some(own));
        let raw = format!(" {} ", own.as_uuid());
        let id = authorize_lecturer_path(&dosen, OVERSIGHT, Ok(Path(raw))).unwrap();
        assert_eq!(id, *own.as_uuid());
    }

    #[tokio::test]
    async fn require_roles_guards_router() {
        let app = |roles: &[RoleName]| {
            Router::new()
                .route("/guarded", get(|| async { "in" }))
                .route_layer(from_fn_with_state(ADMIN_ONLY, require_roles))
                .layer(Extension(Identity::new(
                    UserId::new(),
                    RoleSet::of(roles),
                    None,
                )))
        };
        let request = || {
            axum::http::Request::builder()
                .uri("/guarded")
                .body(Body::empty())
                .unwrap()
        };

        let ok = app(&[RoleName::Admin]).oneshot(request()).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let denied = app(&[RoleName::Lpm]).oneshot(request()).await.unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        let bytes = denied.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body.get("errors").is_none());
    }
}
