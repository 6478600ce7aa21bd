//! # Authorization Engine
//!
//! Role-based and ownership-based access decisions evaluated in front of
//! every resource operation.
//!
//! ## Policies
//!
//! | Policy | Allows when |
//! |--------|-------------|
//! | [`role_gate`] | caller is ADMIN, or holds one of the allowed roles |
//! | [`owner_or_role_gate`] | caller is ADMIN, or owns the target lecturer profile, or holds one of the allowed roles |
//!
//! Both deny with [`DenyReason::Unauthenticated`] when there is no caller.
//!
//! ## Evaluation order
//!
//! The owner-or-role gate checks ADMIN first, then ownership, then role
//! membership. Ownership must not require any role: a lecturer holding no
//! listed role can still read their own records.
//!
//! Role comparison is exact. ADMIN is the only override; there is no other
//! hierarchy between roles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::{Identity, LecturerId};
use crate::role::RoleSet;

/// Why a policy refused the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    /// No identity was attached to the request.
    Unauthenticated,
    /// Identity present but holds neither ADMIN nor an allowed role.
    ForbiddenRole,
    /// Identity present, does not own the target, and holds neither ADMIN
    /// nor an allowed role.
    ForbiddenOwnership,
}

impl DenyReason {
    /// User-facing message for this reason.
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "Authentication required",
            Self::ForbiddenRole => "Access denied. Insufficient permissions.",
            Self::ForbiddenOwnership => "Access denied. You can only access your own data.",
        }
    }

    /// HTTP-equivalent status: 401 when unauthenticated, 403 otherwise.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::ForbiddenRole | Self::ForbiddenOwnership => 403,
        }
    }

    /// Machine-readable code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::ForbiddenRole => "FORBIDDEN_ROLE",
            Self::ForbiddenOwnership => "FORBIDDEN_OWNERSHIP",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for DenyReason {}

/// Outcome of an access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The guarded operation may proceed.
    Allow,
    /// The request must stop here.
    Deny(DenyReason),
}

impl Decision {
    /// Whether the decision is [`Decision::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert into a `Result`, carrying the deny reason as the error.
    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(reason),
        }
    }
}

/// Policy A: allow ADMIN, or any caller holding one of `allowed`.
///
/// With an empty `allowed` set only ADMIN passes.
pub fn role_gate(identity: Option<&Identity>, allowed: RoleSet) -> Decision {
    let Some(identity) = identity else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };
    if identity.is_admin() || identity.has_any_role(allowed) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::ForbiddenRole)
    }
}

/// Policy B: allow ADMIN, then the owner of `target`, then any caller
/// holding one of `allowed`.
///
/// An identity without a lecturer profile never passes the ownership check,
/// even when `target` is also absent.
pub fn owner_or_role_gate(
    identity: Option<&Identity>,
    allowed: RoleSet,
    target: Option<&LecturerId>,
) -> Decision {
    let Some(identity) = identity else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };
    if identity.is_admin() {
        return Decision::Allow;
    }
    if identity.owns(target) {
        return Decision::Allow;
    }
    if identity.has_any_role(allowed) {
        return Decision::Allow;
    }
    Decision::Deny(DenyReason::ForbiddenOwnership)
}

/// Locate the lecturer profile a request targets.
///
/// The path parameter takes precedence over the body field when both are
/// present.
pub fn resolve_target_owner_id(
    path: Option<LecturerId>,
    body: Option<LecturerId>,
) -> Option<LecturerId> {
    path.or(body)
}

/// A policy bound to its allowed roles, ready to evaluate per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// [`role_gate`].
    Roles(RoleSet),
    /// [`owner_or_role_gate`].
    OwnerOrRoles(RoleSet),
}

impl AccessPolicy {
    /// Evaluate against a caller. `target` is ignored by [`AccessPolicy::Roles`].
    pub fn evaluate(&self, identity: Option<&Identity>, target: Option<&LecturerId>) -> Decision {
        match *self {
            Self::Roles(allowed) => role_gate(identity, allowed),
            Self::OwnerOrRoles(allowed) => owner_or_role_gate(identity, allowed, target),
        }
    }

    /// The allowed-role set of this policy.
    pub fn allowed(&self) -> RoleSet {
        match *self {
            Self::Roles(allowed) | Self::OwnerOrRoles(allowed) => allowed,
        }
    }
}
