//! # Caller Identity
//!
//! Identifier newtypes and the per-request [`Identity`] produced by the
//! authentication gate.
//!
//! An identity is built fresh for each request and discarded afterwards. It
//! is never mutated while the request is in flight and never persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::role::{RoleName, RoleSet};

/// A unique identifier for a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new random user identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a user identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::InvalidId {
                kind: "user",
                value: s.to_string(),
            })
    }
}

/// A unique identifier for a lecturer profile.
///
/// This is the "owned entity" of an identity: a lecturer may always read
/// data filed under their own profile, whatever roles they hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LecturerId(Uuid);

impl LecturerId {
    /// Create a new random lecturer identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a lecturer identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LecturerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LecturerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LecturerId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::InvalidId {
                kind: "lecturer",
                value: s.to_string(),
            })
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// The caller's user account.
    pub id: UserId,
    /// Roles held by the caller. May be empty.
    pub roles: RoleSet,
    /// The lecturer profile owned by the caller, if any.
    pub lecturer_id: Option<LecturerId>,
}

impl Identity {
    /// Build an identity.
    pub fn new(id: UserId, roles: RoleSet, lecturer_id: Option<LecturerId>) -> Self {
        Self {
            id,
            roles,
            lecturer_id,
        }
    }

    /// Whether the caller holds ADMIN.
    pub fn is_admin(&self) -> bool {
        self.roles.contains(RoleName::Admin)
    }

    /// Whether the caller holds at least one of `allowed`.
    pub fn has_any_role(&self, allowed: RoleSet) -> bool {
        self.roles.intersects(allowed)
    }

    /// Whether the caller owns the lecturer profile `target`.
    ///
    /// An identity without a lecturer profile owns nothing, and an absent
    /// target is owned by nobody.
    pub fn owns(&self, target: Option<&LecturerId>) -> bool {
        matches!((self.lecturer_id.as_ref(), target), (Some(own), Some(t)) if own == t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dosen(lecturer_id: Option<LecturerId>) -> Identity {
        Identity::new(UserId::new(), RoleName::Dosen.into(), lecturer_id)
    }

    #[test]
    fn ids_parse_from_uuid_strings() {
        let raw = "550e8400-e29b-41d4-a716-446655440000";
        let lecturer: LecturerId = raw.parse().unwrap();
        let user: UserId = raw.parse().unwrap();
        assert_eq!(lecturer.to_string(), raw);
        assert_eq!(user.as_uuid(), lecturer.as_uuid());
    }

    #[test]
    fn ids_reject_non_uuid_strings() {
        let err = "lec-123".parse::<LecturerId>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidId { kind: "lecturer", .. }));
        assert!("".parse::<UserId>().is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = LecturerId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::json!(id.as_uuid().to_string()));
    }

    #[test]
    fn admin_detection() {
        let admin = Identity::new(
            UserId::new(),
            RoleSet::of(&[RoleName::Dosen, RoleName::Admin]),
            None,
        );
        assert!(admin.is_admin());
        assert!(!dosen(None).is_admin());
    }

    #[test]
    fn owns_matches_only_equal_present_ids() {
        let own = LecturerId::new();
        let caller = dosen(Some(own));
        assert!(caller.owns(Some(&own)));
        assert!(!caller.owns(Some(&LecturerId::new())));
        assert!(!caller.owns(None));
    }

    #[test]
    fn identity_without_profile_owns_nothing() {
        let caller = dosen(None);
        assert!(!caller.owns(None));
        assert!(!caller.owns(Some(&LecturerId::new())));
    }

    #[test]
    fn identity_serializes_camel_case() {
        let lecturer = LecturerId::new();
        let caller = dosen(Some(lecturer));
        let json = serde_json::to_value(&caller).unwrap();
        assert_eq!(json["roles"], serde_json::json!(["DOSEN"]));
        assert_eq!(json["lecturerId"], serde_json::json!(lecturer.to_string()));
    }
}
