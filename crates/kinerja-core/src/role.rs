//! # Roles
//!
//! The fixed set of institutional roles and a compact, copyable set type for
//! expressing "who may call this operation".
//!
//! A role is a label, not an object with behaviour. The only privilege
//! relationship between roles is the universal ADMIN override applied by the
//! access policies in [`crate::authz`]; there is no hierarchy among the rest.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Institutional role labels.
///
/// Wire form is the exact upper-case label. Parsing is case-sensitive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleName {
    /// System administrator. Passes every access policy.
    Admin = 0,
    /// Lecturer (dosen).
    Dosen = 1,
    /// Head of study program (ketua program studi).
    Kaprodi = 2,
    /// Research and community service institute (LPPM).
    Lppm = 3,
    /// Quality assurance institute (LPM).
    Lpm = 4,
    /// Dean of faculty.
    Dekan = 5,
}

impl RoleName {
    /// Every role, in declaration order.
    pub const ALL: [RoleName; 6] = [
        RoleName::Admin,
        RoleName::Dosen,
        RoleName::Kaprodi,
        RoleName::Lppm,
        RoleName::Lpm,
        RoleName::Dekan,
    ];

    /// Return the wire label of this role.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Dosen => "DOSEN",
            Self::Kaprodi => "KAPRODI",
            Self::Lppm => "LPPM",
            Self::Lpm => "LPM",
            Self::Dekan => "DEKAN",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| CoreError::UnknownRole(s.to_string()))
    }
}

/// A set of [`RoleName`]s.
///
/// Constructible in `const` context so allowed-role parameters can be
/// declared as literals next to the routes they guard:
///
/// ```
/// use kinerja_core::{RoleName, RoleSet};
///
/// const REVIEWERS: RoleSet = RoleSet::of(&[RoleName::Kaprodi, RoleName::Dekan]);
/// assert!(REVIEWERS.contains(RoleName::Dekan));
/// assert!(!REVIEWERS.contains(RoleName::Dosen));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    /// The empty set. As an allowed-role parameter it means "ADMIN only".
    pub const EMPTY: RoleSet = RoleSet(0);

    /// Build a set from a slice of roles. Duplicates are ignored.
    pub const fn of(roles: &[RoleName]) -> Self {
        let mut bits = 0u8;
        let mut i = 0;
        while i < roles.len() {
            bits |= roles[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Whether `role` is a member.
    pub const fn contains(self, role: RoleName) -> bool {
        self.0 & role.bit() != 0
    }

    /// Whether the two sets share at least one role.
    pub const fn intersects(self, other: RoleSet) -> bool {
        self.0 & other.0 != 0
    }

    /// Set union.
    pub const fn union(self, other: RoleSet) -> RoleSet {
        RoleSet(self.0 | other.0)
    }

    /// Whether the set has no members.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of members.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Add a role. Returns `true` if it was not already present.
    pub fn insert(&mut self, role: RoleName) -> bool {
        let added = !self.contains(role);
        self.0 |= role.bit();
        added
    }

    /// Remove a role. Returns `true` if it was present.
    pub fn remove(&mut self, role: RoleName) -> bool {
        let present = self.contains(role);
        self.0 &= !role.bit();
        present
    }

    /// Iterate members in declaration order.
    pub fn iter(self) -> impl Iterator<Item = RoleName> {
        RoleName::ALL
            .into_iter()
            .filter(move |role| self.contains(*role))
    }

    /// Parse a list of role labels, rejecting the first unknown one.
    pub fn parse_labels<I, S>(labels: I) -> Result<RoleSet, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels
            .into_iter()
            .map(|label| label.as_ref().parse::<RoleName>())
            .collect()
    }
}

impl FromIterator<RoleName> for RoleSet {
    fn from_iter<T: IntoIterator<Item = RoleName>>(iter: T) -> Self {
        let mut set = RoleSet::EMPTY;
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl From<RoleName> for RoleSet {
    fn from(role: RoleName) -> Self {
        RoleSet(role.bit())
    }
}

impl fmt::Debug for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(|r| r.as_str()).collect();
        f.write_str(&labels.join(", "))
    }
}

impl Serialize for RoleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let roles = Vec::<RoleName>::deserialize(deserializer)?;
        Ok(roles.into_iter().collect())
    }
}
