//! # Error Types
//!
//! Validation failures raised while constructing core values from untrusted
//! input (role labels, identifiers). Built with `thiserror`; no `.unwrap()`
//! outside tests.

use thiserror::Error;

/// Errors produced by `kinerja-core` constructors and parsers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A role label did not match any [`crate::RoleName`] exactly.
    ///
    /// Role labels are case-sensitive: `"admin"` is not `"ADMIN"`.
    #[error("unknown role: \"{0}\" (expected one of ADMIN, DOSEN, KAPRODI, LPPM, LPM, DEKAN)")]
    UnknownRole(String),

    /// An identifier was not a valid UUID.
    #[error("invalid {kind} id: \"{value}\"")]
    InvalidId {
        /// Which identifier kind was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}
