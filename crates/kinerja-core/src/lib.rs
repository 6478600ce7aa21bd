#![deny(missing_docs)]

//! # kinerja-core — Domain Core for the Kinerja Backend
//!
//! Types and decision logic shared by every part of the academic performance
//! backend. It has no HTTP dependency: only `serde`, `serde_json`, `thiserror`
//! and `uuid` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Roles are a closed enum.** [`RoleName`] has one variant per role the
//!    institution recognises. Allowed-role parameters are [`RoleSet`] literals
//!    built in `const` context at each call site, never runtime-mutable lists.
//!
//! 2. **Access policies are pure.** [`authz::role_gate`] and
//!    [`authz::owner_or_role_gate`] take the caller's [`Identity`] (or its
//!    absence) and return a [`Decision`]. They never touch request state, so
//!    the precedence rule for locating the target owner lives in its own
//!    function, [`authz::resolve_target_owner_id`].
//!
//! 3. **Pagination is total.** [`PageRequest`] is always valid (`page >= 1`,
//!    `limit >= 1`) no matter how malformed the query string was, and
//!    [`PaginationMeta`] is derived entirely from `(total, page, limit)`.

pub mod authz;
pub mod error;
pub mod identity;
pub mod pagination;
pub mod role;

// Re-export primary types at crate root for ergonomic imports.
pub use authz::{AccessPolicy, Decision, DenyReason};
pub use error::CoreError;
pub use identity::{Identity, LecturerId, UserId};
pub use pagination::{Page, PageRequest, PaginationMeta};
pub use role::{RoleName, RoleSet};
