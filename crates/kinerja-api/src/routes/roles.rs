//! # Roles
//!
//! - `GET /api/v1/roles` — every institutional role, in declaration order
//!
//! The role set is fixed at compile time, so the listing is read-only.

use axum::routing::get;
use axum::Router;
use kinerja_core::RoleName;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::authorize::authenticated;
use crate::envelope::{success, Success};
use crate::error::AppError;
use crate::state::AppState;

/// One role as shown to clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    /// Wire label, e.g. `KAPRODI`.
    #[schema(value_type = String)]
    pub name: &'static str,
    #[schema(value_type = String)]
    pub description: &'static str,
}

impl From<RoleName> for RoleView {
    fn from(role: RoleName) -> Self {
        let description = match role {
            RoleName::Admin => "System administrator",
            RoleName::Dosen => "Lecturer",
            RoleName::Kaprodi => "Head of study program",
            RoleName::Lppm => "Research and community service institute",
            RoleName::Lpm => "Quality assurance institute",
            RoleName::Dekan => "Dean of faculty",
        };
        Self {
            name: role.as_str(),
            description,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_roles))
}

/// GET /api/v1/roles — List the roles.
#[utoipa::path(
    get,
    path = "/api/v1/roles",
    responses((status = 200, description = "Roles retrieved", body = [RoleView])),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub(crate) async fn list_roles(caller: Caller) -> Result<Success<Vec<RoleView>>, AppError> {
    authenticated(&caller)?;
    let roles = RoleName::ALL.into_iter().map(RoleView::from).collect();
    Ok(success(roles).message("Roles retrieved successfully"))
}
