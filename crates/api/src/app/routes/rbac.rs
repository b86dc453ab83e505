use axum::{
    extract::{rejection::QueryRejection, Query},
    routing::get,
    Extension, Json, Router,
};

use showcase_auth::{
    explain_authorization, Actor, AuthorizationExplanation, Permission, RbacRegistry,
    RolePermissionSet,
};
use showcase_infra::GateError;

use crate::app::dto::ExplainQuery;
use crate::app::errors::ApiResult;

pub fn router() -> Router {
    Router::new()
        .route("/rbac/roles", get(list_roles))
        .route("/rbac/explain", get(explain))
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Every role and permission with its grants. Signed-in actors only.
async fn list_roles(Extension(actor): Extension<Actor>) -> ApiResult<Json<RbacRegistry>> {
    actor.require_id().map_err(GateError::from)?;
    Ok(Json(RbacRegistry::from_table(RolePermissionSet::global())))
}

// ─────────────────────────────────────────────────────────────────────────────
// Explain
// ─────────────────────────────────────────────────────────────────────────────

/// Why the current actor would be allowed or denied `permission`.
async fn explain(
    Extension(actor): Extension<Actor>,
    query: Result<Query<ExplainQuery>, QueryRejection>,
) -> ApiResult<Json<AuthorizationExplanation>> {
    let Query(query) = query?;
    let permission: Permission = query
        .permission
        .parse()
        .map_err(|e: showcase_auth::UnknownPermission| GateError::Validation(e.to_string()))?;

    Ok(Json(explain_authorization(
        RolePermissionSet::global(),
        &actor,
        permission,
    )))
}
