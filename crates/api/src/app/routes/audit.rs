use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query},
    routing::get,
    Extension, Json, Router,
};

use showcase_auth::{Actor, Permission};
use showcase_infra::audit::AuditPage;
use showcase_infra::GateError;

use crate::app::dto::AuditLogQuery;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/audit-logs", get(list_audit_logs))
}

/// Filtered, paginated audit history. Requires `audit.view`.
async fn list_audit_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<AuditLogQuery>, QueryRejection>,
) -> ApiResult<Json<AuditPage>> {
    services.gate.authorize(&actor, Permission::AuditView)?;
    let Query(query) = query?;
    let (filter, order, pagination) = query.into_parts()?;

    let page = services
        .gate
        .audit_logger()
        .logs(&filter, order, pagination)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "audit query failed");
            GateError::Internal("failed to query audit log".to_string())
        })?;
    Ok(Json(page))
}
