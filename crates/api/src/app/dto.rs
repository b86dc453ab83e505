//! Request/response DTOs and JSON mapping helpers.

use std::str::FromStr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use showcase_auth::{Actor, ActorKind, Permission, Role};
use showcase_core::{DomainError, UserId};
use showcase_infra::audit::{AuditFilter, AuditOrder, Pagination};
use showcase_infra::idempotency::StoredResponse;
use showcase_infra::GateError;

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondInviteRequest {
    /// `accept` or `reject`.
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub actor_id: Option<UserId>,
    pub kind: ActorKind,
    pub role: Role,
    pub email: Option<String>,
    pub permissions: Vec<Permission>,
}

impl WhoAmIResponse {
    pub fn from_actor(actor: &Actor) -> Self {
        Self {
            actor_id: actor.id(),
            kind: actor.kind(),
            role: actor.role(),
            email: actor.email().map(str::to_string),
            permissions: showcase_auth::RolePermissionSet::global()
                .permissions_for(actor.role())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub permission: String,
}

/// `GET /audit-logs` query string.
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub actor_id: Option<String>,
    pub actor_type: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: Option<AuditOrder>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// 1-based; takes precedence over `offset`.
    pub page: Option<u32>,
}

impl AuditLogQuery {
    pub fn into_parts(self) -> Result<(AuditFilter, AuditOrder, Pagination), GateError> {
        let actor_id = self
            .actor_id
            .as_deref()
            .map(|raw| parse_id::<UserId>(raw, "actor_id"))
            .transpose()?;
        let actor_type = self
            .actor_type
            .as_deref()
            .map(|raw| raw.parse::<ActorKind>().map_err(GateError::Validation))
            .transpose()?;

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from >= to {
                return Err(GateError::Validation("`from` must be before `to`".to_string()));
            }
        }

        let pagination = match self.page {
            Some(page) => Pagination::page(page, self.limit.unwrap_or(Pagination::default().limit)),
            None => Pagination::new(self.limit, self.offset),
        };

        let filter = AuditFilter {
            actor_id,
            actor_type,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            created_from: self.from,
            created_to: self.to,
        };
        Ok((filter, self.order.unwrap_or_default(), pagination))
    }
}

/// Parse a path or query identifier, reporting bad input as a validation error.
pub fn parse_id<T>(raw: &str, field: &str) -> Result<T, GateError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| GateError::Validation(format!("{field}: {e}")))
}

/// Serialize a handler result into the response the gate stores and replays.
pub fn json_body<T: Serialize>(status: StatusCode, value: &T) -> Result<StoredResponse, GateError> {
    let body = serde_json::to_value(value)
        .map_err(|e| GateError::Internal(format!("failed to encode response: {e}")))?;
    Ok(StoredResponse {
        status: status.as_u16(),
        body,
    })
}

pub fn stored_response(stored: &StoredResponse) -> Response {
    let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(stored.body.clone())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use showcase_core::ProjectId;

    #[test]
    fn audit_query_maps_to_filter_and_page() {
        let id = UserId::new();
        let query = AuditLogQuery {
            actor_id: Some(id.to_string()),
            actor_type: Some("creator".to_string()),
            action: Some("collaboration.invite".to_string()),
            page: Some(3),
            limit: Some(20),
            ..Default::default()
        };

        let (filter, order, pagination) = query.into_parts().unwrap();
        assert_eq!(filter.actor_id, Some(id));
        assert_eq!(filter.actor_type, Some(ActorKind::Creator));
        assert_eq!(order, AuditOrder::NewestFirst);
        assert_eq!(pagination, Pagination { limit: 20, offset: 40 });
    }

    #[test]
    fn bad_audit_query_is_a_validation_error() {
        let bad_id = AuditLogQuery {
            actor_id: Some("nope".to_string()),
            ..Default::default()
        };
        assert_eq!(bad_id.into_parts().unwrap_err().kind(), "validation_error");

        let bad_kind = AuditLogQuery {
            actor_type: Some("robot".to_string()),
            ..Default::default()
        };
        assert!(bad_kind.into_parts().is_err());

        let now = Utc::now();
        let inverted = AuditLogQuery {
            from: Some(now),
            to: Some(now),
            ..Default::default()
        };
        assert!(inverted.into_parts().is_err());
    }

    #[test]
    fn ids_are_validated() {
        assert!(parse_id::<ProjectId>("not-a-uuid", "project_id").is_err());
        let id = ProjectId::new();
        assert_eq!(parse_id::<ProjectId>(&id.to_string(), "project_id").unwrap(), id);
    }
}
