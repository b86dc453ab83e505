use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::json;

use showcase_auth::{Actor, Permission};
use showcase_collab::{AccessLevel, InviteResponse};
use showcase_core::{InviteId, ProjectId, UserId};
use showcase_infra::audit::{actions, entities, NewAuditEntry};
use showcase_infra::idempotency::IdempotencyGuard;
use showcase_infra::{ClientInfo, GateError, GateRequest, Mutation};

use crate::app::dto::{json_body, parse_id, stored_response, InviteRequest, RespondInviteRequest};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::middleware::with_idempotency;

pub const INVITE_ROUTE: &str = "invites.create";
pub const RESPOND_ROUTE: &str = "invites.respond";
pub const REMOVE_ROUTE: &str = "collaborators.remove";

/// State-changing routes; each is replay-safe under its own route key.
pub fn mutation_router(guard: IdempotencyGuard) -> Router {
    Router::new()
        .merge(with_idempotency(
            Router::new().route("/projects/:project_id/invites", post(send_invite)),
            guard.clone(),
            INVITE_ROUTE,
        ))
        .merge(with_idempotency(
            Router::new().route("/invites/:invite_id/respond", post(respond_invite)),
            guard.clone(),
            RESPOND_ROUTE,
        ))
        .merge(with_idempotency(
            Router::new().route(
                "/projects/:project_id/collaborators/:creator_id",
                delete(remove_collaborator),
            ),
            guard,
            REMOVE_ROUTE,
        ))
}

pub fn read_router() -> Router {
    Router::new()
        .route("/invites", get(list_invites))
        .route("/projects/:project_id/collaborators", get(list_collaborators))
}

// ─────────────────────────────────────────────────────────────────────────────
// Mutations
// ─────────────────────────────────────────────────────────────────────────────

async fn send_invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Extension(client): Extension<ClientInfo>,
    Path(project_id): Path<String>,
    body: Result<Json<InviteRequest>, JsonRejection>,
) -> ApiResult {
    let project_id: ProjectId = parse_id(&project_id, "project_id")?;
    let Json(body) = body?;

    let gate = &services.gate;
    let request = GateRequest::new(actor.clone(), INVITE_ROUTE, Permission::CollaborationInvite)
        .on_project(project_id, AccessLevel::Owner)
        .client(client);

    let actor = &actor;
    let email = body.email.as_str();
    let done = gate
        .execute(request, || async move {
            let invite = gate
                .collaboration()
                .invite(project_id, actor, email, Utc::now())
                .await?;
            let audit = NewAuditEntry::new(actor, actions::COLLABORATION_INVITE, entities::PROJECT)
                .entity_id(project_id)
                .metadata(json!({ "invite_id": invite.id, "receiver_id": invite.receiver_id }));
            Ok::<_, GateError>(Mutation::new(json_body(StatusCode::CREATED, &invite)?).audited(audit))
        })
        .await?;

    Ok(stored_response(&done.response))
}

async fn respond_invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Extension(client): Extension<ClientInfo>,
    Path(invite_id): Path<String>,
    body: Result<Json<RespondInviteRequest>, JsonRejection>,
) -> ApiResult {
    let invite_id: InviteId = parse_id(&invite_id, "invite_id")?;
    let Json(body) = body?;
    let answer: InviteResponse = body.action.trim().parse().map_err(GateError::Validation)?;

    let gate = &services.gate;
    let request = GateRequest::new(actor.clone(), RESPOND_ROUTE, Permission::CollaborationRespond)
        .client(client);

    let actor = &actor;
    let done = gate
        .execute(request, || async move {
            let transition = gate
                .collaboration()
                .respond(invite_id, actor, answer, Utc::now())
                .await?;
            let action = match answer {
                InviteResponse::Accept => actions::COLLABORATION_ACCEPT,
                InviteResponse::Reject => actions::COLLABORATION_REJECT,
            };
            let audit = NewAuditEntry::new(actor, action, entities::COLLABORATION_INVITE)
                .entity_id(invite_id)
                .metadata(json!({ "project_id": transition.invite.project_id }));
            let body = json!({
                "invite": transition.invite,
                "collaborator": transition.collaborator,
            });
            Ok::<_, GateError>(Mutation::new(json_body(StatusCode::OK, &body)?).audited(audit))
        })
        .await?;

    Ok(stored_response(&done.response))
}

async fn remove_collaborator(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Extension(client): Extension<ClientInfo>,
    Path((project_id, creator_id)): Path<(String, String)>,
) -> ApiResult {
    let project_id: ProjectId = parse_id(&project_id, "project_id")?;
    let creator_id: UserId = parse_id(&creator_id, "creator_id")?;

    let gate = &services.gate;
    let request = GateRequest::new(actor.clone(), REMOVE_ROUTE, Permission::CollaborationRemove)
        .on_project(project_id, AccessLevel::Owner)
        .client(client);

    let actor = &actor;
    let done = gate
        .execute(request, || async move {
            let removed = gate
                .collaboration()
                .remove_collaborator(project_id, actor, creator_id)
                .await?;
            let audit = NewAuditEntry::new(actor, actions::COLLABORATION_REMOVE, entities::PROJECT)
                .entity_id(project_id)
                .metadata(json!({ "creator_id": creator_id }));
            let response = json_body(StatusCode::OK, &json!({ "removed": removed }))?;
            Ok::<_, GateError>(Mutation::new(response).audited(audit))
        })
        .await?;

    Ok(stored_response(&done.response))
}

// ─────────────────────────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────────────────────────

async fn list_invites(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<showcase_infra::collaboration::InviteListing>> {
    services.gate.authorize(&actor, Permission::CollaborationRespond)?;
    let listing = services.gate.collaboration().list_invites(&actor).await?;
    Ok(Json(listing))
}

async fn list_collaborators(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let project_id: ProjectId = parse_id(&project_id, "project_id")?;
    let gate = &services.gate;

    gate.authorize(&actor, Permission::ProjectView)?;
    let project = gate
        .authorize_project_access(&actor, project_id, AccessLevel::Edit)
        .await?;
    let collaborators = gate.collaboration().list_collaborators(project_id).await?;

    Ok(Json(json!({
        "project_id": project.id,
        "primary_creator_id": project.primary_creator_id,
        "collaborators": collaborators,
    })))
}
