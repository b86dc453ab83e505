//! Authorization Gate: the single entry point for mutating operations.
//!
//! Pipeline, earliest failure wins:
//!
//! ```text
//! rate limit ─▶ idempotency begin ─▶ role permission ─▶ project access
//!            ─▶ mutation ─▶ audit (best effort) ─▶ idempotency complete
//! ```
//!
//! Rate limiting and idempotency are optional per request; the HTTP adapter
//! applies them as layers and leaves them unset here.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use showcase_auth::{Actor, Permission, authorize};
use showcase_collab::{AccessLevel, CollabError, Project, ProjectAccess};
use showcase_core::ProjectId;

use crate::audit::{AuditLogEntry, AuditLogger, NewAuditEntry};
use crate::collaboration::{CollaborationService, CollaborationStore};
use crate::error::GateError;
use crate::idempotency::{
    in_flight_error, BeginOutcome, IdempotencyGuard, IdempotencyKey, StoredResponse,
    ANONYMOUS_SCOPE,
};
use crate::rate_limit::{RateLimitKey, RateLimitPolicy, RateLimiter};

/// What a caller learns about a project it may not access.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistencePolicy {
    /// Existing project, insufficient access: `forbidden`.
    #[default]
    Distinguish,
    /// Existing project, insufficient access: `not_found`, same as a missing one.
    Conceal,
}

impl core::str::FromStr for ExistencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "distinguish" => Ok(ExistencePolicy::Distinguish),
            "conceal" => Ok(ExistencePolicy::Conceal),
            other => Err(format!("unknown existence policy '{other}'")),
        }
    }
}

/// Caller network facts recorded in audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Rate-limit identity: the actor when signed in, otherwise the IP.
    pub fn rate_limit_identity(&self, actor: &Actor) -> String {
        actor
            .scope_key()
            .or_else(|| self.ip.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Idempotency scope: the actor when signed in, otherwise the visitor's IP.
    pub fn idempotency_scope(&self, actor: &Actor) -> String {
        actor
            .scope_key()
            .or_else(|| self.ip.as_ref().map(|ip| format!("{ANONYMOUS_SCOPE}:{ip}")))
            .unwrap_or_else(|| ANONYMOUS_SCOPE.to_string())
    }
}

#[derive(Debug, Clone)]
struct IdempotentRequest {
    key: String,
    request_hash: String,
}

/// One gated operation.
#[derive(Debug, Clone)]
pub struct GateRequest {
    actor: Actor,
    route: String,
    permission: Permission,
    client: ClientInfo,
    rate_limit: Option<RateLimitPolicy>,
    idempotency: Option<IdempotentRequest>,
    project: Option<(ProjectId, AccessLevel)>,
}

impl GateRequest {
    pub fn new(actor: Actor, route: impl Into<String>, permission: Permission) -> Self {
        Self {
            actor,
            route: route.into(),
            permission,
            client: ClientInfo::default(),
            rate_limit: None,
            idempotency: None,
            project: None,
        }
    }

    pub fn client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    pub fn rate_limited(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = Some(policy);
        self
    }

    pub fn idempotent(mut self, key: impl Into<String>, request_hash: impl Into<String>) -> Self {
        self.idempotency = Some(IdempotentRequest {
            key: key.into(),
            request_hash: request_hash.into(),
        });
        self
    }

    pub fn on_project(mut self, project_id: ProjectId, level: AccessLevel) -> Self {
        self.project = Some((project_id, level));
        self
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }
}

/// Result of a mutation: the response to return (and cache) plus the audit
/// entry to write once it has committed.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub response: StoredResponse,
    pub audit: Option<NewAuditEntry>,
}

impl Mutation {
    pub fn new(response: StoredResponse) -> Self {
        Self {
            response,
            audit: None,
        }
    }

    pub fn audited(mut self, entry: NewAuditEntry) -> Self {
        self.audit = Some(entry);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResponse {
    pub response: StoredResponse,
    /// The response came from the idempotency cache; nothing executed.
    pub replayed: bool,
}

#[derive(Clone)]
pub struct AuthorizationGate {
    rate_limiter: RateLimiter,
    idempotency: IdempotencyGuard,
    audit: Arc<AuditLogger>,
    collaboration: CollaborationService,
    existence_policy: ExistencePolicy,
}

impl AuthorizationGate {
    pub fn new(
        rate_limiter: RateLimiter,
        idempotency: IdempotencyGuard,
        audit: Arc<AuditLogger>,
        collaboration_store: Arc<dyn CollaborationStore>,
    ) -> Self {
        Self {
            rate_limiter,
            idempotency,
            audit,
            collaboration: CollaborationService::new(collaboration_store),
            existence_policy: ExistencePolicy::default(),
        }
    }

    pub fn with_existence_policy(mut self, policy: ExistencePolicy) -> Self {
        self.existence_policy = policy;
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn idempotency(&self) -> &IdempotencyGuard {
        &self.idempotency
    }

    pub fn audit_logger(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub fn collaboration(&self) -> &CollaborationService {
        &self.collaboration
    }

    pub fn authorize(&self, actor: &Actor, permission: Permission) -> Result<(), GateError> {
        authorize(actor, permission).map_err(|e| {
            tracing::debug!(actor_kind = %actor.kind(), permission = %permission, "permission denied");
            GateError::from(e)
        })
    }

    /// Resource-level check for project-scoped operations.
    ///
    /// `Edit` needs the primary creator or a collaborator; `Owner` needs the
    /// primary creator. Roles grant nothing here, admins included.
    pub async fn authorize_project_access(
        &self,
        actor: &Actor,
        project_id: ProjectId,
        level: AccessLevel,
    ) -> Result<Project, GateError> {
        let actor_id = actor.require_id()?;
        let project = self
            .collaboration
            .store()
            .get_project(project_id)
            .await?
            .ok_or(CollabError::ProjectNotFound(project_id))?;

        let is_collaborator = self
            .collaboration
            .store()
            .is_collaborator(project_id, actor_id)
            .await?;
        if ProjectAccess::new(&project, actor_id, is_collaborator).permits(level) {
            return Ok(project);
        }

        Err(match self.existence_policy {
            ExistencePolicy::Distinguish => {
                GateError::Forbidden(format!("insufficient access to project {project_id}"))
            }
            ExistencePolicy::Conceal => CollabError::ProjectNotFound(project_id).into(),
        })
    }

    /// Best-effort audit write; call only after the mutation committed.
    pub async fn audit(&self, entry: NewAuditEntry) -> Option<AuditLogEntry> {
        self.audit.record(entry).await
    }

    pub async fn execute<F, Fut>(
        &self,
        request: GateRequest,
        mutation: F,
    ) -> Result<GateResponse, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Mutation, GateError>>,
    {
        self.execute_at(request, Utc::now(), mutation).await
    }

    pub async fn execute_at<F, Fut>(
        &self,
        request: GateRequest,
        now: DateTime<Utc>,
        mutation: F,
    ) -> Result<GateResponse, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Mutation, GateError>>,
    {
        let actor = &request.actor;

        if let Some(policy) = request.rate_limit {
            let key = RateLimitKey::new(&request.route, &request.client.rate_limit_identity(actor));
            self.rate_limiter.enforce(&key, policy, now).await?;
        }

        let claimed = match &request.idempotency {
            Some(idem) => {
                let scope = request.client.idempotency_scope(actor);
                let key = IdempotencyKey::new(scope, request.route.clone(), &idem.key)?;
                match self.idempotency.begin(&key, &idem.request_hash, now).await? {
                    BeginOutcome::Completed(response) => {
                        tracing::info!(key = %key, "replaying idempotent response");
                        return Ok(GateResponse {
                            response,
                            replayed: true,
                        });
                    }
                    BeginOutcome::InFlight => return Err(in_flight_error()),
                    BeginOutcome::New(token) => Some((key, token)),
                }
            }
            None => None,
        };

        let outcome = self.run(&request, mutation).await;

        match outcome {
            Ok(done) => {
                if let Some(mut entry) = done.audit {
                    if entry.ip_address.is_none() && entry.user_agent.is_none() {
                        entry = entry.client(request.client.ip.clone(), request.client.user_agent.clone());
                    }
                    self.audit.record(entry).await;
                }
                if let Some((key, token)) = &claimed {
                    if (200..300).contains(&done.response.status) {
                        self.idempotency
                            .complete(key, *token, done.response.clone(), Utc::now())
                            .await;
                    } else {
                        self.idempotency.release(key, *token).await;
                    }
                }
                Ok(GateResponse {
                    response: done.response,
                    replayed: false,
                })
            }
            Err(e) => {
                if let Some((key, token)) = &claimed {
                    self.idempotency.release(key, *token).await;
                }
                Err(e)
            }
        }
    }

    async fn run<F, Fut>(&self, request: &GateRequest, mutation: F) -> Result<Mutation, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Mutation, GateError>>,
    {
        self.authorize(&request.actor, request.permission)?;
        if let Some((project_id, level)) = request.project {
            self.authorize_project_access(&request.actor, project_id, level).await?;
        }
        mutation().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use showcase_collab::CreatorProfile;
    use showcase_core::UserId;

    use super::*;
    use crate::audit::InMemoryAuditLog;
    use crate::collaboration::InMemoryCollaborationStore;
    use crate::idempotency::IdempotencyConfig;

    fn gate_with(store: Arc<InMemoryCollaborationStore>) -> AuthorizationGate {
        AuthorizationGate::new(
            RateLimiter::in_memory(),
            IdempotencyGuard::in_memory(IdempotencyConfig::default()),
            Arc::new(AuditLogger::new(Arc::new(InMemoryAuditLog::new()))),
            store,
        )
    }

    fn seeded() -> (Arc<InMemoryCollaborationStore>, Actor, Actor, Project) {
        let store = Arc::new(InMemoryCollaborationStore::new());
        let owner = CreatorProfile::new("owner@example.com", "Owner");
        let other = CreatorProfile::new("other@example.com", "Other");
        let project = Project::new(owner.id, "Glasswork", Utc::now());
        store.insert_creator(owner.clone()).unwrap();
        store.insert_creator(other.clone()).unwrap();
        store.insert_project(project.clone()).unwrap();
        (
            store,
            Actor::creator(owner.id, owner.email),
            Actor::creator(other.id, other.email),
            project,
        )
    }

    #[test]
    fn existence_policy_parses() {
        assert_eq!("conceal".parse::<ExistencePolicy>(), Ok(ExistencePolicy::Conceal));
        assert_eq!(" Distinguish ".parse::<ExistencePolicy>(), Ok(ExistencePolicy::Distinguish));
        assert!("hide".parse::<ExistencePolicy>().is_err());
    }

    #[tokio::test]
    async fn role_permissions_end_to_end() {
        let (store, ..) = seeded();
        let gate = gate_with(store);

        let admin = Actor::admin(UserId::new(), "ops@example.com");
        let creator = Actor::creator(UserId::new(), "maker@example.com");
        let visitor = Actor::visitor();

        assert!(gate.authorize(&admin, Permission::AuditView).is_ok());
        assert_eq!(gate.authorize(&creator, Permission::AuditView).unwrap_err().kind(), "forbidden");
        assert_eq!(gate.authorize(&visitor, Permission::ProjectCreate).unwrap_err().kind(), "forbidden");
        assert!(gate.authorize(&visitor, Permission::RatingCreate).is_ok());
    }

    #[tokio::test]
    async fn existence_policy_controls_forbidden_vs_not_found() {
        let (store, _owner, other, project) = seeded();

        let distinguish = gate_with(store.clone());
        let err = distinguish
            .authorize_project_access(&other, project.id, AccessLevel::Edit)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "forbidden");

        let conceal = gate_with(store).with_existence_policy(ExistencePolicy::Conceal);
        let err = conceal
            .authorize_project_access(&other, project.id, AccessLevel::Edit)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let missing = conceal
            .authorize_project_access(&other, ProjectId::new(), AccessLevel::Edit)
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), "not_found");
    }

    #[tokio::test]
    async fn owner_level_requires_primary_creator() {
        let (store, owner, _other, project) = seeded();
        let gate = gate_with(store);

        assert!(gate.authorize_project_access(&owner, project.id, AccessLevel::Owner).await.is_ok());

        let admin = Actor::admin(UserId::new(), "ops@example.com");
        let system = Actor::system(UserId::new());
        for level in [AccessLevel::Owner, AccessLevel::Edit] {
            let err = gate
                .authorize_project_access(&admin, project.id, level)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "forbidden");
            assert!(gate.authorize_project_access(&system, project.id, level).await.is_err());
        }
    }

    #[tokio::test]
    async fn admin_cannot_run_owner_mutations_on_foreign_projects() {
        let (store, _owner, _other, project) = seeded();
        let gate = gate_with(store);
        let admin = Actor::super_admin(UserId::new(), "root@example.com");

        let request = GateRequest::new(admin, "invites.create", Permission::CollaborationInvite)
            .on_project(project.id, AccessLevel::Owner);
        let err = gate
            .execute(request, || async { Ok(Mutation::new(StoredResponse { status: 201, body: json!({}) })) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }

    #[test]
    fn visitors_are_scoped_by_ip_for_idempotency() {
        let visitor = Actor::visitor();
        let from = |ip: &str| ClientInfo { ip: Some(ip.to_string()), user_agent: None };

        assert_eq!(from("10.0.0.1").idempotency_scope(&visitor), "anonymous:10.0.0.1");
        assert_ne!(
            from("10.0.0.1").idempotency_scope(&visitor),
            from("10.0.0.2").idempotency_scope(&visitor)
        );
        assert_eq!(ClientInfo::default().idempotency_scope(&visitor), ANONYMOUS_SCOPE);

        let creator = Actor::creator(UserId::new(), "maker@example.com");
        assert_eq!(
            from("10.0.0.1").idempotency_scope(&creator),
            creator.scope_key().unwrap()
        );
    }

    #[tokio::test]
    async fn failed_permission_releases_the_idempotency_claim() {
        let (store, ..) = seeded();
        let gate = gate_with(store);
        let visitor = Actor::visitor();

        let request = GateRequest::new(visitor.clone(), "projects.create", Permission::ProjectCreate)
            .idempotent("k-1", "h");
        let err = gate
            .execute(request, || async { Ok(Mutation::new(StoredResponse { status: 201, body: json!({}) })) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "forbidden");

        // Same key with a permitted operation on the same route executes normally.
        let key = IdempotencyKey::new(ANONYMOUS_SCOPE, "projects.create", "k-1").unwrap();
        assert!(matches!(
            gate.idempotency().begin(&key, "h", Utc::now()).await.unwrap(),
            BeginOutcome::New(_)
        ));
    }
}
