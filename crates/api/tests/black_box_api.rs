use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use showcase_api::app::services::{AppServices, RateLimits};
use showcase_auth::{ActorKind, CredentialClaims, Role};
use showcase_collab::{CreatorProfile, Project};
use showcase_core::{ProjectId, UserId};
use showcase_infra::collaboration::InMemoryCollaborationStore;
use showcase_infra::config::AppConfig;
use showcase_infra::rate_limit::RateLimitPolicy;

const SECRET: &str = "black-box-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(services: AppServices) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = showcase_api::app::build_app(services, SECRET);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: UserId, kind: ActorKind, role: Role, email: &str) -> String {
    let now = Utc::now();
    let claims = CredentialClaims {
        sub,
        kind,
        role,
        email: Some(email.to_string()),
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

struct Fixture {
    services: AppServices,
    project: Project,
    owner: String,
    guest: String,
    guest_id: UserId,
    outsider: String,
    admin: String,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryCollaborationStore::new());
    let owner = CreatorProfile::new("owner@example.com", "Owner");
    let guest = CreatorProfile::new("guest@example.com", "Guest");
    let outsider = CreatorProfile::new("outsider@example.com", "Outsider");
    let project = Project::new(owner.id, "Night Market", Utc::now());
    for creator in [&owner, &guest, &outsider] {
        store.insert_creator(creator.clone()).unwrap();
    }
    store.insert_project(project.clone()).unwrap();

    Fixture {
        services: AppServices::in_memory(&AppConfig::default(), store),
        project,
        owner: mint_jwt(owner.id, ActorKind::Creator, Role::Creator, &owner.email),
        guest: mint_jwt(guest.id, ActorKind::Creator, Role::Creator, &guest.email),
        guest_id: guest.id,
        outsider: mint_jwt(outsider.id, ActorKind::Creator, Role::Creator, &outsider.email),
        admin: mint_jwt(UserId::new(), ActorKind::Admin, Role::Admin, "ops@example.com"),
    }
}

#[tokio::test]
async fn health_and_actor_resolution() {
    let f = fixture();
    let server = TestServer::spawn(f.services).await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // No credential resolves to a visitor.
    let res = client.get(server.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "visitor");
    assert_eq!(body["actor_id"], Value::Null);

    let res = client
        .get(server.url("/whoami"))
        .bearer_auth(&f.owner)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "creator");
    assert!(body["permissions"]
        .as_array()
        .unwrap()
        .contains(&json!("collaboration.invite")));

    // A presented but invalid credential is rejected, not downgraded.
    let res = client
        .get(server.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn invite_accept_and_audit_flow() {
    let f = fixture();
    let project_id = f.project.id;
    let server = TestServer::spawn(f.services).await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url(&format!("/projects/{project_id}/invites")))
        .bearer_auth(&f.owner)
        .header("user-agent", "black-box")
        .header("x-forwarded-for", "203.0.113.10")
        .json(&json!({ "email": "  Guest@Example.com " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let invite: Value = res.json().await.unwrap();
    assert_eq!(invite["status"], "pending");
    let invite_id = invite["id"].as_str().unwrap().to_string();

    // The receiver sees it; the owner sees it as sent.
    let listing: Value = client
        .get(server.url("/invites"))
        .bearer_auth(&f.guest)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing["received"][0]["id"], invite_id.as_str());
    assert_eq!(listing["received"][0]["project_title"], "Night Market");

    // Only the receiver may answer.
    let res = client
        .post(server.url(&format!("/invites/{invite_id}/respond")))
        .bearer_auth(&f.outsider)
        .json(&json!({ "action": "accept" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(server.url(&format!("/invites/{invite_id}/respond")))
        .bearer_auth(&f.guest)
        .json(&json!({ "action": "accept" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["invite"]["status"], "accepted");
    assert_eq!(body["collaborator"]["creator_id"], f.guest_id.to_string());

    // Answering twice is a conflict.
    let res = client
        .post(server.url(&format!("/invites/{invite_id}/respond")))
        .bearer_auth(&f.guest)
        .json(&json!({ "action": "reject" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "invite_not_pending");

    // The collaborator now has edit-level access to the member list.
    let res = client
        .get(server.url(&format!("/projects/{project_id}/collaborators")))
        .bearer_auth(&f.guest)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["collaborators"].as_array().unwrap().len(), 1);

    // Creators cannot read the audit log; admins can.
    let res = client
        .get(server.url("/audit-logs"))
        .bearer_auth(&f.owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let page: Value = client
        .get(server.url("/audit-logs?order=oldest_first"))
        .bearer_auth(&f.admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 2);
    assert_eq!(page["records"][0]["action"], "collaboration.invite");
    assert_eq!(page["records"][0]["ip_address"], "203.0.113.10");
    assert_eq!(page["records"][0]["user_agent"], "black-box");
    assert_eq!(page["records"][1]["action"], "collaboration.accept");

    let filtered: Value = client
        .get(server.url("/audit-logs?action=collaboration.accept&limit=10"))
        .bearer_auth(&f.admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(filtered["total"], 1);
    assert_eq!(filtered["pagination"]["limit"], 10);
}

#[tokio::test]
async fn invite_permission_and_resource_checks() {
    let f = fixture();
    let project_id = f.project.id;
    let server = TestServer::spawn(f.services).await;
    let client = reqwest::Client::new();
    let invite_url = server.url(&format!("/projects/{project_id}/invites"));
    let body = json!({ "email": "guest@example.com" });

    // Visitor lacks the permission.
    let res = client.post(&invite_url).json(&body).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // A creator who is not the primary creator fails the resource check.
    let res = client
        .post(&invite_url)
        .bearer_auth(&f.outsider)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(server.url("/projects/not-a-uuid/invites"))
        .bearer_auth(&f.owner)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url(&format!("/projects/{}/invites", ProjectId::new())))
        .bearer_auth(&f.owner)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(&invite_url)
        .bearer_auth(&f.owner)
        .json(&json!({ "email": "nobody@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(&invite_url)
        .bearer_auth(&f.owner)
        .json(&json!({ "email": "owner@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // The primary creator can never be removed.
    let res = client
        .delete(server.url(&format!(
            "/projects/{project_id}/collaborators/{}",
            f.project.primary_creator_id
        )))
        .bearer_auth(&f.owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn idempotency_key_replays_and_rejects_reuse() {
    let f = fixture();
    let project_id = f.project.id;
    let server = TestServer::spawn(f.services).await;
    let client = reqwest::Client::new();
    let invite_url = server.url(&format!("/projects/{project_id}/invites"));

    let send = |key: &'static str, email: &'static str| {
        client
            .post(&invite_url)
            .bearer_auth(&f.owner)
            .header("idempotency-key", key)
            .json(&json!({ "email": email }))
            .send()
    };

    let first = send("invite-1", "guest@example.com").await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    assert!(first.headers().get("idempotent-replayed").is_none());
    let first_body: Value = first.json().await.unwrap();

    let replay = send("invite-1", "guest@example.com").await.unwrap();
    assert_eq!(replay.status(), StatusCode::CREATED);
    assert_eq!(replay.headers()["idempotent-replayed"], "true");
    let replay_body: Value = replay.json().await.unwrap();
    assert_eq!(replay_body, first_body);

    // Same key, different payload.
    let reused = send("invite-1", "outsider@example.com").await.unwrap();
    assert_eq!(reused.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = reused.json().await.unwrap();
    assert_eq!(body["error"], "idempotency_key_reused");

    // A fresh key reaches the handler and hits the pending-invite conflict,
    // which is not cached.
    let duplicate = send("invite-2", "guest@example.com").await.unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let body: Value = duplicate.json().await.unwrap();
    assert_eq!(body["code"], "invite_pending");

    let again = send("invite-2", "guest@example.com").await.unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert!(again.headers().get("idempotent-replayed").is_none());
}

#[tokio::test]
async fn collaboration_routes_are_rate_limited() {
    let f = fixture();
    let project_id = f.project.id;
    let services = f.services.with_rate_limits(RateLimits {
        collaboration: RateLimitPolicy::new(ChronoDuration::minutes(15), 2),
        ..RateLimits::default()
    });
    let server = TestServer::spawn(services).await;
    let client = reqwest::Client::new();
    let invite_url = server.url(&format!("/projects/{project_id}/invites"));

    for expected_remaining in ["1", "0"] {
        let res = client
            .post(&invite_url)
            .bearer_auth(&f.outsider)
            .json(&json!({ "email": "guest@example.com" }))
            .send()
            .await
            .unwrap();
        // Throttling counts the attempt even when authorization fails.
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.headers()["x-ratelimit-limit"], "2");
        assert_eq!(res.headers()["x-ratelimit-remaining"], expected_remaining);
    }

    let res = client
        .post(&invite_url)
        .bearer_auth(&f.outsider)
        .json(&json!({ "email": "guest@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().get("retry-after").is_some());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "rate_limited");

    // Buckets are per actor: the owner is unaffected.
    let res = client
        .post(&invite_url)
        .bearer_auth(&f.owner)
        .json(&json!({ "email": "guest@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn rbac_catalog_and_explain() {
    let f = fixture();
    let server = TestServer::spawn(f.services).await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/rbac/roles")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let catalog: Value = client
        .get(server.url("/rbac/roles"))
        .bearer_auth(&f.admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(catalog["roles"].as_array().unwrap().len(), 4);

    let explained: Value = client
        .get(server.url("/rbac/explain?permission=project.create"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(explained["granted"], false);
    assert!(explained["denial_reason"]["granting_roles"]
        .as_array()
        .unwrap()
        .contains(&json!("creator")));

    let res = client
        .get(server.url("/rbac/explain?permission=teleport"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
