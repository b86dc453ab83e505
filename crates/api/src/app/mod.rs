//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the Authorization Gate
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices, jwt_secret: &str) -> Router {
    let actor_state = middleware::ActorState {
        jwt: services::jwt_validator(jwt_secret),
    };
    let services = Arc::new(services);

    // Every non-health route resolves an actor first; rate limiting and
    // idempotency run inside it, per route group.
    let gated = routes::router(&services).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                actor_state,
                middleware::actor_middleware,
            ))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(gated)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use showcase_infra::collaboration::InMemoryCollaborationStore;
    use showcase_infra::config::AppConfig;

    fn app() -> Router {
        let services = AppServices::in_memory(
            &AppConfig::default(),
            Arc::new(InMemoryCollaborationStore::new()),
        );
        build_app(services, "unit-secret")
    }

    #[tokio::test]
    async fn health_needs_no_actor() {
        let res = app()
            .oneshot(
                Request::get("/health")
                    .header("authorization", "Bearer garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn visitor_is_forbidden_from_audit_logs() {
        let res = app()
            .oneshot(Request::get("/audit-logs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert!(res.headers().contains_key(crate::middleware::RATE_LIMIT_LIMIT));

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "forbidden");
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let res = app()
            .oneshot(
                Request::post(format!("/projects/{}/invites", showcase_core::ProjectId::new()))
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
