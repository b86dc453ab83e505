use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::Response,
    Router,
};
use chrono::{DateTime, Utc};

use showcase_auth::{Actor, JwtValidator};
use showcase_infra::idempotency::{
    in_flight_error, request_hash, BeginOutcome, IdempotencyGuard, IdempotencyKey, StoredResponse,
};
use showcase_infra::rate_limit::{RateLimitDecision, RateLimitKey, RateLimitPolicy, RateLimiter};
use showcase_infra::{ClientInfo, GateError};

use crate::app::dto::stored_response;
use crate::app::errors::{gate_error_to_response, json_error};
use crate::context::client_info;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const REPLAYED_HEADER: &str = "idempotent-replayed";
pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

const MAX_IDEMPOTENT_BODY: usize = 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Actor resolution
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ActorState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Resolves the request's [`Actor`] and [`ClientInfo`] into extensions.
///
/// No `Authorization` header means a visitor; a header that does not carry a
/// valid bearer token is rejected outright.
pub async fn actor_middleware(
    State(state): State<ActorState>,
    mut req: Request,
    next: Next,
) -> Response {
    let actor = match extract_bearer(req.headers()) {
        Ok(None) => Actor::visitor(),
        Ok(Some(token)) => match state.jwt.validate(token, Utc::now()) {
            Ok(claims) => claims.into_actor(),
            Err(e) => {
                tracing::debug!(error = %e, "rejected bearer token");
                return json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid or expired credential");
            }
        },
        Err(msg) => return json_error(StatusCode::UNAUTHORIZED, "unauthorized", msg),
    };
    let client = client_info(req.headers());

    req.extensions_mut().insert(actor);
    req.extensions_mut().insert(client);
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    let Some(header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header
        .to_str()
        .map_err(|_| "authorization header is not valid ASCII")?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or("authorization header must use the Bearer scheme")?
        .trim();
    if token.is_empty() {
        return Err("bearer token is empty");
    }

    Ok(Some(token))
}

fn request_actor(req: &Request) -> Actor {
    req.extensions().get::<Actor>().cloned().unwrap_or_else(Actor::visitor)
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate limiting
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RateLimitState {
    limiter: RateLimiter,
    route_key: Arc<str>,
    policy: RateLimitPolicy,
}

/// Throttle every route of `router` under one `route_key` bucket per client.
///
/// Must sit inside [`actor_middleware`] so signed-in actors are limited by id.
pub fn with_rate_limit<S>(
    router: Router<S>,
    limiter: RateLimiter,
    route_key: &str,
    policy: RateLimitPolicy,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let state = RateLimitState {
        limiter,
        route_key: Arc::from(route_key),
        policy,
    };
    router.route_layer(from_fn_with_state(state, rate_limit_middleware))
}

pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let actor = request_actor(&req);
    let client = req.extensions().get::<ClientInfo>().cloned().unwrap_or_default();
    let key = RateLimitKey::new(&state.route_key, &client.rate_limit_identity(&actor));

    let now = Utc::now();
    let decision = match state.limiter.check_at(&key, state.policy, now).await {
        Ok(decision) => decision,
        Err(e) => return gate_error_to_response(e),
    };

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        gate_error_to_response(GateError::RateLimited {
            limit: decision.limit,
            reset_at: decision.reset_at,
            retry_after_secs: decision.retry_after_secs(now),
        })
    };
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(unix_secs(decision.reset_at)));
}

fn unix_secs(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Idempotency
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct IdempotencyState {
    guard: IdempotencyGuard,
    route_key: Arc<str>,
}

/// Make the routes of `router` replay-safe under the `Idempotency-Key` header.
///
/// Requests without the header pass through untouched. Only 2xx responses
/// are stored; any other outcome releases the key so the client can retry.
pub fn with_idempotency<S>(router: Router<S>, guard: IdempotencyGuard, route_key: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let state = IdempotencyState {
        guard,
        route_key: Arc::from(route_key),
    };
    router.route_layer(from_fn_with_state(state, idempotency_middleware))
}

pub async fn idempotency_middleware(
    State(state): State<IdempotencyState>,
    req: Request,
    next: Next,
) -> Response {
    let raw_key = match req.headers().get(IDEMPOTENCY_KEY_HEADER) {
        None => return next.run(req).await,
        Some(value) => match value.to_str() {
            Ok(v) => v.to_string(),
            Err(_) => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    "Idempotency-Key must be visible ASCII",
                )
            }
        },
    };

    let client = req.extensions().get::<ClientInfo>().cloned().unwrap_or_default();
    let scope = client.idempotency_scope(&request_actor(&req));
    let key = match IdempotencyKey::new(scope, state.route_key.to_string(), &raw_key) {
        Ok(key) => key,
        Err(e) => return gate_error_to_response(e),
    };

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_IDEMPOTENT_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return json_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "validation_error",
                "request body too large for an idempotent request",
            )
        }
    };
    let hash = request_hash(parts.method.as_str(), parts.uri.path(), &bytes);

    let token = match state.guard.begin(&key, &hash, Utc::now()).await {
        Err(e) => return gate_error_to_response(e),
        Ok(BeginOutcome::InFlight) => return gate_error_to_response(in_flight_error()),
        Ok(BeginOutcome::Completed(stored)) => {
            tracing::info!(key = %key, "replaying idempotent response");
            let mut response = stored_response(&stored);
            response
                .headers_mut()
                .insert(REPLAYED_HEADER, HeaderValue::from_static("true"));
            return response;
        }
        Ok(BeginOutcome::New(token)) => token,
    };

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
    if !response.status().is_success() {
        state.guard.release(&key, token).await;
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            state.guard.release(&key, token).await;
            tracing::error!(key = %key, error = %e, "failed to buffer response body");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "failed to read response");
        }
    };
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    state
        .guard
        .complete(
            &key,
            token,
            StoredResponse {
                status: parts.status.as_u16(),
                body,
            },
            Utc::now(),
        )
        .await;

    Response::from_parts(parts, Body::from(bytes))
}
