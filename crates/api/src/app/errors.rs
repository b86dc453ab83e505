//! Consistent JSON error responses.
//!
//! Every failure leaves the API as `{"error": <kind>, "message": <detail>}`;
//! business conflicts also carry a `"code"` sub-tag.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use showcase_infra::{ConflictKind, GateError};

/// Handler error: any [`GateError`], rendered with [`gate_error_to_response`].
#[derive(Debug)]
pub struct ApiError(pub GateError);

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError(GateError::Validation(e.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError(GateError::Validation(e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        gate_error_to_response(self.0)
    }
}

pub type ApiResult<T = Response> = Result<T, ApiError>;

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let message = message.into();
    (status, Json(json!({ "error": code, "message": message }))).into_response()
}

pub fn status_for(err: &GateError) -> StatusCode {
    match err {
        GateError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        GateError::Forbidden(_) => StatusCode::FORBIDDEN,
        GateError::NotFound(_) => StatusCode::NOT_FOUND,
        GateError::Conflict {
            kind: ConflictKind::IdempotencyKeyReused,
            ..
        } => StatusCode::UNPROCESSABLE_ENTITY,
        GateError::Conflict { .. } => StatusCode::CONFLICT,
        GateError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        GateError::Validation(_) => StatusCode::BAD_REQUEST,
        GateError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn gate_error_to_response(err: GateError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }

    let mut response = match &err {
        // Guard-level conflicts surface under their own kind.
        GateError::Conflict {
            kind: kind @ (ConflictKind::IdempotencyInFlight | ConflictKind::IdempotencyKeyReused),
            message,
        } => json_error(status, kind.as_str(), message.clone()),
        GateError::Conflict { kind, message } => (
            status,
            Json(json!({ "error": err.kind(), "code": kind.as_str(), "message": message })),
        )
            .into_response(),
        _ => json_error(status, err.kind(), err.message()),
    };

    let retry_after = match &err {
        GateError::RateLimited {
            retry_after_secs, ..
        } => Some(*retry_after_secs),
        GateError::Conflict { kind, .. } if kind.is_retryable() => Some(1),
        _ => None,
    };
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}
