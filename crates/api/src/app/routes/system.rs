use axum::{response::IntoResponse, routing::get, Extension, Json, Router};
use serde_json::json;

use showcase_auth::Actor;

use crate::app::dto::WhoAmIResponse;

pub fn router() -> Router {
    Router::new().route("/whoami", get(whoami))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn whoami(Extension(actor): Extension<Actor>) -> impl IntoResponse {
    Json(WhoAmIResponse::from_actor(&actor))
}
