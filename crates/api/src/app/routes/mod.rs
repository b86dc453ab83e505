use axum::Router;

use crate::middleware::{with_idempotency, with_rate_limit};

use super::services::AppServices;

pub mod audit;
pub mod collaborations;
pub mod rbac;
pub mod system;

pub fn router(services: &AppServices) -> Router {
    let limiter = services.gate.rate_limiter().clone();
    let guard = services.gate.idempotency().clone();
    let limits = services.rate_limits;

    let mutations = collaborations::mutation_router(guard);
    let reads = Router::new()
        .merge(collaborations::read_router())
        .merge(audit::router())
        .merge(rbac::router())
        .merge(system::router());

    Router::new()
        .merge(with_rate_limit(
            mutations,
            limiter.clone(),
            "collaboration",
            limits.collaboration,
        ))
        .merge(with_rate_limit(reads, limiter, "api", limits.api))
}
