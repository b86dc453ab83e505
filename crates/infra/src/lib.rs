//! Infrastructure layer: stores, request-safety services, config, and the
//! Authorization Gate that composes them.

pub mod audit;
pub mod collaboration;
pub mod config;
pub mod error;
pub mod gate;
pub mod idempotency;
pub mod rate_limit;


pub use error::{ConflictKind, GateError};
pub use gate::{
    AuthorizationGate, ClientInfo, ExistencePolicy, GateRequest, GateResponse, Mutation,
};
