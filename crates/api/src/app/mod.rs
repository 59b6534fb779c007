//! HTTP API application wiring (axum router + service wiring).
//!
//! - `services.rs`: backend selection (store, log queue) and service handles
//! - `routes/`: HTTP handlers, split into public and gated routers
//! - `dto.rs`: request/response DTOs and their conversion to domain input
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    let gate = middleware::GateState {
        auth: Arc::clone(&services.auth),
    };

    let protected = routes::protected_router().layer(axum::middleware::from_fn_with_state(
        gate,
        middleware::require_identity,
    ));

    Router::new()
        .merge(routes::public_router())
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(Arc::new(services))),
        )
}
