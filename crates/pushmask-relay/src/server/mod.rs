//! HTTP boundary for the relay.

pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::dispatch::MessageDispatcher;
use crate::storage::RelayDatabase;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: RelayDatabase,
    pub dispatcher: Arc<MessageDispatcher>,
}

/// Build the relay's router over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(routes::ping))
        .route("/endpoint/upsert", post(routes::upsert_endpoints))
        .route("/endpoint/remove", delete(routes::remove_endpoints))
        .route("/m/{*params}", post(routes::relay_message))
        .route("/l/{id}", get(routes::fetch_large_message))
        .with_state(state)
}
