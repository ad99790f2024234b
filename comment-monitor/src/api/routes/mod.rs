//! API route modules.

pub mod comments;
pub mod health;
pub mod monitor;
pub mod ws;

use axum::Router;

use crate::api::server::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", monitor::router().merge(comments::router()))
        .nest("/health", health::router())
        .merge(ws::router())
        .with_state(state)
}
