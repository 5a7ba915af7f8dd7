//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::live_reload;
use crate::state::AppState;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/events", get(live_reload::events))
        .route("/livereload.js", get(live_reload::livereload_js))
        .fallback(handlers::route::dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
