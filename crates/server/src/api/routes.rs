use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use finpipe_core::ToolRunner;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{events, handlers, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router<R: ToolRunner + 'static>(state: Arc<AppState<R>>) -> Router {
    let max_event_bytes = state.config().server.max_event_bytes;

    Router::new()
        // Storage notifications
        .route("/", post(events::receive_event::<R>))
        // Health, metrics and config
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/config", get(handlers::get_config::<R>))
        .layer(DefaultBodyLimit::max(max_event_bytes))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
