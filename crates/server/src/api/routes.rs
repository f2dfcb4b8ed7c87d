use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{grab, handlers, indexers, middleware::metrics_middleware, search};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Indexer registry
        .route("/indexers", get(indexers::list_indexers))
        .route("/indexers/{id}/enabled", post(indexers::set_enabled))
        .route("/indexers/{id}/priority", post(indexers::set_priority))
        // Search and selection
        .route("/search", post(search::search))
        .route("/search/best", post(search::select_best))
        // Dispatch
        .route("/grab", post(grab::grab));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
