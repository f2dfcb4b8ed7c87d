//! Indexer registry API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use scout_core::indexer::IndexerSummary;
use scout_core::searcher::RateLimitStatus;

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IndexerView {
    #[serde(flatten)]
    pub summary: IndexerSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitStatus>,
}

#[derive(Debug, Serialize)]
pub struct IndexersResponse {
    pub indexers: Vec<IndexerView>,
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetPriorityRequest {
    pub priority: i32,
}

/// GET /api/v1/indexers
///
/// All registered indexers in priority order, secrets omitted.
pub async fn list_indexers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IndexersResponse>, ApiError> {
    let descriptors = state.store().list()?;
    let limits = state.engine().rate_limits();

    let mut indexers = Vec::with_capacity(descriptors.len());
    for d in &descriptors {
        indexers.push(IndexerView {
            summary: IndexerSummary::from(d),
            rate_limit: limits.status(&d.id).await,
        });
    }
    Ok(Json(IndexersResponse { indexers }))
}

/// POST /api/v1/indexers/{id}/enabled
pub async fn set_enabled(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SetEnabledRequest>,
) -> Result<Json<IndexerSummary>, ApiError> {
    let store = state.store();
    store.set_enabled(&id, body.enabled)?;
    info!(indexer = %id, enabled = body.enabled, "Indexer toggled");
    Ok(Json(IndexerSummary::from(&store.get(&id)?)))
}

/// POST /api/v1/indexers/{id}/priority
pub async fn set_priority(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SetPriorityRequest>,
) -> Result<Json<IndexerSummary>, ApiError> {
    let store = state.store();
    store.set_priority(&id, body.priority)?;
    info!(indexer = %id, priority = body.priority, "Indexer priority changed");
    Ok(Json(IndexerSummary::from(&store.get(&id)?)))
}
