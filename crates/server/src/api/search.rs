//! Search and selection API handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;

use scout_core::{Release, SearchOutcome, SearchRequest, SelectionPolicy};

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub request: SearchRequest,
    #[serde(default)]
    pub policy: SelectionPolicy,
}

#[derive(Debug, Deserialize)]
pub struct SelectBestBody {
    pub releases: Vec<Release>,
    #[serde(default)]
    pub policy: SelectionPolicy,
}

/// POST /api/v1/search
///
/// Fan out to the enabled indexers and return every release plus the
/// selection. Indexer failures are reported per indexer, not as errors.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchOutcome>, ApiError> {
    let cancel = state.shutdown_token().child_token();
    let outcome = state
        .engine()
        .search_with_cancel(&body.request, &body.policy, &cancel)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/search/best
///
/// Re-run selection over releases from an earlier search.
pub async fn select_best(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectBestBody>,
) -> Result<Json<Release>, ApiError> {
    let best = state.engine().select_best(&body.releases, &body.policy)?;
    Ok(Json(best))
}
