//! Download dispatch API handler.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;

use scout_core::{GrabReceipt, Release};

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GrabBody {
    pub release: Release,
    /// Client name; defaults to the first client handling the protocol.
    #[serde(default)]
    pub client: Option<String>,
}

/// POST /api/v1/grab
pub async fn grab(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GrabBody>,
) -> Result<Json<GrabReceipt>, ApiError> {
    let receipt = state
        .dispatcher()
        .grab(&body.release, body.client.as_deref())
        .await?;
    Ok(Json(receipt))
}
