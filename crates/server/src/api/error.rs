//! Mapping of library errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use scout_core::indexer::RegistryError;
use scout_core::{DispatchError, EngineError, SelectError};

/// Status code nginx uses for a request the client gave up on.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by handlers: a status plus `{ "error": "..." }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            RegistryError::Invalid(_) => Self::bad_request(e.to_string()),
            RegistryError::Database(_) | RegistryError::Serialization(_) => {
                error!(error = %e, "Indexer registry failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::InvalidRequest(_) => Self::bad_request(e.to_string()),
            EngineError::Cancelled => Self::new(
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
                e.to_string(),
            ),
            EngineError::Registry(inner) => inner.into(),
        }
    }
}

impl From<SelectError> for ApiError {
    fn from(e: SelectError) -> Self {
        match e {
            SelectError::NoCandidates => Self::new(StatusCode::NOT_FOUND, "no_candidates"),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::ClientNotFound(_)
            | DispatchError::NoClientForProtocol(_)
            | DispatchError::ProtocolMismatch { .. } => Self::bad_request(e.to_string()),
            DispatchError::Registry(RegistryError::NotFound(_)) => Self::bad_request(e.to_string()),
            DispatchError::Registry(inner) => inner.into(),
            DispatchError::Client { .. } => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}
