//! Error types for the gateway/worker fabric.
//!
//! Each concern gets its own `thiserror` enum, matching the granularity the
//! rest of the store-backed components use; `anyhow` is reserved for the
//! CLI/bootstrap boundary in `src/bin/*.rs`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Errors from the shared store adapter.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("failed to build connection pool: {0}")]
    Pool(String),

    #[error("value at {key} was not valid JSON: {reason}")]
    Decode { key: String, reason: String },
}

/// Errors from the distributed mutex.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("lock {name} is held by another owner")]
    NotOwner { name: String },
}

/// Errors surfaced by route registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),
}

/// Errors surfaced while selecting or resolving a routing strategy.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("unknown routing strategy: {0}")]
    Unknown(String),

    #[error("no candidate worker matches pinned version {version}")]
    NoMatchingVersion { version: String },
}

/// Errors surfaced by the job dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("routing strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("no route registered for {route_id}")]
    NoRoute { route_id: String },

    #[error("no online workers for {route_id}")]
    NoWorkers { route_id: String },

    #[error("request {request_id} timed out waiting for a worker response")]
    Timeout { request_id: uuid::Uuid },

    #[error("job sync payload for {request_id} was not valid JSON: {reason}")]
    Decode { request_id: uuid::Uuid, reason: String },
}

/// Errors surfaced by the worker runtime.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Body shape for any error rendered back to an HTTP caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayErrorBody {
    pub error: String,
    pub request_id: Option<String>,
}

/// Top-level error type for the gateway's axum handlers.
///
/// Carries the status code that should be rendered alongside the message,
/// the same way the teacher's auth middleware returns a bare `StatusCode`
/// but generalized to also carry a human-readable reason.
#[derive(Debug)]
pub struct GatewayError {
    pub status: StatusCode,
    pub message: String,
    pub request_id: Option<String>,
}

impl GatewayError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = GatewayErrorBody {
            error: self.message,
            request_id: self.request_id,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DispatchError> for GatewayError {
    fn from(value: DispatchError) -> Self {
        tracing::error!("dispatch error: {value}");
        GatewayError::internal(value.to_string())
    }
}

impl From<RegistryError> for GatewayError {
    fn from(value: RegistryError) -> Self {
        tracing::error!("registry error: {value}");
        GatewayError::internal(value.to_string())
    }
}

impl From<StoreError> for GatewayError {
    fn from(value: StoreError) -> Self {
        tracing::error!("store error: {value}");
        GatewayError::internal(value.to_string())
    }
}
