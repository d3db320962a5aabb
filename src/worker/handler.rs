use std::collections::HashMap;

use crate::model::HttpJob;

/// What a handler hands back for the gateway to relay as the HTTP response.
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
}

impl HandlerResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status,
            headers,
            body,
        }
    }
}

/// A unit of work error a handler raises deliberately, as opposed to a
/// panic (which the runtime also catches and turns into a failure).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type HandlerResult = Result<HandlerResponse, HandlerError>;

/// A job handler registered for one `(method, path)` route.
///
/// Implemented as a plain `Fn` bound rather than a trait object per worker
/// so callers can register closures directly, the way the teacher's
/// channel layer registers plain async closures for message handling.
pub trait JobHandler: Fn(&HttpJob) -> HandlerResult + Send + Sync {}

impl<T> JobHandler for T where T: Fn(&HttpJob) -> HandlerResult + Send + Sync {}
