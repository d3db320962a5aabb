use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::dispatcher::JobDispatcher;
use crate::registry::RouteRegistry;
use crate::repository::JobRepository;

/// Shared state threaded through every axum handler.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<RouteRegistry>,
    pub dispatcher: Arc<JobDispatcher>,
    pub repository: Arc<JobRepository>,
    pub config: Arc<GatewayConfig>,
}
