use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::WorkerError;
use crate::model::Node;
use crate::registry::RouteRegistry;
use crate::repository::JobRepository;
use crate::store::StoreClient;

use super::handler::JobHandler;
use super::runtime::WorkerRuntime;

/// Registers the routes a worker serves and the handler for each, then
/// produces a runnable [`WorkerRuntime`].
pub struct WorkerBuilder {
    worker_id: String,
    version: String,
    queue: String,
    heartbeat_interval: Duration,
    registry: Arc<RouteRegistry>,
    repository: Arc<JobRepository>,
    store: Arc<dyn StoreClient>,
    handlers: HashMap<String, (String, String, u64, Arc<dyn JobHandler>)>,
}

impl WorkerBuilder {
    pub fn new(
        worker_id: impl Into<String>,
        version: impl Into<String>,
        store: Arc<dyn StoreClient>,
        registry: Arc<RouteRegistry>,
        repository: Arc<JobRepository>,
        heartbeat_interval: Duration,
    ) -> Self {
        let worker_id = worker_id.into();
        Self {
            queue: format!("queue:{worker_id}"),
            worker_id,
            version: version.into(),
            heartbeat_interval,
            registry,
            repository,
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `method path`, with the per-job timeout the
    /// gateway should enforce for this route.
    pub fn add_handler(
        mut self,
        method: impl Into<String>,
        path: impl Into<String>,
        timeout_secs: u64,
        handler: impl JobHandler + 'static,
    ) -> Self {
        let method = method.into();
        let path = path.into();
        let route_id = crate::model::canonical_route_id(&method, &path);
        self.handlers
            .insert(route_id, (method, path, timeout_secs, Arc::new(handler)));
        self
    }

    /// Register every route with the shared registry, create this
    /// worker's `Node` record, and return a runtime ready to serve jobs.
    pub async fn build(self) -> Result<WorkerRuntime, WorkerError> {
        let mut handlers = HashMap::new();
        let mut route_ids = Vec::new();

        for (route_id, (method, path, timeout, handler)) in self.handlers {
            self.registry.register_route(&path, &method, timeout).await?;
            handlers.insert(route_id.clone(), handler);
            route_ids.push(route_id);
        }

        let mut node = Node::new(self.worker_id.clone(), self.version.clone(), self.queue.clone());
        node.routes = route_ids.iter().cloned().collect();
        self.registry.register_node(node, &route_ids).await?;

        Ok(WorkerRuntime::new(
            self.worker_id,
            self.version,
            self.queue,
            self.store,
            self.registry,
            self.repository,
            handlers,
            self.heartbeat_interval,
        ))
    }
}
