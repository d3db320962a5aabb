use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::dispatcher::job_sync_key;
use crate::error::WorkerError;
use crate::model::NodeStatus;
use crate::registry::RouteRegistry;
use crate::repository::JobRepository;
use crate::store::StoreClient;

use super::handler::JobHandler;

const POLL_TIMEOUT: Duration = Duration::from_secs(1);
const RESPONSE_TTL: Duration = Duration::from_secs(60);

/// Runs a worker's main loop: dequeue a job id, run its handler, publish
/// the result, repeat. Mirrors the teacher's channel message loop
/// (dequeue -> handler lookup -> execute -> respond) with the in-process
/// channel swapped for the shared store's list primitives.
///
/// A single bad job never brings the worker down: handler failures and
/// panics resolve the job as failed, and any store error encountered while
/// processing one iteration is logged and the loop moves on to the next
/// job rather than propagating out of `run`.
pub struct WorkerRuntime {
    worker_id: String,
    version: String,
    queue: String,
    store: Arc<dyn StoreClient>,
    registry: Arc<RouteRegistry>,
    repository: Arc<JobRepository>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    heartbeat_interval: Duration,
}

impl WorkerRuntime {
    pub(super) fn new(
        worker_id: String,
        version: String,
        queue: String,
        store: Arc<dyn StoreClient>,
        registry: Arc<RouteRegistry>,
        repository: Arc<JobRepository>,
        handlers: HashMap<String, Arc<dyn JobHandler>>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            worker_id,
            version,
            queue,
            store,
            registry,
            repository,
            handlers,
            heartbeat_interval,
        }
    }

    /// Run until `shutdown` fires. Returns once the in-flight job (if any)
    /// finishes and the loop observes the shutdown signal.
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) -> Result<(), WorkerError> {
        self.registry
            .update_node_status(&self.worker_id, NodeStatus::Online)
            .await?;

        let heartbeat_handle = self.spawn_heartbeat();

        loop {
            if shutdown.try_recv().is_ok() {
                break;
            }
            tokio::select! {
                _ = &mut shutdown => break,
                popped = self.store.list_blocking_left_pop(&self.queue, POLL_TIMEOUT) => {
                    match popped {
                        Ok(Some(bytes)) => {
                            if let Err(err) = self.process_one(&bytes).await {
                                tracing::error!("job on queue {} failed to process: {err}", self.queue);
                            }
                        }
                        Ok(None) => continue,
                        Err(err) => {
                            tracing::warn!("poll of queue {} failed: {err}", self.queue);
                            continue;
                        }
                    }
                }
            }
        }

        heartbeat_handle.abort();
        self.registry
            .update_node_status(&self.worker_id, NodeStatus::Offline)
            .await?;
        Ok(())
    }

    fn spawn_heartbeat(&self) -> tokio::task::JoinHandle<()> {
        let registry = self.registry.clone();
        let worker_id = self.worker_id.clone();
        let interval = self.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = registry.node_heartbeat(&worker_id).await {
                    tracing::warn!("heartbeat failed for {worker_id}: {err}");
                }
            }
        })
    }

    async fn process_one(&self, request_id_bytes: &[u8]) -> Result<(), WorkerError> {
        let request_id_str = String::from_utf8_lossy(request_id_bytes);
        let Ok(request_id) = request_id_str.parse::<Uuid>() else {
            tracing::warn!("received malformed request id on queue {}: {request_id_str}", self.queue);
            return Ok(());
        };

        let Some(mut job) = self.repository.get(request_id).await? else {
            tracing::warn!("no job record for request {request_id}, dropping");
            return Ok(());
        };

        job.assign_worker(&self.worker_id, &self.version);

        let route_id = job.route_id();
        let Some(handler) = self.handlers.get(&route_id).cloned() else {
            tracing::warn!("no handler registered for {route_id}, failing job {request_id}");
            job.mark_failed("no handler");
            return self.publish(job).await;
        };

        let job_snapshot = job.clone();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| (handler.as_ref())(&job_snapshot)));

        match result {
            Ok(Ok(response)) => {
                job.mark_completed(response.status, response.headers, response.body);
                self.registry.node_heartbeat(&self.worker_id).await.ok();
                if let Some(mut node) = self.registry.get_node(&self.worker_id).await? {
                    let elapsed_ms = (chrono::Utc::now() - job.create_time).num_milliseconds() as f64;
                    node.metrics.record_dispatched();
                    node.metrics.record_completed(elapsed_ms);
                    self.save_node_metrics(node).await?;
                }
            }
            Ok(Err(handler_err)) => {
                job.mark_failed(handler_err.0);
                if let Some(mut node) = self.registry.get_node(&self.worker_id).await? {
                    node.metrics.record_dispatched();
                    node.metrics.record_failed();
                    self.save_node_metrics(node).await?;
                }
            }
            Err(_) => {
                job.mark_failed(format!("handler for {route_id} panicked"));
                if let Some(mut node) = self.registry.get_node(&self.worker_id).await? {
                    node.metrics.record_dispatched();
                    node.metrics.record_failed();
                    self.save_node_metrics(node).await?;
                }
            }
        }

        self.publish(job).await
    }

    /// Persist the resolved job and wake up the gateway waiting on its
    /// rendezvous list, with the full job payload rather than a sentinel.
    async fn publish(&self, job: crate::model::HttpJob) -> Result<(), WorkerError> {
        self.repository.save(&job).await?;
        let key = job_sync_key(job.request_id);
        let payload = job.to_json().unwrap_or_else(|_| b"{}".to_vec());
        self.store.list_right_push(&key, &payload).await?;
        self.store.expire(&key, RESPONSE_TTL).await?;
        Ok(())
    }

    async fn save_node_metrics(&self, node: crate::model::Node) -> Result<(), WorkerError> {
        self.registry.save_node(&node).await?;
        Ok(())
    }
}
