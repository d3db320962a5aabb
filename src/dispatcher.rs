//! Job dispatch: pick a worker for a job, hand it off over the worker's
//! queue, and block for the result over a per-request response list.
//!
//! Dispatch and result delivery rendezvous through the store's list
//! primitives — `RPUSH` onto a worker's queue to hand off, `BLPOP` on a
//! per-request response key to wait — the same cross-process synchronous
//! request/response pattern the teacher's channel layer used an in-process
//! `oneshot` channel for, just relayed through the shared store instead of
//! an in-memory map.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::DispatchError;
use crate::model::{HttpJob, NodeStatus};
use crate::registry::RouteRegistry;
use crate::repository::JobRepository;
use crate::strategy::{Candidate, RoutingContext, RoutingStrategy};
use crate::store::StoreClient;

pub(crate) fn job_sync_key(request_id: Uuid) -> String {
    format!("callme_gate#job_sync:{request_id}")
}

/// Dispatches jobs to workers and waits for their results.
pub struct JobDispatcher {
    store: Arc<dyn StoreClient>,
    registry: Arc<RouteRegistry>,
    repository: Arc<JobRepository>,
    strategy: Arc<dyn RoutingStrategy>,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<dyn StoreClient>,
        registry: Arc<RouteRegistry>,
        repository: Arc<JobRepository>,
        strategy: Arc<dyn RoutingStrategy>,
    ) -> Self {
        Self {
            store,
            registry,
            repository,
            strategy,
        }
    }

    async fn online_candidates(&self, route_id: &str) -> Result<Vec<Candidate>, DispatchError> {
        let route = self
            .registry
            .get_route(route_id)
            .await?
            .ok_or_else(|| DispatchError::NoRoute {
                route_id: route_id.to_string(),
            })?;

        let mut candidates = Vec::new();
        for worker in route.worker_nodes.values() {
            let Some(node) = self.registry.get_node(&worker.worker_id).await? else {
                continue;
            };
            if node.status != NodeStatus::Online {
                continue;
            }
            candidates.push(Candidate {
                worker_id: worker.worker_id.clone(),
                queue: worker.queue.clone(),
                version: worker.version.clone(),
                metrics: node.metrics,
            });
        }
        Ok(candidates)
    }

    /// Dispatch `job` to a worker and block until it resolves or `timeout`
    /// elapses. Mutates `job` in place with whatever the worker wrote back
    /// (or a timeout failure) and returns it.
    ///
    /// `context` carries per-request routing hints (currently an
    /// `X-API-Version` pin) that override whatever the configured strategy
    /// would otherwise do; when it names a version, candidates running any
    /// other version are excluded up front rather than left for the
    /// strategy to maybe ignore.
    pub async fn dispatch_job(
        &self,
        mut job: HttpJob,
        timeout: Duration,
        context: RoutingContext,
    ) -> Result<HttpJob, DispatchError> {
        let route_id = job.route_id();
        let mut candidates = self.online_candidates(&route_id).await?;
        if candidates.is_empty() {
            return Err(DispatchError::NoWorkers { route_id });
        }

        if let Some(version) = context.version.as_deref() {
            candidates.retain(|c| c.version == version);
            if candidates.is_empty() {
                return Err(DispatchError::NoWorkers { route_id });
            }
        }

        let picked = self.strategy.select(&route_id, &candidates, &context)?;

        job.mark_running();
        self.repository.save(&job).await?;
        self.store
            .list_right_push(&picked.queue, job.request_id.to_string().as_bytes())
            .await?;

        match self.wait_for_result(job.request_id, timeout).await? {
            Some(resolved) => Ok(resolved),
            None => {
                job.mark_failed("timed out waiting for worker response");
                self.repository.save(&job).await?;
                Err(DispatchError::Timeout {
                    request_id: job.request_id,
                })
            }
        }
    }

    /// Block on the per-request rendezvous list until the worker pushes the
    /// resolved job or `timeout` elapses. The popped payload is the worker's
    /// own serialized `HttpJob`, decoded directly rather than re-read from
    /// the repository, so the caller sees exactly what the worker wrote.
    async fn wait_for_result(
        &self,
        request_id: Uuid,
        timeout: Duration,
    ) -> Result<Option<HttpJob>, DispatchError> {
        let popped = self
            .store
            .list_blocking_left_pop(&job_sync_key(request_id), timeout)
            .await?;
        let Some(bytes) = popped else {
            return Ok(None);
        };
        let job = HttpJob::from_json(&bytes).map_err(|err| DispatchError::Decode {
            request_id,
            reason: err.to_string(),
        })?;
        Ok(Some(job))
    }

    /// Called by the worker runtime after it finishes executing a job:
    /// persists the resolved job and wakes up the waiting dispatcher with
    /// the full job payload.
    pub async fn publish_result(&self, job: &HttpJob, ttl: Duration) -> Result<(), DispatchError> {
        self.repository.save(job).await?;
        let key = job_sync_key(job.request_id);
        let payload = job.to_json().map_err(|err| DispatchError::Decode {
            request_id: job.request_id,
            reason: err.to_string(),
        })?;
        self.store.list_right_push(&key, &payload).await?;
        self.store.expire(&key, ttl).await?;
        Ok(())
    }

    pub fn generate_request_id() -> Uuid {
        Uuid::new_v4()
    }
}
