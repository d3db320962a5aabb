//! Durable storage for [`HttpJob`] records, keyed by request id.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::StoreError;
use crate::model::HttpJob;
use crate::store::{StoreClient, StoreClientJsonExt};

fn job_key(request_id: Uuid) -> String {
    format!("http_job:{request_id}")
}

/// Thin wrapper over [`StoreClient`] for reading/writing job records.
pub struct JobRepository {
    store: Arc<dyn StoreClient>,
    ttl: Duration,
}

impl JobRepository {
    pub fn new(store: Arc<dyn StoreClient>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn save(&self, job: &HttpJob) -> Result<(), StoreError> {
        self.store
            .set_json(&job_key(job.request_id), job, Some(self.ttl))
            .await
    }

    pub async fn get(&self, request_id: Uuid) -> Result<Option<HttpJob>, StoreError> {
        self.store.get_json(&job_key(request_id)).await
    }

    pub async fn delete(&self, request_id: Uuid) -> Result<(), StoreError> {
        self.store.delete(&job_key(request_id)).await
    }
}
