use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::JobStatus;

/// An HTTP request dispatched to a worker, and the response it eventually
/// writes back.
///
/// Invariant: once `status` reaches a terminal state, exactly one of
/// `response_status`/`response_body` or `error_message` is populated.
/// `update_time` is never allowed to move backwards relative to
/// `create_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpJob {
    pub request_id: Uuid,
    pub status: JobStatus,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,

    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, rename = "query")]
    pub query_params: HashMap<String, Vec<String>>,
    #[serde(default, rename = "form")]
    pub form_data: Option<HashMap<String, String>>,
    #[serde(default, rename = "json")]
    pub json_data: Option<serde_json::Value>,

    #[serde(default)]
    pub response_status: Option<u16>,
    #[serde(default)]
    pub response_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub response_body: Option<serde_json::Value>,
    #[serde(default, rename = "error")]
    pub error_message: Option<String>,

    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub worker_version: Option<String>,
}

impl HttpJob {
    /// Create a fresh, `pending` job for an inbound HTTP request.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            request_id: Uuid::new_v4(),
            status: JobStatus::Pending,
            create_time: now,
            update_time: now,
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            query_params: HashMap::new(),
            form_data: None,
            json_data: None,
            response_status: None,
            response_headers: None,
            response_body: None,
            error_message: None,
            worker_id: None,
            worker_version: None,
        }
    }

    /// Canonical `{METHOD}:{path}` route id for this job.
    pub fn route_id(&self) -> String {
        format!("{}:{}", self.method.to_uppercase(), self.path)
    }

    fn touch(&mut self) {
        let now = Utc::now();
        self.update_time = if now < self.create_time {
            self.create_time
        } else {
            now
        };
    }

    /// Transition `pending -> running`.
    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.touch();
    }

    /// Stamp the worker that picked up this job, so the gateway can surface
    /// `X-Worker-ID`/`X-Worker-Version` once the job resolves.
    pub fn assign_worker(&mut self, worker_id: impl Into<String>, version: impl Into<String>) {
        self.worker_id = Some(worker_id.into());
        self.worker_version = Some(version.into());
    }

    /// Transition to `completed`, filling in the response fields.
    pub fn mark_completed(
        &mut self,
        response_status: u16,
        response_headers: HashMap<String, String>,
        response_body: serde_json::Value,
    ) {
        self.status = JobStatus::Completed;
        self.response_status = Some(response_status);
        self.response_headers = Some(response_headers);
        self.response_body = Some(response_body);
        self.error_message = None;
        self.touch();
    }

    /// Transition to `failed`, recording the error message.
    pub fn mark_failed(&mut self, error_message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = Some(error_message.into());
        self.response_status = None;
        self.response_body = None;
        self.touch();
    }

    /// Transition `pending -> cancelled`.
    pub fn mark_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
        self.touch();
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut job = HttpJob::new("post", "/api/test/echo");
        job.headers.insert("content-type".into(), "application/json".into());
        job.query_params.insert("a".into(), vec!["1".into(), "2".into()]);
        job.json_data = Some(serde_json::json!({"msg": "hi"}));
        job.mark_running();
        job.mark_completed(
            200,
            HashMap::from([("content-type".into(), "application/json".into())]),
            serde_json::json!({"msg": "hi"}),
        );

        let bytes = job.to_json().unwrap();
        let decoded = HttpJob::from_json(&bytes).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn route_id_upper_cases_method() {
        let job = HttpJob::new("post", "/api/test/echo");
        assert_eq!(job.route_id(), "POST:/api/test/echo");
    }

    #[test]
    fn mark_failed_clears_response_fields() {
        let mut job = HttpJob::new("get", "/boom");
        job.mark_completed(200, HashMap::new(), serde_json::json!("ok"));
        job.mark_failed("bad");
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.response_status.is_none());
        assert!(job.response_body.is_none());
        assert_eq!(job.error_message.as_deref(), Some("bad"));
    }

    #[test]
    fn update_time_never_precedes_create_time() {
        let job = HttpJob::new("get", "/x");
        assert!(job.update_time >= job.create_time);
    }
}
