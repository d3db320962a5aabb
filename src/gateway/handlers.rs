//! axum handlers: the HTTP ingress that turns requests into jobs, and the
//! admin surface for inspecting routes, nodes, and in-flight jobs.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::error::{DispatchError, GatewayError};
use crate::model::{HttpJob, JobStatus, NodeStatus};
use crate::strategy::RoutingContext;

use super::state::GatewayState;

const API_VERSION_HEADER: &str = "x-api-version";

/// Percent-decodes `%XX` sequences and turns `+` into a space, the two
/// transformations `application/x-www-form-urlencoded` query strings need.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(&input[i + 1..i + 3], 16) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_query(raw: &str) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(percent_decode(key))
            .or_default()
            .push(percent_decode(value));
    }
    params
}

fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn content_type_is_json(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

fn content_type_is_form(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Build an [`HttpJob`] from the raw parts of an inbound request.
fn build_job(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> HttpJob {
    let mut job = HttpJob::new(method.as_str(), uri.path());
    job.headers = headers_to_map(headers);
    if let Some(query) = uri.query() {
        job.query_params = parse_query(query);
    }
    if content_type_is_json(headers) {
        job.json_data = serde_json::from_slice(body).ok();
    } else if content_type_is_form(headers) {
        let text = String::from_utf8_lossy(body);
        job.form_data = Some(
            parse_query(&text)
                .into_iter()
                .map(|(k, mut v)| (k, v.pop().unwrap_or_default()))
                .collect(),
        );
    }
    job
}

/// Turn a resolved job into the HTTP response its caller actually sees.
/// Failed jobs render as 500 with the handler's error message rather than
/// a 200 wrapping a null body; a completed job with no body (e.g. a
/// handler that only returned a status code) falls back to a small ack
/// object instead of literal `null`.
fn job_into_response(job: &HttpJob) -> Response {
    let mut response = if job.status == JobStatus::Failed {
        let body = serde_json::json!({
            "error_message": job.error_message.clone().unwrap_or_else(|| "job failed".to_string()),
            "request_id": job.request_id,
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    } else {
        let status = job
            .response_status
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK);
        let body = match job.response_body.clone() {
            Some(serde_json::Value::Null) | None => serde_json::json!({
                "message": "ok",
                "request_id": job.request_id,
            }),
            Some(body) => body,
        };
        (status, Json(body)).into_response()
    };

    let headers = response.headers_mut();
    if let Ok(value) = job.request_id.to_string().parse() {
        headers.insert("x-request-id", value);
    }
    if let Some(worker_id) = &job.worker_id {
        if let Ok(value) = worker_id.parse() {
            headers.insert("x-worker-id", value);
        }
    }
    if let Some(worker_version) = &job.worker_version {
        if let Ok(value) = worker_version.parse() {
            headers.insert("x-worker-version", value);
        }
    }
    response
}

/// Catch-all ingress: dispatch the request to a worker and relay its
/// response, or a gateway error if dispatch failed.
pub async fn ingress(
    State(state): State<GatewayState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let uri_with_query = if let Some(query) = &raw_query {
        format!("{}?{}", uri.path(), query).parse::<Uri>().unwrap_or(uri.clone())
    } else {
        uri.clone()
    };
    let job = build_job(&method, &uri_with_query, &headers, &body);
    let request_id = job.request_id;
    let route = state
        .registry
        .get_route(&job.route_id())
        .await?
        .ok_or_else(|| GatewayError::not_found(format!("no route for {} {}", method, uri.path())))?;
    let timeout = state.config.default_timeout();
    let timeout = if route.timeout > 0 {
        std::time::Duration::from_secs(route.timeout)
    } else {
        timeout
    };

    let context = headers
        .get(API_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(RoutingContext::with_version)
        .unwrap_or_else(RoutingContext::none);

    let resolved = state.dispatcher.dispatch_job(job, timeout, context).await;
    match resolved {
        Ok(resolved_job) => Ok(job_into_response(&resolved_job)),
        Err(DispatchError::Timeout { .. }) => {
            Err(GatewayError::timeout(format!("request {request_id} timed out")).with_request_id(request_id.to_string()))
        }
        Err(DispatchError::NoWorkers { route_id }) => {
            Err(GatewayError::not_found(format!("no online workers for {route_id}")))
        }
        Err(other) => Err(other.into()),
    }
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn list_routes(State(state): State<GatewayState>) -> Result<impl IntoResponse, GatewayError> {
    let routes = state.registry.get_all_routes().await?;
    Ok(Json(routes))
}

pub async fn get_job(
    State(state): State<GatewayState>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let job = state
        .repository
        .get(request_id)
        .await?
        .ok_or_else(|| GatewayError::not_found(format!("no job {request_id}")))?;
    Ok(Json(job))
}

pub async fn delete_job(
    State(state): State<GatewayState>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    state.repository.delete(request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_nodes(State(state): State<GatewayState>) -> Result<impl IntoResponse, GatewayError> {
    let nodes = state.registry.get_all_nodes().await?;
    Ok(Json(nodes))
}

pub async fn get_node(
    State(state): State<GatewayState>,
    Path(worker_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let node = state
        .registry
        .get_node(&worker_id)
        .await?
        .ok_or_else(|| GatewayError::not_found(format!("no node {worker_id}")))?;
    Ok(Json(node))
}

#[derive(Debug, serde::Deserialize)]
pub struct UpdateStatusRequest {
    pub status: NodeStatus,
}

pub async fn update_node_status(
    State(state): State<GatewayState>,
    Path(worker_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .registry
        .update_node_status(&worker_id, request.status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn node_heartbeat(
    State(state): State<GatewayState>,
    Path(worker_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    state.registry.node_heartbeat(&worker_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
