//! Router assembly and the reaping background task.
//!
//! Grounded on the teacher's `OrchestratorApi::router()`: build a `Router`
//! over shared state, merge in an admin surface, then serve it.

use axum::routing::{get, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::GatewayState;

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/routes", get(handlers::list_routes))
        .route("/jobs/{request_id}", get(handlers::get_job).delete(handlers::delete_job))
        .route("/nodes", get(handlers::list_nodes))
        .route("/nodes/{worker_id}", get(handlers::get_node))
        .route("/nodes/{worker_id}/status", put(handlers::update_node_status))
        .route("/nodes/{worker_id}/heartbeat", axum::routing::post(handlers::node_heartbeat))
        .fallback(handlers::ingress)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Periodically reap nodes whose heartbeat has gone stale.
pub async fn run_reaper(state: GatewayState) {
    let mut ticker = tokio::time::interval(state.config.reap_interval());
    loop {
        ticker.tick().await;
        let max_age = chrono::Duration::from_std(state.config.max_heartbeat_age()).unwrap_or(chrono::Duration::seconds(60));
        match state.registry.clean_inactive_nodes(max_age).await {
            Ok(reaped) if !reaped.is_empty() => {
                tracing::info!("reaped {} inactive node(s): {:?}", reaped.len(), reaped);
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("node reap pass failed: {err}"),
        }
    }
}
