//! End-to-end dispatch test: register a route/node, simulate a worker
//! picking up the job and resolving it, and confirm the dispatcher's
//! blocking wait returns the resolved job.

#![cfg(feature = "integration")]

use std::sync::Arc;
use std::time::Duration;

use callme_gate::config::StoreConfig;
use callme_gate::dispatcher::JobDispatcher;
use callme_gate::model::{HttpJob, Node};
use callme_gate::registry::RouteRegistry;
use callme_gate::repository::JobRepository;
use callme_gate::store::{RedisStore, StoreClient};
use callme_gate::strategy::{RandomStrategy, RoutingContext};
use secrecy::SecretString;
use testcontainers_modules::redis::Redis;
use testcontainers_modules::testcontainers::runners::AsyncRunner;

#[tokio::test]
async fn dispatch_job_round_trips_through_a_simulated_worker() {
    let container = Redis::default().start().await.expect("start redis container");
    let port = container.get_host_port_ipv4(6379).await.expect("mapped port");
    let config = StoreConfig {
        host: "127.0.0.1".to_string(),
        port,
        db: 0,
        password: SecretString::from(String::new()),
        use_ssl: false,
    };
    let store: Arc<dyn StoreClient> = Arc::new(RedisStore::connect(&config).await.expect("connect"));
    let registry = Arc::new(RouteRegistry::new(store.clone()));
    let repository = Arc::new(JobRepository::new(store.clone(), Duration::from_secs(30)));
    let dispatcher = Arc::new(JobDispatcher::new(
        store.clone(),
        registry.clone(),
        repository.clone(),
        Arc::new(RandomStrategy::new()),
    ));

    let route_id = registry.register_route("/api/test/echo", "POST", 5).await.unwrap();
    let node = Node::new("worker-1", "v1", "queue:worker-1");
    registry.register_node(node, &[route_id]).await.unwrap();

    // Simulate a worker: pop the job id off its queue, mark it completed,
    // and push the resolved job onto the rendezvous list.
    let worker_store = store.clone();
    let worker_repo = repository.clone();
    let worker_task = tokio::spawn(async move {
        let popped = worker_store
            .list_blocking_left_pop("queue:worker-1", Duration::from_secs(5))
            .await
            .unwrap()
            .expect("job id on queue");
        let request_id: uuid::Uuid = String::from_utf8(popped).unwrap().parse().unwrap();
        let mut job = worker_repo.get(request_id).await.unwrap().unwrap();
        job.mark_completed(200, Default::default(), serde_json::json!({"echo": true}));
        job.assign_worker("worker-1", "v1");
        worker_repo.save(&job).await.unwrap();
        worker_store
            .list_right_push(&format!("callme_gate#job_sync:{request_id}"), &job.to_json().unwrap())
            .await
            .unwrap();
    });

    let job = HttpJob::new("POST", "/api/test/echo");
    let resolved = dispatcher
        .dispatch_job(job, Duration::from_secs(5), RoutingContext::none())
        .await
        .expect("dispatch should resolve");

    worker_task.await.unwrap();

    assert_eq!(resolved.response_status, Some(200));
    assert_eq!(resolved.response_body, Some(serde_json::json!({"echo": true})));
}

#[tokio::test]
async fn dispatch_job_times_out_when_no_worker_responds() {
    let container = Redis::default().start().await.expect("start redis container");
    let port = container.get_host_port_ipv4(6379).await.expect("mapped port");
    let config = StoreConfig {
        host: "127.0.0.1".to_string(),
        port,
        db: 0,
        password: SecretString::from(String::new()),
        use_ssl: false,
    };
    let store: Arc<dyn StoreClient> = Arc::new(RedisStore::connect(&config).await.expect("connect"));
    let registry = Arc::new(RouteRegistry::new(store.clone()));
    let repository = Arc::new(JobRepository::new(store.clone(), Duration::from_secs(30)));
    let dispatcher = Arc::new(JobDispatcher::new(
        store.clone(),
        registry.clone(),
        repository.clone(),
        Arc::new(RandomStrategy::new()),
    ));

    let route_id = registry.register_route("/api/test/echo", "POST", 5).await.unwrap();
    let node = Node::new("worker-1", "v1", "queue:worker-1");
    registry.register_node(node, &[route_id]).await.unwrap();

    let job = HttpJob::new("POST", "/api/test/echo");
    let err = dispatcher
        .dispatch_job(job, Duration::from_millis(200), RoutingContext::none())
        .await
        .expect_err("no worker ever responds");

    assert!(matches!(err, callme_gate::error::DispatchError::Timeout { .. }));
}
