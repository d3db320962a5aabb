//! Integration tests against a real Redis, run with `--features integration`.

#![cfg(feature = "integration")]

use std::sync::Arc;
use std::time::Duration;

use callme_gate::config::StoreConfig;
use callme_gate::model::{Node, NodeStatus};
use callme_gate::registry::RouteRegistry;
use callme_gate::store::RedisStore;
use secrecy::SecretString;
use testcontainers_modules::redis::Redis;
use testcontainers_modules::testcontainers::runners::AsyncRunner;

async fn registry() -> (RouteRegistry, testcontainers_modules::testcontainers::ContainerAsync<Redis>) {
    let container = Redis::default().start().await.expect("start redis container");
    let port = container.get_host_port_ipv4(6379).await.expect("mapped port");
    let config = StoreConfig {
        host: "127.0.0.1".to_string(),
        port,
        db: 0,
        password: SecretString::from(String::new()),
        use_ssl: false,
    };
    let store = Arc::new(RedisStore::connect(&config).await.expect("connect to redis"));
    (RouteRegistry::new(store), container)
}

#[tokio::test]
async fn registering_a_node_attaches_it_to_its_routes() {
    let (registry, _container) = registry().await;

    let route_id = registry
        .register_route("/api/test/echo", "POST", 5)
        .await
        .unwrap();

    let node = Node::new("worker-1", "v1", "queue:worker-1");
    registry
        .register_node(node, &[route_id.clone()])
        .await
        .unwrap();

    let route = registry.get_route(&route_id).await.unwrap().unwrap();
    assert_eq!(route.worker_nodes.len(), 1);
    assert!(route.worker_nodes.contains_key("worker-1"));

    let workers = registry.get_route_workers(&route_id).await.unwrap();
    assert_eq!(workers.len(), 1);
}

#[tokio::test]
async fn unregistering_the_last_worker_deletes_the_route() {
    let (registry, _container) = registry().await;

    let route_id = registry.register_route("/api/test/echo", "POST", 5).await.unwrap();
    let node = Node::new("worker-1", "v1", "queue:worker-1");
    registry.register_node(node, &[route_id.clone()]).await.unwrap();

    registry.unregister_node("worker-1").await.unwrap();

    assert!(registry.get_route(&route_id).await.unwrap().is_none());
}

#[tokio::test]
async fn clean_inactive_nodes_marks_offline_without_deleting() {
    let (registry, _container) = registry().await;

    let route_id = registry.register_route("/api/test/echo", "POST", 5).await.unwrap();
    let mut node = Node::new("worker-1", "v1", "queue:worker-1");
    node.last_heartbeat = chrono::Utc::now() - chrono::Duration::seconds(120);
    registry.register_node(node, &[route_id.clone()]).await.unwrap();

    let reaped = registry
        .clean_inactive_nodes(chrono::Duration::seconds(30))
        .await
        .unwrap();

    assert_eq!(reaped, vec!["worker-1".to_string()]);

    let node = registry.get_node("worker-1").await.unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Offline);

    let route = registry.get_route(&route_id).await.unwrap().unwrap();
    assert!(route.worker_nodes.contains_key("worker-1"));
}

#[tokio::test]
async fn update_node_status_is_visible_on_read() {
    let (registry, _container) = registry().await;

    let route_id = registry.register_route("/api/test/echo", "POST", 5).await.unwrap();
    let node = Node::new("worker-1", "v1", "queue:worker-1");
    registry.register_node(node, &[route_id]).await.unwrap();

    registry
        .update_node_status("worker-1", NodeStatus::Busy)
        .await
        .unwrap();

    let node = registry.get_node("worker-1").await.unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Busy);

    tokio::time::sleep(Duration::from_millis(10)).await;
}
