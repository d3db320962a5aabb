//! Route/Node registry: the shared directory of what routes exist and
//! which workers currently serve them.
//!
//! Every mutation takes the `"registry"` distributed lock first. A route
//! and the nodes that serve it are cross-referenced three ways: the
//! `Route.worker_nodes`/`Node.routes` fields on the records themselves, and
//! a pair of membership sets (`route_nodes:{route_id}` / `node_routes:{worker_id}`)
//! kept in lockstep so `w ∈ route_nodes:r ⇔ r ∈ node_routes:w ⇔ w ∈
//! route(r).worker_nodes ⇔ r ∈ node(w).routes` always holds. All four are
//! updated together under the lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::RegistryError;
use crate::lock::DistributedMutex;
use crate::model::{canonical_route_id, Node, NodeStatus, Route, WorkerDescriptor};
use crate::store::{StoreClient, StoreClientJsonExt};

const LOCK_TTL: Duration = Duration::from_secs(5);
const LOCK_WAIT: Duration = Duration::from_secs(2);

const NAMESPACE: &str = "callme_gate#";

fn route_key(route_id: &str) -> String {
    format!("{NAMESPACE}route:{route_id}")
}

fn node_key(worker_id: &str) -> String {
    format!("{NAMESPACE}node:{worker_id}")
}

fn route_nodes_key(route_id: &str) -> String {
    format!("{NAMESPACE}route_nodes:{route_id}")
}

fn node_routes_key(worker_id: &str) -> String {
    format!("{NAMESPACE}node_routes:{worker_id}")
}

fn routes_index_key() -> String {
    format!("{NAMESPACE}routes")
}

fn nodes_index_key() -> String {
    format!("{NAMESPACE}nodes")
}

/// Directory of routes and the worker nodes serving them.
pub struct RouteRegistry {
    store: Arc<dyn StoreClient>,
    lock: DistributedMutex,
}

impl RouteRegistry {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        let lock = DistributedMutex::new(store.clone());
        Self { store, lock }
    }

    async fn with_registry_lock<F, Fut, T>(&self, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, RegistryError>>,
    {
        self.lock
            .with_lock("registry", LOCK_TTL, LOCK_WAIT, f)
            .await
    }

    /// Create the route if it does not already exist; idempotent otherwise.
    pub async fn register_route(
        &self,
        path: &str,
        method: &str,
        timeout: u64,
    ) -> Result<String, RegistryError> {
        let route_id = canonical_route_id(method, path);
        self.with_registry_lock(|| async {
            if self.store.get_json::<Route>(&route_key(&route_id)).await?.is_none() {
                let route = Route::new(path, method, timeout);
                self.store
                    .set_json(&route_key(&route_id), &route, None)
                    .await?;
                self.store.set_add(&routes_index_key(), &route_id).await?;
            }
            Ok(())
        })
        .await?;
        Ok(route_id)
    }

    /// Remove a route entirely: drops the route record, its membership
    /// set, every serving node's reverse membership entry, and the
    /// `routes` index entry.
    pub async fn unregister_route(&self, route_id: &str) -> Result<(), RegistryError> {
        self.with_registry_lock(|| async {
            if let Some(route) = self.store.get_json::<Route>(&route_key(route_id)).await? {
                for worker_id in route.worker_nodes.keys() {
                    if let Some(mut node) = self.store.get_json::<Node>(&node_key(worker_id)).await? {
                        node.routes.remove(route_id);
                        self.store.set_json(&node_key(worker_id), &node, None).await?;
                    }
                    self.store.set_remove(&node_routes_key(worker_id), route_id).await?;
                }
            }
            self.store.delete(&route_key(route_id)).await?;
            self.store.delete(&route_nodes_key(route_id)).await?;
            self.store.set_remove(&routes_index_key(), route_id).await?;
            Ok(())
        })
        .await
    }

    /// Register `node`, then attach it as a server for each of `route_ids`.
    /// Routes that do not yet exist are left alone — callers register the
    /// route itself first.
    pub async fn register_node(&self, node: Node, route_ids: &[String]) -> Result<(), RegistryError> {
        self.with_registry_lock(|| async {
            let mut node = node;
            for route_id in route_ids {
                let Some(mut route) = self.store.get_json::<Route>(&route_key(route_id)).await? else {
                    continue;
                };
                route.worker_nodes.insert(
                    node.worker_id.clone(),
                    WorkerDescriptor {
                        worker_id: node.worker_id.clone(),
                        version: node.version.clone(),
                        queue: node.queue.clone(),
                        metadata: node.metadata.clone(),
                        added_at: Utc::now(),
                    },
                );
                self.store.set_json(&route_key(route_id), &route, None).await?;
                self.store.set_add(&route_nodes_key(route_id), &node.worker_id).await?;
                self.store.set_add(&node_routes_key(&node.worker_id), route_id).await?;
                node.routes.insert(route_id.clone());
            }
            self.store.set_json(&node_key(&node.worker_id), &node, None).await?;
            self.store.set_add(&nodes_index_key(), &node.worker_id).await?;
            Ok(())
        })
        .await
    }

    /// Remove a node and its membership from every route it served. Routes
    /// left with no workers are deleted.
    pub async fn unregister_node(&self, worker_id: &str) -> Result<(), RegistryError> {
        self.with_registry_lock(|| async {
            let Some(node) = self.store.get_json::<Node>(&node_key(worker_id)).await? else {
                return Ok(());
            };
            for route_id in &node.routes {
                if let Some(mut route) = self.store.get_json::<Route>(&route_key(route_id)).await? {
                    route.worker_nodes.remove(worker_id);
                    if route.is_empty() {
                        self.store.delete(&route_key(route_id)).await?;
                        self.store.delete(&route_nodes_key(route_id)).await?;
                        self.store.set_remove(&routes_index_key(), route_id).await?;
                    } else {
                        self.store.set_json(&route_key(route_id), &route, None).await?;
                        self.store.set_remove(&route_nodes_key(route_id), worker_id).await?;
                    }
                }
            }
            self.store.delete(&node_routes_key(worker_id)).await?;
            self.store.delete(&node_key(worker_id)).await?;
            self.store.set_remove(&nodes_index_key(), worker_id).await?;
            Ok(())
        })
        .await
    }

    pub async fn update_node_status(
        &self,
        worker_id: &str,
        status: NodeStatus,
    ) -> Result<(), RegistryError> {
        self.with_registry_lock(|| async {
            let Some(mut node) = self.store.get_json::<Node>(&node_key(worker_id)).await? else {
                return Ok(());
            };
            node.status = status;
            self.store.set_json(&node_key(worker_id), &node, None).await?;
            Ok(())
        })
        .await
    }

    /// Bump `last_heartbeat` and promote the node back to `online` if it
    /// was in a non-error transient state. Does not take the registry
    /// lock: a heartbeat only touches its own node record.
    pub async fn node_heartbeat(&self, worker_id: &str) -> Result<(), RegistryError> {
        let Some(mut node) = self.store.get_json::<Node>(&node_key(worker_id)).await? else {
            return Ok(());
        };
        node.heartbeat();
        self.store.set_json(&node_key(worker_id), &node, None).await?;
        Ok(())
    }

    /// Overwrite a node's record as-is. Used by the worker runtime to
    /// persist updated metrics after each job; like [`node_heartbeat`](Self::node_heartbeat)
    /// this does not take the registry lock since it only touches the
    /// node's own key.
    pub async fn save_node(&self, node: &Node) -> Result<(), RegistryError> {
        self.store.set_json(&node_key(&node.worker_id), node, None).await?;
        Ok(())
    }

    pub async fn get_route(&self, route_id: &str) -> Result<Option<Route>, RegistryError> {
        Ok(self.store.get_json(&route_key(route_id)).await?)
    }

    pub async fn get_all_routes(&self) -> Result<Vec<Route>, RegistryError> {
        let ids = self.store.set_members(&routes_index_key()).await?;
        let mut routes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(route) = self.store.get_json(&route_key(&id)).await? {
                routes.push(route);
            }
        }
        Ok(routes)
    }

    pub async fn get_node(&self, worker_id: &str) -> Result<Option<Node>, RegistryError> {
        Ok(self.store.get_json(&node_key(worker_id)).await?)
    }

    pub async fn get_all_nodes(&self) -> Result<Vec<Node>, RegistryError> {
        let ids = self.store.set_members(&nodes_index_key()).await?;
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.store.get_json(&node_key(&id)).await? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    pub async fn get_route_workers(
        &self,
        route_id: &str,
    ) -> Result<Vec<WorkerDescriptor>, RegistryError> {
        Ok(self
            .get_route(route_id)
            .await?
            .map(|route| route.worker_nodes.into_values().collect())
            .unwrap_or_default())
    }

    /// Mark every node whose heartbeat is older than `max_age` as
    /// `offline`. Never deletes the node record or its routes — an
    /// offline node remains addressable and simply gets filtered out of
    /// dispatch until it heartbeats again. Returns the worker ids flipped.
    pub async fn clean_inactive_nodes(
        &self,
        max_age: chrono::Duration,
    ) -> Result<Vec<String>, RegistryError> {
        let nodes = self.get_all_nodes().await?;
        let mut reaped = Vec::new();
        for node in nodes {
            if node.status != NodeStatus::Offline && !node.is_alive(max_age) {
                self.update_node_status(&node.worker_id, NodeStatus::Offline).await?;
                reaped.push(node.worker_id);
            }
        }
        Ok(reaped)
    }
}
