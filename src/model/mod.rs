//! Plain data types shared across the registry, dispatcher, and worker
//! runtime: jobs, nodes, and routes.

mod http_job;
mod job;
mod node;
mod route;

pub use http_job::HttpJob;
pub use job::JobStatus;
pub use node::{Node, NodeMetrics, NodeStatus};
pub use route::{canonical_route_id, Route, WorkerDescriptor};
