//! Worker-side runtime: register routes and handlers, then serve jobs off
//! a per-worker queue until told to shut down.

mod builder;
mod handler;
mod runtime;

pub use builder::WorkerBuilder;
pub use handler::{HandlerError, HandlerResponse, HandlerResult, JobHandler};
pub use runtime::WorkerRuntime;
