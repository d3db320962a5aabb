//! The HTTP gateway: accepts inbound requests, dispatches them to a
//! worker, and exposes an admin surface over the route/node registry.

mod handlers;
mod server;
mod state;

pub use server::{router, run_reaper};
pub use state::GatewayState;
