//! HTTP status and command server.

mod routes;
mod server;

pub use routes::{ApiState, create_router};
pub use server::{WebServerHandle, start_web, stop_web};
