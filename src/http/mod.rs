//! HTTP API: the admission decision endpoint and the metrics read surface.

mod routes;
mod server;

pub use routes::{router, AppState};
pub use server::HttpServer;
