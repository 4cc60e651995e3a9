//! HTTP server - axum application, routes, and the binary entry point

pub mod app;
pub mod routes;

pub use app::{build_app, AppState};
