//! HTTP server for Scriptorium

mod http;

pub use http::{run, AppState};
