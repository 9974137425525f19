//! Readiness server library.
//!
//! A single `/v1/readiness` endpoint served until SIGINT, followed by a
//! graceful shutdown bounded by a deadline and a forced close after it.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::{Coordinator, Shutdown, ShutdownOutcome};
