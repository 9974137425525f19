//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::Listener)
//!     → server.rs (hyper auto connection, HTTP/1.1 + HTTP/2, drain)
//!     → request.rs (X-REQUEST-ID for log correlation)
//!     → readiness.rs (fixed delay, {"status":"ok"})
//!     → Send to client
//! ```

pub mod readiness;
pub mod request;
pub mod server;

pub use readiness::{ReadinessError, ReadinessProbe, READINESS_PATH};
pub use request::{RequestId, X_REQUEST_ID};
pub use server::HttpServer;
