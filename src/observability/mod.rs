//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!       (request_id, connection_id, address, signal, abandoned)
//!     → logging.rs (filter + pretty or JSON formatter)
//! ```
//!
//! # Design Decisions
//! - Request ID flows into the request span and handler events
//! - `RUST_LOG` overrides the configured level

pub mod logging;

pub use logging::init_logging;
