//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits, error classification)
//!     → connection.rs (lifecycle tracking for drain / forced close)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Active → Draining → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked so shutdown can report what it drained or abandoned
//! - Transient accept errors never take the process down

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
