//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT → Shutdown::trigger (shutdown.rs)
//!
//! Coordinator (coordinator.rs):
//!     Created → start() → Running
//!     Running → select { signal, listener error }
//!         signal → ShuttingDownGraceful → (deadline) → ShuttingDownForced → Terminated
//!         error  → Terminated (fatal)
//!
//! State (state.rs):
//!     Transition table, observable through a watch channel
//! ```
//!
//! # Design Decisions
//! - The signal source is injected, never a process global, so tests can
//!   simulate SIGINT deterministically
//! - Subscription happens before the listener starts, so an early signal is never lost
//! - Shutdown has a deadline: forced close after it expires
//! - No retries: bind and fatal accept errors end the process

pub mod coordinator;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use coordinator::{
    Coordinator, LifecycleError, RunningServer, ShutdownOutcome, SHUTDOWN_TIMEOUT,
};
pub use shutdown::{Shutdown, TerminationSignal};
pub use state::ServerState;
