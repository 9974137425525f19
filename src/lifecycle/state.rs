//! Server lifecycle state machine.
//!
//! # State Transitions
//! ```text
//! Created → Running                       start()
//! Running → ShuttingDownGraceful          termination signal
//! Running → Terminated                    listener error / listener stopped
//! ShuttingDownGraceful → ShuttingDownForced   deadline hit or shutdown failed
//! ShuttingDownGraceful → Terminated       all connections drained
//! ShuttingDownForced → Terminated         listener aborted
//! ```
//!
//! Nothing ever re-enters `Running`, and `Terminated` is final.

use tokio::sync::watch;

/// Lifecycle state of the server handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Running,
    ShuttingDownGraceful,
    ShuttingDownForced,
    Terminated,
}

impl ServerState {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: ServerState) -> bool {
        use ServerState::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Running, ShuttingDownGraceful)
                | (Running, Terminated)
                | (ShuttingDownGraceful, ShuttingDownForced)
                | (ShuttingDownGraceful, Terminated)
                | (ShuttingDownForced, Terminated)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ServerState::Terminated
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServerState::Created => "created",
            ServerState::Running => "running",
            ServerState::ShuttingDownGraceful => "shutting_down_graceful",
            ServerState::ShuttingDownForced => "shutting_down_forced",
            ServerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Owner side of the state, published to observers through a watch channel.
#[derive(Debug)]
pub struct StateCell {
    tx: watch::Sender<ServerState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ServerState::Created);
        Self { tx }
    }

    pub fn get(&self) -> ServerState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.tx.subscribe()
    }

    /// Move to `next`. Returns `false` and leaves the state untouched when
    /// the transition is not allowed.
    pub fn transition(&self, next: ServerState) -> bool {
        let current = self.get();
        if !current.can_transition_to(next) {
            tracing::error!(from = %current, to = %next, "Rejected lifecycle transition");
            return false;
        }
        self.tx.send_replace(next);
        tracing::debug!(from = %current, to = %next, "Lifecycle transition");
        true
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ServerState::*;

    const ALL: [ServerState; 5] = [
        Created,
        Running,
        ShuttingDownGraceful,
        ShuttingDownForced,
        Terminated,
    ];

    #[test]
    fn running_is_never_reentered() {
        for state in ALL {
            if state != Created {
                assert!(!state.can_transition_to(Running), "{state} -> running");
            }
        }
    }

    #[test]
    fn terminated_is_final() {
        assert!(Terminated.is_terminal());
        for next in ALL {
            assert!(!Terminated.can_transition_to(next));
        }
    }

    #[test]
    fn forced_only_after_graceful() {
        for state in ALL {
            let allowed = state.can_transition_to(ShuttingDownForced);
            assert_eq!(allowed, state == ShuttingDownGraceful, "{state}");
        }
    }

    #[test]
    fn cell_follows_signal_path() {
        let cell = StateCell::new();
        let observer = cell.subscribe();

        assert!(cell.transition(Running));
        assert!(cell.transition(ShuttingDownGraceful));
        assert!(cell.transition(ShuttingDownForced));
        assert!(cell.transition(Terminated));
        assert_eq!(*observer.borrow(), Terminated);
    }

    #[test]
    fn cell_rejects_invalid_transition() {
        let cell = StateCell::new();
        assert!(!cell.transition(Terminated));
        assert_eq!(cell.get(), Created);

        assert!(cell.transition(Running));
        assert!(!cell.transition(Created));
        assert_eq!(cell.get(), Running);
    }
}
