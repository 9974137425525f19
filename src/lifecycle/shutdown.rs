//! Shutdown signal broadcaster.

use tokio::sync::broadcast;

/// Signal that asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGINT, or Ctrl+C on platforms without Unix signals.
    Interrupt,
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationSignal::Interrupt => f.write_str("SIGINT"),
        }
    }
}

/// Source of termination signals.
///
/// OS handlers and tests call [`Shutdown::trigger`]; the coordinator holds a
/// receiver obtained from [`Shutdown::subscribe`]. Only subscribers that
/// exist when the signal is sent receive it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<TerminationSignal>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to termination signals.
    pub fn subscribe(&self) -> broadcast::Receiver<TerminationSignal> {
        self.tx.subscribe()
    }

    /// Deliver a termination signal to all current subscribers.
    ///
    /// Returns `false` when nobody was listening.
    pub fn trigger(&self, signal: TerminationSignal) -> bool {
        self.tx.send(signal).is_ok()
    }

    /// Get the number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for the next termination signal on `rx`.
///
/// A lagged receiver still means a signal arrived. A closed channel can
/// never deliver one, so the future stays pending instead of resolving.
pub async fn recv_signal(rx: &mut broadcast::Receiver<TerminationSignal>) -> TerminationSignal {
    loop {
        match rx.recv().await {
            Ok(signal) => return signal,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}
