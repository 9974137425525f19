//! Lifecycle coordinator.
//!
//! Owns the server handle for the whole life of the process and decides how
//! the process ends: a termination signal leads to a graceful shutdown bounded
//! by [`SHUTDOWN_TIMEOUT`] (escalating to a forced close), while a listener
//! error is fatal.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

use crate::config::ListenerConfig;
use crate::http::{HttpServer, ReadinessProbe};
use crate::lifecycle::shutdown::{recv_signal, TerminationSignal};
use crate::lifecycle::state::{ServerState, StateCell};
use crate::net::{ConnectionTracker, Listener, ListenerError};

/// How long in-flight requests get to finish once a termination signal arrives.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Fatal lifecycle failures. The process should exit non-zero.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("listener failed: {0}")]
    Listener(#[from] ListenerError),

    #[error("listener task failed: {0}")]
    ListenerTask(#[from] JoinError),
}

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight connection finished before the deadline.
    Graceful,
    /// The deadline passed (or draining failed) and open connections were dropped.
    Forced { abandoned: u64 },
    /// The listener stopped on its own without reporting an error.
    Stopped,
}

/// A server that has not been started yet.
pub struct Coordinator {
    config: ListenerConfig,
    probe: ReadinessProbe,
    shutdown_timeout: Duration,
    signals: broadcast::Receiver<TerminationSignal>,
    state: StateCell,
    local_addr: watch::Sender<Option<SocketAddr>>,
}

impl Coordinator {
    /// Create a coordinator listening for termination signals on `signals`.
    ///
    /// Pass a receiver from [`Shutdown::subscribe`](crate::lifecycle::Shutdown::subscribe)
    /// taken before anything can trigger it.
    pub fn new(config: ListenerConfig, signals: broadcast::Receiver<TerminationSignal>) -> Self {
        let (local_addr, _) = watch::channel(None);
        Self {
            config,
            probe: ReadinessProbe::default(),
            shutdown_timeout: SHUTDOWN_TIMEOUT,
            signals,
            state: StateCell::new(),
            local_addr,
        }
    }

    /// Replace the readiness probe settings.
    pub fn with_probe(mut self, probe: ReadinessProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Replace the graceful shutdown deadline.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Observe lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Observe the bound address. Stays `None` until the listener is accepting.
    pub fn local_addr(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.local_addr.subscribe()
    }

    /// Spawn the listener and move to `Running`.
    ///
    /// Binding happens inside the spawned task; its failure, like any fatal
    /// accept error, arrives later through the error channel.
    pub fn start(self) -> RunningServer {
        let (error_tx, errors) = mpsc::channel(1);
        let (drain, drain_rx) = watch::channel(false);

        let server = HttpServer::new(self.probe);
        let tracker = server.tracker();
        let local_addr = self.local_addr;
        let addr_rx = local_addr.subscribe();
        let config = self.config;

        self.state.transition(ServerState::Running);

        let task = tokio::spawn(async move {
            let result: Result<(), ListenerError> = async {
                let listener = Listener::bind(&config).await?;
                if let Ok(addr) = listener.local_addr() {
                    local_addr.send_replace(Some(addr));
                }
                server.run(listener, drain_rx).await
            }
            .await;

            if let Err(e) = result {
                if let Err(mpsc::error::TrySendError::Full(e) | mpsc::error::TrySendError::Closed(e)) =
                    error_tx.try_send(e)
                {
                    tracing::error!(error = %e, "Listener error could not be delivered");
                }
            }
        });

        RunningServer {
            task,
            drain,
            errors,
            signals: self.signals,
            tracker,
            shutdown_timeout: self.shutdown_timeout,
            state: self.state,
            local_addr: addr_rx,
        }
    }

    /// Start the server and block until it terminates.
    pub async fn run(self) -> Result<ShutdownOutcome, LifecycleError> {
        self.start().run_until_terminated().await
    }
}

/// Handle to a started server, exclusively owned by the coordinator.
pub struct RunningServer {
    task: JoinHandle<()>,
    drain: watch::Sender<bool>,
    errors: mpsc::Receiver<ListenerError>,
    signals: broadcast::Receiver<TerminationSignal>,
    tracker: ConnectionTracker,
    shutdown_timeout: Duration,
    state: StateCell,
    local_addr: watch::Receiver<Option<SocketAddr>>,
}

impl RunningServer {
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    pub fn local_addr(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.local_addr.clone()
    }

    /// Wait for a termination signal or a listener error, whichever comes first.
    pub async fn run_until_terminated(mut self) -> Result<ShutdownOutcome, LifecycleError> {
        tokio::select! {
            signal = recv_signal(&mut self.signals) => {
                tracing::info!(signal = %signal, "Termination signal received");
                Ok(self.shutdown().await)
            }
            error = self.errors.recv() => match error {
                Some(e) => {
                    self.state.transition(ServerState::Terminated);
                    tracing::error!(error = %e, "Listener failed");
                    Err(e.into())
                }
                None => {
                    let joined = (&mut self.task).await;
                    self.state.transition(ServerState::Terminated);
                    match joined {
                        Ok(()) => {
                            tracing::info!("Listener stopped");
                            Ok(ShutdownOutcome::Stopped)
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Listener task failed");
                            Err(e.into())
                        }
                    }
                }
            }
        }
    }

    /// Drain the listener, bounded by the shutdown deadline.
    async fn shutdown(&mut self) -> ShutdownOutcome {
        self.state.transition(ServerState::ShuttingDownGraceful);
        // The receiver is gone only if the listener already exited; joining below covers that.
        let _ = self.drain.send(true);

        match tokio::time::timeout(self.shutdown_timeout, &mut self.task).await {
            Ok(Ok(())) => {
                self.state.transition(ServerState::Terminated);
                tracing::info!("Graceful shutdown complete");
                ShutdownOutcome::Graceful
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Graceful shutdown failed, forcing close");
                self.force_close(false).await
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.shutdown_timeout,
                    "Graceful shutdown timed out, forcing close"
                );
                self.force_close(true).await
            }
        }
    }

    /// Drop the accept socket and every open connection immediately.
    async fn force_close(&mut self, task_running: bool) -> ShutdownOutcome {
        self.state.transition(ServerState::ShuttingDownForced);
        let abandoned = self.tracker.active_count();

        if task_running {
            self.task.abort();
            // Cancelled is the expected result here.
            let _ = (&mut self.task).await;
        }

        self.state.transition(ServerState::Terminated);
        tracing::warn!(abandoned, "Forced close complete");
        ShutdownOutcome::Forced { abandoned }
    }
}
