//! Shared utilities for lifecycle integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use readiness_server::config::ListenerConfig;
use readiness_server::http::ReadinessProbe;
use readiness_server::lifecycle::{
    Coordinator, LifecycleError, ServerState, Shutdown, ShutdownOutcome, TerminationSignal,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A server running on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub state: watch::Receiver<ServerState>,
    pub handle: JoinHandle<Result<ShutdownOutcome, LifecycleError>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}/v1/readiness", self.addr)
    }

    /// Simulate SIGINT.
    pub fn interrupt(&self) {
        assert!(self.shutdown.trigger(TerminationSignal::Interrupt));
    }

    /// Wait for the coordinator to return, failing the test after `limit`.
    pub async fn join(self, limit: Duration) -> Result<ShutdownOutcome, LifecycleError> {
        tokio::time::timeout(limit, self.handle)
            .await
            .expect("coordinator did not finish in time")
            .expect("coordinator task panicked")
    }
}

pub fn loopback() -> ListenerConfig {
    ListenerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        max_connections: 64,
    }
}

/// Start a server with the given probe delay and shutdown deadline and wait
/// until it is accepting.
pub async fn start_server(delay: Duration, shutdown_timeout: Duration) -> TestServer {
    let shutdown = Shutdown::new();
    let coordinator = Coordinator::new(loopback(), shutdown.subscribe())
        .with_probe(ReadinessProbe::new(delay))
        .with_shutdown_timeout(shutdown_timeout);

    let mut local_addr = coordinator.local_addr();
    let state = coordinator.state();
    let handle = tokio::spawn(coordinator.run());

    let addr = tokio::time::timeout(Duration::from_secs(5), local_addr.wait_for(Option::is_some))
        .await
        .expect("listener never bound")
        .expect("listener task exited before binding")
        .expect("bound address published");

    TestServer {
        addr,
        shutdown,
        state,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
