//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Separate transient accept errors from fatal ones

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;

const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

// Linux and the BSDs agree on these "too many open files" errno values
// (system wide / per process).
#[cfg(unix)]
const ENFILE: i32 = 23;
#[cfg(unix)]
const EMFILE: i32 = 24;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Accept failed with an error that is not worth retrying.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// `max_connections` is zero or larger than a semaphore can hold.
    #[error("invalid connection limit {0}")]
    ConnectionLimit(usize),

    /// The connection limit semaphore was closed.
    #[error("connection limit closed")]
    LimitClosed,
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let bind_error = |source: io::Error| ListenerError::Bind {
            address: config.bind_address.clone(),
            source,
        };

        if !(1..=Semaphore::MAX_PERMITS).contains(&config.max_connections) {
            return Err(ListenerError::ConnectionLimit(config.max_connections));
        }

        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| bind_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Waits if the connection limit has been reached. Errors that only
    /// concern the one connection being accepted are skipped, and running
    /// out of file descriptors backs off and retries. Everything else is
    /// returned as fatal.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::LimitClosed)?;

        let mut backoff = ACCEPT_BACKOFF_START;
        loop {
            match self.inner.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!(
                        peer_addr = %addr,
                        available_permits = self.connection_limit.available_permits(),
                        "Connection accepted"
                    );
                    return Ok((stream, addr, ConnectionPermit { _permit: permit }));
                }
                Err(e) if is_connection_error(&e) => {
                    tracing::debug!(error = %e, "Accept failed for a single connection");
                }
                Err(e) if is_resource_exhausted(&e) => {
                    tracing::warn!(error = %e, retry_in = ?backoff, "Accept failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
                }
                Err(e) => return Err(ListenerError::Accept(e)),
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

#[cfg(unix)]
fn is_resource_exhausted(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(ENFILE) | Some(EMFILE))
}

#[cfg(not(unix))]
fn is_resource_exhausted(_e: &io::Error) -> bool {
    false
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This ensures backpressure is maintained even if the connection task is aborted.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bind_address: &str, max_connections: usize) -> ListenerConfig {
        ListenerConfig {
            bind_address: bind_address.to_string(),
            max_connections,
        }
    }

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = Listener::bind(&config("127.0.0.1:0", 4)).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
        assert_eq!(listener.max_connections(), 4);
        assert_eq!(listener.available_permits(), 4);
    }

    #[tokio::test]
    async fn rejects_unparseable_address() {
        let err = Listener::bind(&config("not-an-address", 1)).await.unwrap_err();
        match err {
            ListenerError::Bind { address, source } => {
                assert_eq!(address, "not-an-address");
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn port_in_use_is_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let err = Listener::bind(&config(&addr.to_string(), 1)).await.unwrap_err();
        match err {
            ListenerError::Bind { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::AddrInUse);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn permit_held_per_connection() {
        let listener = Listener::bind(&config("127.0.0.1:0", 2)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _peer, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 1);

        drop(permit);
        assert_eq!(listener.available_permits(), 2);
    }

    #[test]
    fn classifies_accept_errors() {
        assert!(is_connection_error(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(!is_connection_error(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_resource_exhausted(&io::Error::from(io::ErrorKind::Other)));
    }

    #[cfg(unix)]
    #[test]
    fn too_many_open_files_is_resource_exhaustion() {
        assert!(is_resource_exhausted(&io::Error::from_raw_os_error(EMFILE)));
        assert!(is_resource_exhausted(&io::Error::from_raw_os_error(ENFILE)));
        // EMFILE's neighbours are ordinary fatal errors.
        assert!(!is_resource_exhausted(&io::Error::from_raw_os_error(22)));
        assert!(!is_resource_exhausted(&io::Error::from_raw_os_error(25)));
    }

    #[tokio::test]
    async fn rejects_connection_limit_a_semaphore_cannot_hold() {
        for limit in [0, Semaphore::MAX_PERMITS + 1] {
            let err = Listener::bind(&config("127.0.0.1:0", limit)).await.unwrap_err();
            assert!(matches!(err, ListenerError::ConnectionLimit(n) if n == limit));
        }
    }
}
