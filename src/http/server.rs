//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Create Axum Router with the readiness route
//! - Wire up middleware (tracing with request id)
//! - Accept connections and serve each one in its own task
//! - Drain: stop accepting, let in-flight requests finish
//!
//! Connection tasks live in a `JoinSet` owned by the accept loop, so
//! dropping or aborting the loop closes every connection at once. Only
//! HTTP/1.1 is served: an HTTP/1 connection runs its handlers inside its own
//! task, so no request can outlive a forced close.

use std::net::SocketAddr;

use axum::{body::Body, http::Request, routing::any, Router};
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower_http::trace::TraceLayer;

use crate::http::readiness::{readiness, ReadinessProbe, READINESS_PATH};
use crate::http::request::RequestId;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};

/// HTTP server for the readiness endpoint.
pub struct HttpServer {
    router: Router,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a new HTTP server answering probes with the given settings.
    pub fn new(probe: ReadinessProbe) -> Self {
        Self {
            router: Self::build_router(probe),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(probe: ReadinessProbe) -> Router {
        Router::new()
            .route(READINESS_PATH, any(readiness))
            .with_state(probe)
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = RequestId::from_headers(request.headers());
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                }),
            )
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Tracker counting this server's open connections.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Run the accept loop until `drain` flips to `true` or the sender goes away.
    ///
    /// Draining closes the accept socket immediately, asks every open
    /// connection to finish its in-flight requests, and returns once all of
    /// them have closed. A fatal accept error returns at once and drops
    /// every connection.
    pub async fn run(
        self,
        listener: Listener,
        mut drain: watch::Receiver<bool>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().ok();
        tracing::info!(address = ?addr, "HTTP server accepting");

        let mut connections = JoinSet::new();
        let conn_drain = drain.clone();

        loop {
            tokio::select! {
                _ = drained(&mut drain) => break,
                accepted = listener.accept() => {
                    let (stream, peer, permit) = accepted?;
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        permit,
                        self.router.clone(),
                        self.tracker.clone(),
                        conn_drain.clone(),
                    ));
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        tracing::info!(
            in_flight = self.tracker.active_count(),
            "Stopped accepting, draining connections"
        );

        while connections.join_next().await.is_some() {}

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Serve one connection, switching it to graceful shutdown when draining starts.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    router: Router,
    tracker: ConnectionTracker,
    mut drain: watch::Receiver<bool>,
) {
    let guard = tracker.track();
    let conn = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %guard.id(), peer_addr = %peer, error = %e, "Connection error");
                }
                break;
            }
            _ = drained(&mut drain), if !draining => {
                draining = true;
                tracing::debug!(connection_id = %guard.id(), "Connection draining");
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

/// Resolves once draining starts or the drain sender is gone.
async fn drained(drain: &mut watch::Receiver<bool>) {
    let _ = drain.wait_for(|draining| *draining).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenerConfig;
    use axum::http::StatusCode;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    async fn bind_loopback() -> Listener {
        Listener::bind(&ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: 8,
        })
        .await
        .unwrap()
    }

    async fn send_readiness_request(addr: SocketAddr) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /v1/readiness HTTP/1.1\r\nhost: localhost\r\nx-request-id: raw\r\n\r\n")
            .await
            .unwrap();
        stream
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let server = HttpServer::new(ReadinessProbe::new(Duration::ZERO));
        let response = server
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn drain_with_no_connections_returns() {
        let listener = bind_loopback().await;
        let server = HttpServer::new(ReadinessProbe::new(Duration::ZERO));
        let (drain_tx, drain_rx) = watch::channel(false);

        let task = tokio::spawn(server.run(listener, drain_rx));
        drain_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("drain should finish quickly")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn drain_lets_in_flight_request_finish() {
        let listener = bind_loopback().await;
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::new(ReadinessProbe::new(Duration::from_millis(200)));
        let (drain_tx, drain_rx) = watch::channel(false);
        let task = tokio::spawn(server.run(listener, drain_rx));

        let mut stream = send_readiness_request(addr).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        drain_tx.send(true).unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with(r#"{"status":"ok"}"#), "{response}");

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("drain should finish after the response")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn aborting_run_drops_in_flight_connections() {
        let listener = bind_loopback().await;
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::new(ReadinessProbe::new(Duration::from_secs(30)));
        let tracker = server.tracker();
        let (_drain_tx, drain_rx) = watch::channel(false);
        let task = tokio::spawn(server.run(listener, drain_rx));

        let mut stream = send_readiness_request(addr).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(tracker.active_count(), 1);

        task.abort();
        let _ = task.await;

        let mut buf = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(1), stream.read_to_end(&mut buf))
            .await
            .expect("connection left open after abort");
        assert!(read.map(|n| n == 0).unwrap_or(true), "got a response after abort");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.active_count(), 0);
    }
}
