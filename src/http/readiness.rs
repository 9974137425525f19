//! Readiness probe handler.
//!
//! Waits a fixed delay standing in for dependency checks, then answers
//! `{"status":"ok"}`. The delay is not interrupted by shutdown: a request
//! either finishes or is abandoned when its connection is force-closed.

use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::http::request::RequestId;

/// Route the probe is served on.
pub const READINESS_PATH: &str = "/v1/readiness";

/// Simulated dependency-check latency.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Readiness probe settings shared with every request.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessProbe {
    delay: Duration,
}

impl ReadinessProbe {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

/// Body written on success.
#[derive(Debug, Serialize)]
pub struct ReadinessStatus {
    pub status: &'static str,
}

/// Failure to produce a readiness response.
#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("failed to encode readiness response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IntoResponse for ReadinessError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Readiness response failed");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// Logs the end of a probe. Reports the request as abandoned when the
/// handler future is dropped before it finished.
struct ProbeLog<'a> {
    request_id: &'a RequestId,
    finished: bool,
}

impl<'a> ProbeLog<'a> {
    fn start(request_id: &'a RequestId) -> Self {
        tracing::info!(request_id = %request_id, "start");
        Self {
            request_id,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for ProbeLog<'_> {
    fn drop(&mut self) {
        if self.finished {
            tracing::info!(request_id = %self.request_id, "done");
        } else {
            tracing::warn!(request_id = %self.request_id, "abandoned");
        }
    }
}

/// `/v1/readiness` handler. Any method is accepted.
pub async fn readiness(
    State(probe): State<ReadinessProbe>,
    request_id: RequestId,
) -> Result<Response, ReadinessError> {
    let log = ProbeLog::start(&request_id);

    tokio::time::sleep(probe.delay).await;

    let body = serde_json::to_vec(&ReadinessStatus { status: "ok" })?;
    log.finish();

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}
