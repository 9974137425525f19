//! Request correlation.
//!
//! # Responsibilities
//! - Read the caller-supplied `X-REQUEST-ID` header
//! - Expose it to handlers and trace spans for log correlation
//!
//! # Design Decisions
//! - No validation and no generation: the value is only echoed into logs
//! - Absent or non-UTF-8 values become the empty string

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, HeaderName},
};

/// Header carrying the caller's correlation id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id supplied by the caller, empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Extract the request id from a header map.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let value = headers
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
