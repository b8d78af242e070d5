//! The transport port.
//!
//! A [`Transport`] performs exactly one HTTP exchange. It knows nothing about
//! sessions, tokens or cookies; the session engine decides every header and
//! hands over a fully resolved [`TransportRequest`].
//!
//! ## Architectural Layer
//!
//! **Port definition.** The reqwest-backed implementation lives in the
//! `http-transport` crate; tests supply scripted in-memory implementations.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Headers, HttpMethod};

// ---------------------------------------------------------------------------
// Credentials on the wire
// ---------------------------------------------------------------------------

/// Authorization attached to a single request.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// HTTP basic authentication.
    Basic { username: String, password: String },
    /// `Authorization: Bearer <token>`.
    Bearer(String),
}

// Secrets stay out of logs and panic messages.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Auth::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// One fully resolved HTTP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Absolute URL without query string.
    pub url: String,
    pub headers: Headers,
    /// Query parameters, appended in order.
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
    /// Passed through to the HTTP client; the engine never enforces it.
    pub timeout: Option<Duration>,
    pub auth: Option<Auth>,
}

/// What came back from the server, whatever the status code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: String,
}

impl TransportResponse {
    /// Builds a response; mostly useful for tests and scripted transports.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: default_status_text(status).to_string(),
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Adds a header entry (repeatable).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Returns `true` for status codes below 400.
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

fn default_status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

/// Coarse category of a transport fault, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// DNS, TCP or TLS failure before a response arrived.
    Connect,
    /// The pass-through timeout elapsed.
    Timeout,
    /// The request could not be built (bad URL, bad header value).
    Request,
    /// The response body could not be read.
    Body,
    Other,
}

/// A failure raised by a [`Transport`] instead of returning a response.
///
/// May carry the reply that caused it when the adapter treats non-2xx
/// statuses as faults; the classifier then parses that reply like any other.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} failure: {message}")]
pub struct TransportFault {
    pub kind: FaultKind,
    pub message: String,
    pub response: Option<TransportResponse>,
}

impl TransportFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            response: None,
        }
    }

    /// Attaches the reply that caused this fault.
    pub fn with_response(mut self, response: TransportResponse) -> Self {
        self.response = Some(response);
        self
    }
}

// ---------------------------------------------------------------------------
// Port trait
// ---------------------------------------------------------------------------

/// Performs one HTTP call.
///
/// Implementations return every reply the server produced, including 4xx and
/// 5xx, as `Ok`; `Err` is reserved for calls that produced no usable reply.
/// Implementations that do report error statuses as faults must attach the
/// reply via [`TransportFault::with_response`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFault>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_debug_hides_secrets() {
        let basic = Auth::Basic {
            username: "DEVELOPER".into(),
            password: "s3cret".into(),
        };
        let bearer = Auth::Bearer("tok".into());

        let rendered = format!("{basic:?} {bearer:?}");

        assert!(rendered.contains("DEVELOPER"));
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("tok"));
    }

    #[test]
    fn response_builder_fills_status_text() {
        let response = TransportResponse::new(404, "").with_header("x-a", "1");
        assert_eq!(response.status_text, "Not Found");
        assert!(!response.is_success());
        assert_eq!(response.headers.get("X-A"), Some("1"));
    }
}
