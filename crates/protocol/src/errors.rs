//! The error taxonomy every session operation reports.
//!
//! [`Error`] is a closed set: three classified failure shapes produced by
//! [`crate::classify`] at the boundary where a raw failure is first seen,
//! plus [`Error::Configuration`] for misuse detected locally. Errors are never
//! mutated after construction and are `Clone` so that a single in-flight
//! login can hand the same outcome to every caller awaiting it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{TransportFault, TransportResponse};

/// Result alias used throughout the session crates.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Structured server rejection
// ---------------------------------------------------------------------------

/// The server understood the request and rejected it.
///
/// Built from the XML exception envelope when one was sent, otherwise from
/// the bare status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// HTTP status code of the reply.
    pub status: u16,

    /// HTTP status text of the reply.
    pub status_text: String,

    /// Exception type id (e.g. `ExceptionResourceNotFound`). Empty when the
    /// reply carried no envelope.
    pub type_id: String,

    /// Human-readable message; falls back to the status text.
    pub message: String,

    /// Exception namespace id, when present.
    pub namespace: Option<String>,

    /// Message in the logon language, when present.
    pub localized_message: Option<String>,

    /// `<entry key="..">` pairs with values trimmed.
    pub properties: BTreeMap<String, String>,

    /// The raw reply, kept for callers that need headers or the body.
    #[serde(skip)]
    pub response: Option<TransportResponse>,
}

impl ProtocolError {
    /// A minimal error carrying only the status line.
    pub fn from_status(status: u16, status_text: impl Into<String>) -> Self {
        let status_text = status_text.into();
        let message = if status_text.is_empty() {
            format!("HTTP {status}")
        } else {
            status_text.clone()
        };
        Self {
            status,
            status_text,
            type_id: String::new(),
            message,
            namespace: None,
            localized_message: None,
            properties: BTreeMap::new(),
            response: None,
        }
    }

    /// Returns the property `key`, if the envelope carried it.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.type_id.is_empty() {
            write!(f, "HTTP {}: {}", self.status, self.message)
        } else {
            write!(f, "HTTP {} {}: {}", self.status, self.type_id, self.message)
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every failure a session operation can report.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The server rejected the request (validation, not-found, conflict,
    /// authentication, ...). Distinguish by [`ProtocolError::status`] and
    /// [`ProtocolError::type_id`].
    #[error("{0}")]
    Protocol(Box<ProtocolError>),

    /// The server asked for a fresh CSRF token.
    ///
    /// Recovered transparently by the session engine's retry policy; callers
    /// only see it when recovery itself failed.
    #[error("CSRF token required: {message}")]
    CsrfRequired {
        /// Message sent with the rejection, or the status text.
        message: String,
    },

    /// No usable reply arrived (connection, TLS, timeout, ...).
    #[error("Transport error: {0}")]
    Transport(TransportFault),

    /// The client was configured or used in a way it cannot honour.
    ///
    /// Produced locally; never the result of a server reply.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// HTTP status code, when the failure came from a reply.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Protocol(e) => Some(e.status),
            Error::CsrfRequired { .. } => Some(403),
            Error::Transport(fault) => fault.response.as_ref().map(|r| r.status),
            Error::Configuration { .. } => None,
        }
    }

    /// The structured rejection, if this is one.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if the server demanded a fresh CSRF token, either via
    /// the dedicated marker or via a 403 whose message names the CSRF check.
    pub fn is_csrf_error(&self) -> bool {
        match self {
            Error::CsrfRequired { .. } => true,
            Error::Protocol(e) => e.status == 403 && e.message.to_ascii_lowercase().contains("csrf"),
            _ => false,
        }
    }

    /// Returns `true` for failures a fresh login can cure: CSRF rejections,
    /// 401, and expired sessions.
    ///
    /// This is the predicate the session engine's re-login retry keys off.
    pub fn is_login_error(&self) -> bool {
        if self.is_csrf_error() {
            return true;
        }
        match self {
            Error::Protocol(e) => {
                e.status == 401 || e.message.trim().eq_ignore_ascii_case("session timed out")
            }
            _ => false,
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(Box::new(e))
    }
}
