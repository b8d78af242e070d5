//! Shared value types for the session domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! protocol meaning: the CSRF token with its `fetch` sentinel, the three-way
//! session-type request, and a case-insensitive header list that preserves
//! repeated entries such as `set-cookie`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Header names and values
// ---------------------------------------------------------------------------

/// Header carrying the anti-forgery token in both directions.
pub const CSRF_TOKEN_HEADER: &str = "x-csrf-token";

/// Header carrying the requested (outbound) or negotiated (inbound) session type.
pub const SESSION_TYPE_HEADER: &str = "x-sap-adt-sessiontype";

/// Sentinel token value meaning "not logged in, issue me a token".
pub const CSRF_FETCH: &str = "fetch";

/// Token value the server answers with when a fresh token is needed.
pub const CSRF_REQUIRED: &str = "Required";

// ---------------------------------------------------------------------------
// HTTP method
// ---------------------------------------------------------------------------

/// HTTP methods used by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl HttpMethod {
    /// Returns the canonical upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session types
// ---------------------------------------------------------------------------

/// The session type a client asks the server for on each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    /// Pin every call to one server-side work context (required for locks).
    Stateful,
    /// Let the server load-balance every call independently.
    Stateless,
    /// Send no preference; keep whatever the server negotiated last.
    #[default]
    Keep,
}

impl SessionType {
    /// Value sent in the [`SESSION_TYPE_HEADER`]. `Keep` sends an empty value.
    pub fn header_value(self) -> &'static str {
        match self {
            SessionType::Stateful => "stateful",
            SessionType::Stateless => "stateless",
            SessionType::Keep => "",
        }
    }

    /// The negotiated type this request forces, if any.
    pub fn forced(self) -> Option<NegotiatedSessionType> {
        match self {
            SessionType::Stateful => Some(NegotiatedSessionType::Stateful),
            SessionType::Stateless => Some(NegotiatedSessionType::Stateless),
            SessionType::Keep => None,
        }
    }
}

/// The session type the server is observed to be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiatedSessionType {
    Stateful,
    #[default]
    Stateless,
}

impl NegotiatedSessionType {
    /// Parses a [`SESSION_TYPE_HEADER`] value from a response.
    ///
    /// Returns `None` for an empty or unknown value.
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stateful" => Some(NegotiatedSessionType::Stateful),
            "stateless" => Some(NegotiatedSessionType::Stateless),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// CSRF token
// ---------------------------------------------------------------------------

/// The anti-forgery token state of a session.
///
/// `Fetch` is the sentinel meaning "unknown, must be (re)acquired"; a session
/// holding `Fetch` is by definition not logged in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum CsrfToken {
    #[default]
    Fetch,
    Value(String),
}

impl CsrfToken {
    /// Wraps a token received from the server.
    ///
    /// The sentinel itself and the "required" marker are not tokens and map
    /// back to [`CsrfToken::Fetch`].
    pub fn from_header(value: &str) -> Self {
        let v = value.trim();
        if v.is_empty() || v.eq_ignore_ascii_case(CSRF_FETCH) || v.eq_ignore_ascii_case(CSRF_REQUIRED)
        {
            CsrfToken::Fetch
        } else {
            CsrfToken::Value(v.to_string())
        }
    }

    /// Returns `true` while the token still has to be acquired.
    pub fn is_fetch(&self) -> bool {
        matches!(self, CsrfToken::Fetch)
    }

    /// Value to send in the [`CSRF_TOKEN_HEADER`].
    pub fn as_str(&self) -> &str {
        match self {
            CsrfToken::Fetch => CSRF_FETCH,
            CsrfToken::Value(v) => v,
        }
    }
}

impl std::fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// An ordered list of header entries with case-insensitive lookup.
///
/// Repeated names are kept as separate entries so that multi-valued headers
/// such as `set-cookie` survive the trip through a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry without touching existing entries of the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Replaces every entry named `name` with a single entry.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.0.push((name, value.into()));
    }

    /// Removes every entry named `name`.
    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Overlays `other` on top of `self`: every name present in `other`
    /// replaces all of its entries here.
    pub fn merge(&mut self, other: &Headers) {
        for (name, _) in &other.0 {
            self.remove(name);
        }
        self.0.extend(other.0.iter().cloned());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
