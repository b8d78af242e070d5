//! Per-call options and context.

use std::time::{Duration, Instant};

use crate::{Auth, Headers, HttpMethod, RequestSequence, Timestamp};

/// What an operation asks of a single `request(path, options)` call.
///
/// Everything is optional; the default is a bodyless `GET`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub method: HttpMethod,
    /// Merged over the session's common headers; same-named entries win.
    pub headers: Headers,
    /// Merged over the session's default query; same-named keys win.
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
    /// Replaces the session's auth for this call only.
    pub auth: Option<Auth>,
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn post() -> Self {
        Self::new(HttpMethod::Post)
    }

    pub fn put() -> Self {
        Self::new(HttpMethod::Put)
    }

    pub fn delete() -> Self {
        Self::new(HttpMethod::Delete)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }
}

/// One underlying call as the engine sees it: the resolved options plus a
/// sequence number and start time for observability.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub sequence: RequestSequence,
    pub path: String,
    pub method: HttpMethod,
    pub headers: Headers,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
    pub started: Timestamp,
    started_at: Instant,
}

impl RequestContext {
    /// Starts the clock for a call.
    pub fn begin(sequence: RequestSequence, path: impl Into<String>, options: &RequestOptions) -> Self {
        Self {
            sequence,
            path: path.into(),
            method: options.method,
            headers: options.headers.clone(),
            query: options.query.clone(),
            body: options.body.clone(),
            started: Timestamp::now(),
            started_at: Instant::now(),
        }
    }

    /// Time since [`RequestContext::begin`].
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Overlays `overrides` on `base`, replacing every key `overrides` names.
pub fn merge_query(base: &[(String, String)], overrides: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = base
        .iter()
        .filter(|(k, _)| !overrides.iter().any(|(o, _)| o == k))
        .cloned()
        .collect();
    merged.extend(overrides.iter().cloned());
    merged
}
