//! Session cookie jar.
//!
//! The server keeps the logon ticket and the session context in cookies. The
//! jar remembers the `name=value` pair of each `set-cookie` entry, keyed by
//! name, and replays all of them in one `Cookie` header.

use std::collections::BTreeMap;

use cookie::Cookie;
use tracing::{trace, warn};

use crate::Headers;

/// Response header the jar learns from.
pub const SET_COOKIE_HEADER: &str = "set-cookie";

/// Request header the jar is serialised into.
pub const COOKIE_HEADER: &str = "cookie";

/// Prefix of the cookie carrying the server session id.
pub const SESSION_ID_COOKIE_PREFIX: &str = "SAP_SESSIONID";

/// Cookie name to `name=value` fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CookieJar {
    entries: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores one `set-cookie` value, returning whether it parsed.
    ///
    /// Attributes (path, domain, expiry, flags) are directives for the
    /// client and are dropped. The value is kept exactly as sent.
    pub fn store(&mut self, set_cookie: &str) -> bool {
        match Cookie::parse(set_cookie) {
            Ok(cookie) => {
                trace!(name = cookie.name(), "cookie stored");
                self.entries.insert(
                    cookie.name().to_string(),
                    format!("{}={}", cookie.name(), cookie.value()),
                );
                true
            }
            Err(error) => {
                warn!(%error, "ignoring unparsable set-cookie entry");
                false
            }
        }
    }

    /// Stores every `set-cookie` entry of a response, returning how many parsed.
    pub fn update_from(&mut self, headers: &Headers) -> usize {
        headers
            .get_all(SET_COOKIE_HEADER)
            .filter(|value| self.store(value))
            .count()
    }

    /// The `Cookie` request header value, or `None` for an empty jar.
    pub fn header_value(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        Some(
            self.entries
                .values()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Value of the cookie named `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name)
            .and_then(|fragment| fragment.split_once('='))
            .map(|(_, v)| v)
    }

    /// Value of the server session cookie, whatever its suffix.
    pub fn session_id(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name.starts_with(SESSION_ID_COOKIE_PREFIX))
            .and_then(|(_, fragment)| fragment.split_once('='))
            .map(|(_, v)| v)
    }

    /// Name to fragment pairs, for callers that inspect the session.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
