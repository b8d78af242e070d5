//! Mutable per-engine session state.
//!
//! Owned by exactly one engine and guarded by a short, never-held-across-await
//! lock. Only the response path of the underlying call and login/logout
//! mutate it.

use std::sync::Arc;

use protocol::types::{CSRF_TOKEN_HEADER, SESSION_TYPE_HEADER};
use protocol::{
    Auth, CookieJar, CsrfToken, NegotiatedSessionType, SessionType, TokenSupplier,
    TransportResponse,
};

pub(crate) struct SessionState {
    pub cookies: CookieJar,
    pub csrf: CsrfToken,
    pub requested: SessionType,
    pub negotiated: NegotiatedSessionType,
    /// Auth attached to calls; a bearer token cached here is reused by login.
    pub auth: Option<Auth>,
    /// Cleared by logout; a bearer session then needs a fresh supplier.
    pub supplier: Option<Arc<dyn TokenSupplier>>,
}

impl SessionState {
    pub fn new(requested: SessionType, supplier: Option<Arc<dyn TokenSupplier>>) -> Self {
        Self {
            cookies: CookieJar::new(),
            csrf: CsrfToken::Fetch,
            requested,
            negotiated: NegotiatedSessionType::Stateless,
            auth: None,
            supplier,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        !self.csrf.is_fetch()
    }

    pub fn is_stateful(&self) -> bool {
        match self.requested {
            SessionType::Stateful => true,
            SessionType::Stateless => false,
            SessionType::Keep => self.negotiated == NegotiatedSessionType::Stateful,
        }
    }

    pub fn has_cached_bearer(&self) -> bool {
        matches!(self.auth, Some(Auth::Bearer(_)))
    }

    /// Learns from any reply: cookies always, the CSRF token only while the
    /// sentinel is held, the negotiated type only on success.
    pub fn absorb(&mut self, response: &TransportResponse) {
        self.cookies.update_from(&response.headers);

        if self.csrf.is_fetch() {
            if let Some(value) = response.headers.get(CSRF_TOKEN_HEADER) {
                self.csrf = CsrfToken::from_header(value);
            }
        }

        if response.is_success() {
            self.negotiated = match self.requested.forced() {
                Some(forced) => forced,
                None => response
                    .headers
                    .get(SESSION_TYPE_HEADER)
                    .and_then(NegotiatedSessionType::from_header)
                    .unwrap_or(self.negotiated),
            };
        }
    }

    /// Forgets everything tied to the current server session, credentials included.
    pub fn reset_for_logout(&mut self) {
        self.auth = None;
        self.supplier = None;
        self.cookies.clear();
        self.csrf = CsrfToken::Fetch;
    }
}
