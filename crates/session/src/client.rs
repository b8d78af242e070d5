//! The client facade.
//!
//! Owns one [`SessionEngine`] and exposes session control plus a few
//! convenience operations. Everything else builds on [`AdtClient::request`];
//! response bodies are returned as text and never parsed here.

use std::collections::BTreeMap;
use std::sync::Arc;

use http_transport::HttpTransport;
use protocol::{
    CsrfToken, NegotiatedSessionType, RequestOptions, Result, SessionType, TokenSupplier,
    Transport, TransportResponse,
};

use crate::config::{SessionConfig, DISCOVERY_PATH, REENTRANCE_TICKET_PATH};
use crate::engine::SessionEngine;

/// An ADT client bound to one session.
#[derive(Clone)]
pub struct AdtClient {
    engine: SessionEngine,
}

impl AdtClient {
    /// Creates a client that talks HTTP(S) using the transport settings in
    /// `config`.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.http())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client over any [`Transport`].
    pub fn with_transport(config: SessionConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Ok(Self {
            engine: SessionEngine::new(config, transport)?,
        })
    }

    /// The underlying engine.
    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    // -----------------------------------------------------------------------
    // Session control
    // -----------------------------------------------------------------------

    pub async fn login(&self) -> Result<()> {
        self.engine.login().await
    }

    pub async fn logout(&self) -> Result<()> {
        self.engine.logout().await
    }

    pub async fn drop_session(&self) -> Result<()> {
        self.engine.drop_session().await
    }

    /// A client over this session's stateless clone.
    pub fn stateless_clone(&self) -> Result<AdtClient> {
        Ok(Self {
            engine: self.engine.stateless_clone()?,
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.engine.is_logged_in()
    }

    pub fn is_stateful(&self) -> bool {
        self.engine.is_stateful()
    }

    /// Shorthand for switching between stateful and stateless.
    pub fn set_stateful(&self, stateful: bool) -> Result<()> {
        self.engine.set_session_type(if stateful {
            SessionType::Stateful
        } else {
            SessionType::Stateless
        })
    }

    pub fn session_type(&self) -> SessionType {
        self.engine.session_type()
    }

    pub fn set_session_type(&self, session_type: SessionType) -> Result<()> {
        self.engine.set_session_type(session_type)
    }

    pub fn negotiated_session_type(&self) -> NegotiatedSessionType {
        self.engine.negotiated_session_type()
    }

    pub fn csrf_token(&self) -> CsrfToken {
        self.engine.csrf_token()
    }

    pub fn cookies(&self) -> BTreeMap<String, String> {
        self.engine.cookies()
    }

    pub fn session_id(&self) -> Option<String> {
        self.engine.session_id()
    }

    pub fn set_token_supplier(&self, supplier: Arc<dyn TokenSupplier>) {
        self.engine.set_token_supplier(supplier)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Sends an arbitrary call through the session.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<TransportResponse> {
        self.engine.request(path, options).await
    }

    /// The raw discovery document.
    pub async fn discovery(&self) -> Result<String> {
        Ok(self.request(DISCOVERY_PATH, RequestOptions::get()).await?.body)
    }

    /// A single-use ticket for opening this session elsewhere.
    pub async fn reentrance_ticket(&self) -> Result<String> {
        let response = self
            .request(REENTRANCE_TICKET_PATH, RequestOptions::get())
            .await?;
        Ok(response.body.trim().to_string())
    }

    /// Source text of the object at `source_url`.
    pub async fn object_source(&self, source_url: &str) -> Result<String> {
        Ok(self.request(source_url, RequestOptions::get()).await?.body)
    }

    /// Replaces the source text of a locked object.
    ///
    /// `lock_handle` comes from a prior lock call on a stateful session;
    /// `transport` is the change request to record the edit under, if any.
    pub async fn set_object_source(
        &self,
        source_url: &str,
        source: &str,
        lock_handle: &str,
        transport: Option<&str>,
    ) -> Result<()> {
        let mut options = RequestOptions::put()
            .header("content-type", "text/plain; charset=utf-8")
            .query("lockHandle", lock_handle)
            .body(source);
        if let Some(transport) = transport {
            options = options.query("corrNr", transport);
        }
        self.request(source_url, options).await?;
        Ok(())
    }
}

impl std::fmt::Debug for AdtClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdtClient")
            .field("instance", &self.engine.instance_id())
            .field("address", &self.engine.config().effective_address())
            .field("logged_in", &self.engine.is_logged_in())
            .finish()
    }
}
