//! HTTP transport adapter.
//!
//! Implements the [`protocol::Transport`] trait on top of `reqwest`. One
//! [`HttpTransport`] wraps one connection-pooling `reqwest::Client`; the
//! session engine owns the cookies, so the client's own cookie store stays
//! disabled.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** TLS policy, connection timeouts, header and auth
//! mapping, and fault categorisation live here. The session engine sees only
//! [`protocol::Transport`].
//!
//! ## TLS
//!
//! [`HttpTransportConfig`] covers what an "https agent" would elsewhere:
//! extra root certificates for systems signed by an internal CA, and an
//! opt-in switch that accepts any certificate (development systems only).

use std::time::Duration;

use async_trait::async_trait;
use protocol::{
    Auth, FaultKind, Headers, HttpMethod, Transport, TransportFault, TransportRequest,
    TransportResponse,
};
use thiserror::Error;
use tracing::{debug, trace};

/// User agent sent unless configured otherwise.
pub const DEFAULT_USER_AGENT: &str = concat!("adt-session/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings for the underlying HTTP client.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Accept invalid or self-signed server certificates.
    pub accept_invalid_certs: bool,

    /// PEM-encoded certificates trusted in addition to the built-in roots.
    pub root_certificates: Vec<Vec<u8>>,

    /// Limit on establishing a connection. `None` uses the client default.
    pub connect_timeout: Option<Duration>,

    /// Default total timeout per call; a per-call timeout overrides it.
    pub timeout: Option<Duration>,

    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            accept_invalid_certs: false,
            root_certificates: Vec::new(),
            connect_timeout: Some(Duration::from_secs(30)),
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Reasons an [`HttpTransport`] could not be built.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid root certificate #{index}: {source}")]
    InvalidCertificate {
        index: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP client could not be initialised: {0}")]
    Client(#[source] reqwest::Error),
}

impl From<BuildError> for protocol::Error {
    fn from(e: BuildError) -> Self {
        protocol::Error::configuration(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// [`Transport`] over HTTP(S) using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport with the given settings.
    pub fn new(config: &HttpTransportConfig) -> Result<Self, BuildError> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(config.user_agent.clone());

        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        for (index, pem) in config.root_certificates.iter().enumerate() {
            let certificate = reqwest::Certificate::from_pem(pem)
                .map_err(|source| BuildError::InvalidCertificate { index, source })?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder.build().map_err(BuildError::Client)?;
        Ok(Self { client })
    }

    /// Wraps an existing client. Its cookie store, if any, must be disabled.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFault> {
        let TransportRequest {
            method,
            url,
            headers,
            query,
            body,
            timeout,
            auth,
        } = request;

        let mut builder = self.client.request(to_reqwest_method(method), &url);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        builder = match auth {
            Some(Auth::Basic { username, password }) => builder.basic_auth(username, Some(password)),
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            None => builder,
        };
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        trace!(%method, %url, "sending");
        let response = builder.send().await.map_err(fault_from)?;

        let status = response.status();
        let headers: Headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.map_err(fault_from)?;

        debug!(%method, %url, status = status.as_u16(), bytes = body.len(), "received");
        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Patch => reqwest::Method::PATCH,
    }
}

fn fault_from(e: reqwest::Error) -> TransportFault {
    let kind = if e.is_timeout() {
        FaultKind::Timeout
    } else if e.is_connect() {
        FaultKind::Connect
    } else if e.is_builder() {
        FaultKind::Request
    } else if e.is_body() || e.is_decode() {
        FaultKind::Body
    } else {
        FaultKind::Other
    };
    TransportFault::new(kind, e.to_string())
}
