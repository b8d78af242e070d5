//! Session configuration.
//!
//! A [`SessionConfig`] is immutable once built; a stateless clone shares the
//! same configuration with its parent. Validation happens in
//! [`SessionConfigBuilder::build`] so an engine never starts with settings
//! it cannot honour.

use std::sync::Arc;
use std::time::Duration;

use http_transport::HttpTransportConfig;
use protocol::{
    Auth, Credentials, DiagnosticSink, Error, Headers, Language, Result, SystemClient,
    TokenSupplier, Username,
};

// ---------------------------------------------------------------------------
// Well-known endpoints
// ---------------------------------------------------------------------------

/// Cheap, stable endpoint used to obtain a token and cookies, to drop a
/// stateful context, and as the keep-alive ping.
pub const DISCOVERY_PATH: &str = "/sap/bc/adt/compatibility/graph";

/// Ends the server session.
pub const LOGOFF_PATH: &str = "/sap/public/bc/icf/logoff";

/// Issues a single-use ticket for opening the session in a browser.
pub const REENTRANCE_TICKET_PATH: &str = "/sap/bc/adt/security/reentranceticket";

/// Interval between keep-alive ticks unless configured otherwise.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything a session engine needs to know before its first call.
#[derive(Clone)]
pub struct SessionConfig {
    base_address: String,
    base_address_override: Option<String>,
    username: Username,
    credentials: Credentials,
    client: Option<SystemClient>,
    language: Option<Language>,
    headers: Headers,
    timeout: Option<Duration>,
    basic_auth: Option<Auth>,
    keep_alive: Option<Duration>,
    diagnostic_sink: Option<Arc<dyn DiagnosticSink>>,
    http: HttpTransportConfig,
}

impl SessionConfig {
    /// Starts a builder for the system at `base_address`, logging on as `username`.
    pub fn builder(base_address: impl Into<String>, username: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder {
            base_address: base_address.into(),
            username: username.into(),
            ..SessionConfigBuilder::default()
        }
    }

    /// The configured base address, without a trailing slash.
    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// Address calls are actually sent to: the override when set.
    pub fn effective_address(&self) -> &str {
        self.base_address_override
            .as_deref()
            .unwrap_or(&self.base_address)
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn client(&self) -> Option<&SystemClient> {
        self.client.as_ref()
    }

    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    /// Extra headers sent on every call.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Default pass-through timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Auth that replaces the session's own on every call.
    pub fn basic_auth(&self) -> Option<&Auth> {
        self.basic_auth.as_ref()
    }

    /// Keep-alive period, `None` when disabled.
    pub fn keep_alive(&self) -> Option<Duration> {
        self.keep_alive
    }

    pub fn diagnostic_sink(&self) -> Option<&Arc<dyn DiagnosticSink>> {
        self.diagnostic_sink.as_ref()
    }

    /// Settings for the default HTTP transport.
    pub fn http(&self) -> &HttpTransportConfig {
        &self.http
    }

    /// Query parameters sent on every call (`sap-client`, `sap-language`).
    pub fn default_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(client) = &self.client {
            query.push(("sap-client".to_string(), client.to_string()));
        }
        if let Some(language) = &self.language {
            query.push(("sap-language".to_string(), language.to_string()));
        }
        query
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("base_address", &self.base_address)
            .field("base_address_override", &self.base_address_override)
            .field("username", &self.username)
            .field("credentials", &self.credentials)
            .field("client", &self.client)
            .field("language", &self.language)
            .field("timeout", &self.timeout)
            .field("keep_alive", &self.keep_alive)
            .field("diagnostic_sink", &self.diagnostic_sink.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`SessionConfig`].
#[derive(Default)]
pub struct SessionConfigBuilder {
    base_address: String,
    username: String,
    password: Option<String>,
    token_supplier: Option<Arc<dyn TokenSupplier>>,
    client: Option<String>,
    language: Option<String>,
    headers: Headers,
    timeout: Option<Duration>,
    basic_auth: Option<Auth>,
    keep_alive: bool,
    keep_alive_interval: Option<Duration>,
    diagnostic_sink: Option<Arc<dyn DiagnosticSink>>,
    base_address_override: Option<String>,
    http: HttpTransportConfig,
}

impl SessionConfigBuilder {
    /// Authenticate with HTTP basic auth.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Authenticate with a bearer token from `supplier`. Takes precedence
    /// over a password.
    pub fn token_supplier(mut self, supplier: impl TokenSupplier + 'static) -> Self {
        self.token_supplier = Some(Arc::new(supplier));
        self
    }

    /// Same as [`Self::token_supplier`] for an already shared supplier.
    pub fn shared_token_supplier(mut self, supplier: Arc<dyn TokenSupplier>) -> Self {
        self.token_supplier = Some(supplier);
        self
    }

    pub fn client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Adds a header sent on every call.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends these basic credentials on every call instead of the session's.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(Auth::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Arms the background keep-alive ping.
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    /// Keep-alive period; implies [`Self::keep_alive`]`(true)`.
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive = true;
        self.keep_alive_interval = Some(interval);
        self
    }

    pub fn diagnostic_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diagnostic_sink = Some(Arc::new(sink));
        self
    }

    /// Sends calls to `address` instead of the base address.
    pub fn base_address_override(mut self, address: impl Into<String>) -> Self {
        self.base_address_override = Some(address.into());
        self
    }

    /// Settings for the default HTTP transport (TLS, connect timeout, user agent).
    pub fn http(mut self, http: HttpTransportConfig) -> Self {
        self.http = http;
        self
    }

    /// Validates and freezes the configuration.
    ///
    /// Fails with [`Error::Configuration`] when the base address, the
    /// username, or both credential sources are missing, or when an address
    /// is not an `http(s)` URL.
    pub fn build(self) -> Result<SessionConfig> {
        let base_address = normalise_address(&self.base_address)?;
        let base_address_override = self
            .base_address_override
            .as_deref()
            .map(normalise_address)
            .transpose()?;
        let username = Username::new(self.username)
            .ok_or_else(|| Error::configuration("a username is required"))?;
        let credentials = match (self.token_supplier, self.password) {
            (Some(supplier), _) => Credentials::Token(supplier),
            (None, Some(password)) if !password.is_empty() => Credentials::Password(password),
            _ => {
                return Err(Error::configuration(
                    "a password or a bearer token supplier is required",
                ))
            }
        };
        let client = optional(self.client, |v| SystemClient::new(v), "client")?;
        let language = optional(self.language, |v| Language::new(v), "language")?;
        let keep_alive = self
            .keep_alive
            .then(|| self.keep_alive_interval.unwrap_or(DEFAULT_KEEP_ALIVE_INTERVAL));
        if keep_alive.is_some_and(|d| d.is_zero()) {
            return Err(Error::configuration("keep-alive interval must be positive"));
        }

        Ok(SessionConfig {
            base_address,
            base_address_override,
            username,
            credentials,
            client,
            language,
            headers: self.headers,
            timeout: self.timeout,
            basic_auth: self.basic_auth,
            keep_alive,
            diagnostic_sink: self.diagnostic_sink,
            http: self.http,
        })
    }
}

fn normalise_address(address: &str) -> Result<String> {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::configuration("a base address is required"));
    }
    let lower = trimmed.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(Error::configuration(format!(
            "base address must be an http(s) URL, got '{trimmed}'"
        )));
    }
    Ok(trimmed.to_string())
}

fn optional<T>(value: Option<String>, make: fn(String) -> Option<T>, what: &str) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(v) => make(v)
            .map(Some)
            .ok_or_else(|| Error::configuration(format!("{what} must not be blank"))),
    }
}
