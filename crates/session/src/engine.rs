//! The session engine.
//!
//! Guarantees that every outgoing call carries a valid session context and
//! recovers transparently from one class of failure: an authentication
//! error on a stateless session that was already logged in.
//!
//! ## Call flow
//!
//! 1. [`SessionEngine::request`] logs in first when no CSRF token is held.
//! 2. The underlying call merges headers, attaches cookies and auth, and
//!    hands the resolved request to the [`Transport`].
//! 3. The reply updates cookies and (while the sentinel is held) the CSRF
//!    token; a status ≥ 400 is classified and raised.
//! 4. A login error on a call that did not itself auto-login, outside a
//!    stateful session, triggers exactly one re-login and replay.
//!
//! Stateful sessions never auto-retry; a re-login would lose server-side locks.
//!
//! ## Concurrency
//!
//! Calls are not serialised against each other. Login is: concurrent
//! callers share one spawned login task, which runs to completion even if
//! all of them stop waiting.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use protocol::types::{CSRF_TOKEN_HEADER, SESSION_TYPE_HEADER};
use protocol::{
    classify, merge_query, Auth, CsrfToken, Error, FaultKind, Headers, InstanceId,
    NegotiatedSessionType, RequestContext, RequestOptions, RequestRecord, RequestSequence, Result,
    SessionType, TokenSupplier, Transport, TransportFault, TransportRequest, TransportResponse,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{SessionConfig, DISCOVERY_PATH, LOGOFF_PATH};
use crate::keep_alive;
use crate::state::SessionState;

type SharedLogin = Shared<BoxFuture<'static, Result<()>>>;

// ---------------------------------------------------------------------------
// Engine handle
// ---------------------------------------------------------------------------

/// A cheap, cloneable handle to one session.
///
/// Clones of the handle share the same session. A *stateless clone*
/// ([`SessionEngine::stateless_clone`]) is a different session.
#[derive(Clone)]
pub struct SessionEngine {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    id: InstanceId,
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<SessionState>,
    sequence: AtomicU64,
    /// Set at the end of each keep-alive tick, cleared by every call.
    needs_keep_alive: AtomicBool,
    login_in_flight: Mutex<Option<SharedLogin>>,
    pinned_stateless: bool,
    stateless_clone: Mutex<Option<SessionEngine>>,
    keep_alive: Mutex<Option<JoinHandle<()>>>,
}

impl SessionEngine {
    /// Creates a session over `transport`.
    ///
    /// Arms the keep-alive task when configured, which requires a running
    /// Tokio runtime.
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::build(config, transport, false)
    }

    fn build(config: SessionConfig, transport: Arc<dyn Transport>, pinned_stateless: bool) -> Result<Self> {
        let requested = if pinned_stateless {
            SessionType::Stateless
        } else {
            SessionType::Keep
        };
        let supplier = config.credentials().supplier().cloned();
        let keep_alive_period = config.keep_alive();

        let inner = Arc::new(Inner {
            id: InstanceId::new_random(),
            config,
            transport,
            state: Mutex::new(SessionState::new(requested, supplier)),
            sequence: AtomicU64::new(0),
            needs_keep_alive: AtomicBool::new(false),
            login_in_flight: Mutex::new(None),
            pinned_stateless,
            stateless_clone: Mutex::new(None),
            keep_alive: Mutex::new(None),
        });

        if let Some(period) = keep_alive_period {
            let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
                Error::configuration("keep-alive needs a running Tokio runtime at construction")
            })?;
            let handle = runtime.spawn(keep_alive::run(Arc::downgrade(&inner), period));
            *inner.keep_alive.lock() = Some(handle);
        }

        debug!(
            instance = %inner.id,
            address = inner.config.effective_address(),
            user = %inner.config.username(),
            stateless_clone = pinned_stateless,
            "session created"
        );
        Ok(Self { inner })
    }

    // -----------------------------------------------------------------------
    // Observable state
    // -----------------------------------------------------------------------

    /// Identifies this engine in logs and diagnostic records.
    pub fn instance_id(&self) -> InstanceId {
        self.inner.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// `true` iff a CSRF token (not the sentinel) is held.
    pub fn is_logged_in(&self) -> bool {
        self.inner.state.lock().is_logged_in()
    }

    /// `true` when stateful is forced, or when keeping a stateful negotiation.
    pub fn is_stateful(&self) -> bool {
        self.inner.state.lock().is_stateful()
    }

    pub fn csrf_token(&self) -> CsrfToken {
        self.inner.state.lock().csrf.clone()
    }

    /// Cookie name to `name=value` fragment.
    pub fn cookies(&self) -> BTreeMap<String, String> {
        self.inner.state.lock().cookies.snapshot()
    }

    /// Value of the server session cookie, once one was set.
    pub fn session_id(&self) -> Option<String> {
        self.inner.state.lock().cookies.session_id().map(str::to_string)
    }

    /// The session type sent on each call.
    pub fn session_type(&self) -> SessionType {
        self.inner.state.lock().requested
    }

    /// The session type last observed from the server.
    pub fn negotiated_session_type(&self) -> NegotiatedSessionType {
        self.inner.state.lock().negotiated
    }

    /// `true` for a stateless clone.
    pub fn is_stateless_clone(&self) -> bool {
        self.inner.pinned_stateless
    }

    // -----------------------------------------------------------------------
    // Session control
    // -----------------------------------------------------------------------

    /// Changes the session type sent from the next call on.
    ///
    /// Fails on a stateless clone, whatever the requested type.
    pub fn set_session_type(&self, session_type: SessionType) -> Result<()> {
        if self.inner.pinned_stateless {
            return Err(Error::configuration(
                "the session type of a stateless clone cannot be changed",
            ));
        }
        self.inner.state.lock().requested = session_type;
        Ok(())
    }

    /// Installs a fresh token supplier, dropping any cached bearer token.
    ///
    /// The only way a bearer session can log in again after [`Self::logout`].
    pub fn set_token_supplier(&self, supplier: Arc<dyn TokenSupplier>) {
        let mut state = self.inner.state.lock();
        if state.has_cached_bearer() {
            state.auth = None;
        }
        state.supplier = Some(supplier);
    }

    /// Logs in, or joins the login already in flight.
    ///
    /// The login keeps running when the caller stops waiting.
    pub async fn login(&self) -> Result<()> {
        let pending = {
            let mut slot = self.inner.login_in_flight.lock();
            match slot.as_ref() {
                Some(in_flight) => in_flight.clone(),
                None => {
                    // Own task: finishes and clears the slot with no awaiter left.
                    let inner = Arc::clone(&self.inner);
                    let task = tokio::spawn(async move {
                        let outcome = inner.perform_login().await;
                        inner.login_in_flight.lock().take();
                        outcome
                    });
                    let login: SharedLogin = task
                        .map(|joined| {
                            joined.unwrap_or_else(|e| {
                                Err(Error::Transport(TransportFault::new(
                                    FaultKind::Other,
                                    format!("login task failed: {e}"),
                                )))
                            })
                        })
                        .boxed()
                        .shared();
                    *slot = Some(login.clone());
                    login
                }
            }
        };
        pending.await
    }

    /// Ends the server session and forgets the credentials.
    ///
    /// Local state is cleared even when the logoff call fails; the failure
    /// is still reported. A password session can log in again afterwards,
    /// a bearer session only after [`Self::set_token_supplier`].
    pub async fn logout(&self) -> Result<()> {
        self.inner.state.lock().requested = SessionType::Stateless;
        let outcome = self.inner.call(LOGOFF_PATH, &RequestOptions::get()).await;
        self.inner.state.lock().reset_for_logout();
        info!(instance = %self.inner.id, ok = outcome.is_ok(), "logged out");
        outcome.map(|_| ())
    }

    /// Switches to stateless and releases any stateful server context,
    /// keeping credentials and login.
    pub async fn drop_session(&self) -> Result<()> {
        let logged_in = {
            let mut state = self.inner.state.lock();
            state.requested = SessionType::Stateless;
            state.is_logged_in()
        };
        if logged_in {
            self.inner.call(DISCOVERY_PATH, &RequestOptions::get()).await?;
        }
        info!(instance = %self.inner.id, "session dropped");
        Ok(())
    }

    /// The stateless clone of this session, created on first use.
    ///
    /// Shares configuration and transport, owns its own cookies and token,
    /// and is pinned to stateless. The clone of a clone is itself.
    pub fn stateless_clone(&self) -> Result<SessionEngine> {
        if self.inner.pinned_stateless {
            return Ok(self.clone());
        }
        let mut slot = self.inner.stateless_clone.lock();
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }
        let created = Self::build(
            self.inner.config.clone(),
            Arc::clone(&self.inner.transport),
            true,
        )?;
        *slot = Some(created.clone());
        Ok(created)
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Sends one call with the session context attached.
    ///
    /// Logs in first when needed. On a login error, when this call did not
    /// auto-login and the session is not stateful, resets the token, logs in
    /// again and replays the call once. Anything else propagates unchanged.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<TransportResponse> {
        let mut auto_login = false;
        if !self.is_logged_in() {
            self.login().await?;
            auto_login = true;
        }

        match self.inner.call(path, &options).await {
            Ok(response) => Ok(response),
            Err(error) if error.is_login_error() && !auto_login && !self.is_stateful() => {
                warn!(
                    instance = %self.inner.id,
                    path,
                    error = %error,
                    "authentication failure, logging in again"
                );
                self.inner.state.lock().csrf = CsrfToken::Fetch;
                self.login().await?;
                self.inner.call(path, &options).await
            }
            Err(error) => Err(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

impl Inner {
    pub(crate) fn is_logged_in(&self) -> bool {
        self.state.lock().is_logged_in()
    }

    pub(crate) fn needs_keep_alive(&self) -> bool {
        self.needs_keep_alive.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_idle(&self) {
        self.needs_keep_alive.store(true, Ordering::SeqCst);
    }

    pub(crate) fn instance_id(&self) -> InstanceId {
        self.id
    }

    async fn perform_login(&self) -> Result<()> {
        info!(instance = %self.id, user = %self.config.username(), "logging in");

        let supplier = {
            let mut state = self.state.lock();
            state.cookies.clear();
            if state.has_cached_bearer() {
                None
            } else if let Some(supplier) = state.supplier.clone() {
                Some(supplier)
            } else if let Some(password) = self.config.credentials().password() {
                state.auth = Some(Auth::Basic {
                    username: self.config.username().to_string(),
                    password: password.to_string(),
                });
                None
            } else {
                return Err(Error::configuration(
                    "no credentials available: install a fresh token supplier to log in again",
                ));
            }
        };

        if let Some(supplier) = supplier {
            let token = supplier.fetch_token().await?;
            self.state.lock().auth = Some(Auth::Bearer(token));
        }

        self.state.lock().csrf = CsrfToken::Fetch;
        self.call(DISCOVERY_PATH, &RequestOptions::get()).await?;

        let logged_in = self.is_logged_in();
        if logged_in {
            info!(instance = %self.id, "logged in");
        } else {
            warn!(instance = %self.id, "login reply carried no CSRF token");
        }
        Ok(())
    }

    /// The underlying call: no login, no retry.
    pub(crate) async fn call(&self, path: &str, options: &RequestOptions) -> Result<TransportResponse> {
        self.needs_keep_alive.store(false, Ordering::SeqCst);
        let sequence = RequestSequence::new(self.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        let context = RequestContext::begin(sequence, path, options);
        let (request, session_type) = self.resolve(&context, options);

        debug!(instance = %self.id, seq = %sequence, method = %context.method, path, "request");
        let outcome = match self.transport.send(request).await {
            Ok(response) => {
                self.state.lock().absorb(&response);
                if response.is_success() {
                    Ok(response)
                } else {
                    Err(classify(response))
                }
            }
            Err(fault) => Err(classify(fault)),
        };

        self.report(&context, session_type, &outcome);
        outcome
    }

    /// Builds the transport request from the current state.
    fn resolve(&self, context: &RequestContext, options: &RequestOptions) -> (TransportRequest, SessionType) {
        let state = self.state.lock();

        let mut headers: Headers = [
            ("accept", "*/*"),
            ("cache-control", "no-cache"),
            (CSRF_TOKEN_HEADER, state.csrf.as_str()),
        ]
        .into_iter()
        .collect();
        headers.merge(self.config.headers());
        headers.merge(&context.headers);
        headers.insert(SESSION_TYPE_HEADER, state.requested.header_value());
        if !headers.contains("cookie") {
            if let Some(cookie) = state.cookies.header_value() {
                headers.insert("cookie", cookie);
            }
        }

        let auth = options
            .auth
            .clone()
            .or_else(|| self.config.basic_auth().cloned())
            .or_else(|| state.auth.clone());

        let request = TransportRequest {
            method: context.method,
            url: self.url_for(&context.path),
            headers,
            query: merge_query(&self.config.default_query(), &context.query),
            body: context.body.clone(),
            timeout: options.timeout.or(self.config.timeout()),
            auth,
        };
        (request, state.requested)
    }

    fn url_for(&self, path: &str) -> String {
        let lower = path.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return path.to_string();
        }
        let address = self.config.effective_address();
        if path.starts_with('/') {
            format!("{address}{path}")
        } else {
            format!("{address}/{path}")
        }
    }

    fn report(&self, context: &RequestContext, session_type: SessionType, outcome: &Result<TransportResponse>) {
        let elapsed_ms = u64::try_from(context.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = match outcome {
            Ok(response) => Some(response.status),
            Err(error) => error.status(),
        };

        match outcome {
            Ok(_) => debug!(
                instance = %self.id,
                seq = %context.sequence,
                status,
                elapsed_ms,
                "response"
            ),
            Err(error) => debug!(
                instance = %self.id,
                seq = %context.sequence,
                status,
                elapsed_ms,
                error = %error,
                "request failed"
            ),
        }

        if let Some(sink) = self.config.diagnostic_sink() {
            sink.record(&RequestRecord {
                instance: self.id,
                sequence: context.sequence,
                method: context.method,
                path: context.path.clone(),
                session_type: session_type.header_value().to_string(),
                started: context.started,
                elapsed_ms,
                status,
                error: outcome.as_ref().err().map(Error::to_string),
            });
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.keep_alive.get_mut().take() {
            handle.abort();
        }
    }
}
