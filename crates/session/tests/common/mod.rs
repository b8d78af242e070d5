// Shared harness for the session integration tests.
//
// `ScriptedTransport` records every request it is handed and answers from a
// per-path queue of scripted replies, falling back to a per-path default.
// Paths are matched on the URL with the base address stripped.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use protocol::{Transport, TransportFault, TransportRequest, TransportResponse};
use session::{AdtClient, SessionConfig, SessionConfigBuilder, DISCOVERY_PATH};

pub const BASE: &str = "http://adt.test:8000";

pub type Reply = Result<TransportResponse, TransportFault>;

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Reply>>,
    fallback: HashMap<String, Reply>,
    requests: Vec<TransportRequest>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every reply is delayed, so concurrent callers overlap.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queues a one-shot reply for `path`.
    pub fn push(&self, path: &str, reply: Reply) -> &Self {
        self.script
            .lock()
            .queued
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply used for `path` once its queue is empty.
    pub fn always(&self, path: &str, reply: Reply) -> &Self {
        self.script.lock().fallback.insert(path.to_string(), reply);
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.script.lock().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|r| path_of(&r.url) == path)
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    /// Live handles to this transport, the test's own included.
    pub fn handles(&self) -> usize {
        Arc::strong_count(&self.script)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFault> {
        let path = path_of(&request.url).to_string();
        let reply = {
            let mut script = self.script.lock();
            script.requests.push(request);
            script
                .queued
                .get_mut(&path)
                .and_then(VecDeque::pop_front)
                .or_else(|| script.fallback.get(&path).cloned())
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        reply.unwrap_or_else(|| Ok(TransportResponse::new(404, format!("no script for {path}"))))
    }
}

fn path_of(url: &str) -> &str {
    url.strip_prefix(BASE).unwrap_or(url)
}

// ---------------------------------------------------------------------------
// Canned replies
// ---------------------------------------------------------------------------

/// Successful discovery reply carrying a token and a session cookie.
pub fn login_ok(token: &str) -> Reply {
    Ok(TransportResponse::new(200, "<app:service/>")
        .with_header("x-csrf-token", token)
        .with_header("set-cookie", "SAP_SESSIONID_A4H_001=s1; path=/")
        .with_header("set-cookie", "sap-usercontext=sap-client=001; path=/"))
}

pub fn ok(body: &str) -> Reply {
    Ok(TransportResponse::new(200, body))
}

pub fn csrf_required() -> Reply {
    Ok(TransportResponse::new(403, "CSRF token validation failed").with_header("x-csrf-token", "Required"))
}

pub fn unauthorized() -> Reply {
    Ok(TransportResponse::new(401, "Logon failed"))
}

pub fn envelope(status: u16, type_id: &str, message: &str) -> Reply {
    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><exc:exception xmlns:exc="http://www.sap.com/abapxml/types/communicationframework"><namespace id="com.sap.adt"/><type id="{type_id}"/><message lang="EN">{message}</message><localizedMessage lang="EN">{message}</localizedMessage><properties><entry key="T100KEY-NO">042</entry></properties></exc:exception>"#
    );
    Ok(TransportResponse::new(status, body))
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

pub fn config() -> SessionConfigBuilder {
    SessionConfig::builder(BASE, "DEVELOPER").password("secret")
}

pub fn client(transport: &ScriptedTransport) -> AdtClient {
    client_with(transport, config())
}

pub fn client_with(transport: &ScriptedTransport, builder: SessionConfigBuilder) -> AdtClient {
    let config = builder.build().expect("valid config");
    AdtClient::with_transport(config, Arc::new(transport.clone())).expect("client")
}

/// A client that is already logged in with `token`.
pub async fn logged_in(transport: &ScriptedTransport, token: &str) -> AdtClient {
    transport.push(DISCOVERY_PATH, login_ok(token));
    let client = client(transport);
    client.login().await.expect("login");
    client
}
