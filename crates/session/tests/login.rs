// Login, cookies, and the outgoing request shape.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use protocol::{Auth, CsrfToken, Error, FnTokenSupplier, RequestOptions};
use session::DISCOVERY_PATH;

const SOURCE: &str = "/sap/bc/adt/programs/programs/zhello/source/main";

#[tokio::test]
async fn concurrent_logins_share_one_discovery_call() {
    let transport = ScriptedTransport::with_delay(Duration::from_millis(50));
    transport.push(DISCOVERY_PATH, login_ok("tok-A"));
    let client = client(&transport);

    let (a, b, c, d) = tokio::join!(client.login(), client.login(), client.login(), client.login());

    assert!(a.is_ok() && b.is_ok() && c.is_ok() && d.is_ok());
    assert_eq!(transport.count(DISCOVERY_PATH), 1);
    assert_eq!(client.csrf_token(), CsrfToken::Value("tok-A".into()));
}

#[tokio::test]
async fn concurrent_first_requests_log_in_once() {
    let transport = ScriptedTransport::with_delay(Duration::from_millis(20));
    transport.push(DISCOVERY_PATH, login_ok("tok-A"));
    transport.always(SOURCE, ok("REPORT zhello."));
    let client = client(&transport);

    let (a, b) = tokio::join!(
        client.request(SOURCE, RequestOptions::get()),
        client.request(SOURCE, RequestOptions::get())
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(transport.count(DISCOVERY_PATH), 1);
    assert_eq!(transport.count(SOURCE), 2);
}

#[tokio::test]
async fn failed_login_can_be_retried() {
    let transport = ScriptedTransport::new();
    transport.push(DISCOVERY_PATH, unauthorized());
    transport.push(DISCOVERY_PATH, login_ok("tok-A"));
    let client = client(&transport);

    let first = client.login().await.unwrap_err();
    assert_eq!(first.status(), Some(401));
    assert!(!client.is_logged_in());

    client.login().await.unwrap();
    assert!(client.is_logged_in());
}

#[tokio::test]
async fn login_sends_fetch_sentinel_and_basic_auth() {
    let transport = ScriptedTransport::new();
    let _client = logged_in(&transport, "tok-A").await;

    let login = &transport.requests_to(DISCOVERY_PATH)[0];
    assert_eq!(login.headers.get("x-csrf-token"), Some("fetch"));
    assert_eq!(login.headers.get("x-sap-adt-sessiontype"), Some(""));
    assert_eq!(login.headers.get("accept"), Some("*/*"));
    assert_eq!(login.headers.get("cache-control"), Some("no-cache"));
    assert!(login.headers.get("cookie").is_none());
    assert_eq!(
        login.auth,
        Some(Auth::Basic {
            username: "DEVELOPER".into(),
            password: "secret".into()
        })
    );
    assert_eq!(login.url, format!("{BASE}{DISCOVERY_PATH}"));
}

#[tokio::test]
async fn cookies_from_login_are_sent_afterwards() {
    let transport = ScriptedTransport::new();
    transport.always(SOURCE, ok("REPORT zhello."));
    let client = logged_in(&transport, "tok-A").await;

    assert_eq!(client.session_id().as_deref(), Some("s1"));
    assert_eq!(
        client.cookies().get("sap-usercontext").map(String::as_str),
        Some("sap-usercontext=sap-client=001")
    );

    client.request(SOURCE, RequestOptions::get()).await.unwrap();

    let sent = &transport.requests_to(SOURCE)[0];
    assert_eq!(
        sent.headers.get("cookie"),
        Some("SAP_SESSIONID_A4H_001=s1; sap-usercontext=sap-client=001")
    );
    assert_eq!(sent.headers.get("x-csrf-token"), Some("tok-A"));
}

#[tokio::test]
async fn explicit_cookie_header_is_left_alone() {
    let transport = ScriptedTransport::new();
    transport.always(SOURCE, ok(""));
    let client = logged_in(&transport, "tok-A").await;

    client
        .request(SOURCE, RequestOptions::get().header("Cookie", "mine=1"))
        .await
        .unwrap();

    let sent = &transport.requests_to(SOURCE)[0];
    assert_eq!(sent.headers.get_all("cookie").collect::<Vec<_>>(), vec!["mine=1"]);
}

#[tokio::test]
async fn later_set_cookie_replaces_same_name() {
    let transport = ScriptedTransport::new();
    transport.push(
        SOURCE,
        Ok(protocol::TransportResponse::new(200, "")
            .with_header("set-cookie", "SAP_SESSIONID_A4H_001=s2; path=/; HttpOnly")),
    );
    let client = logged_in(&transport, "tok-A").await;

    client.request(SOURCE, RequestOptions::get()).await.unwrap();

    assert_eq!(client.session_id().as_deref(), Some("s2"));
    assert_eq!(client.cookies().len(), 2);
}

#[tokio::test]
async fn token_is_kept_until_reset() {
    let transport = ScriptedTransport::new();
    transport.always(
        SOURCE,
        Ok(protocol::TransportResponse::new(200, "").with_header("x-csrf-token", "tok-other")),
    );
    let client = logged_in(&transport, "tok-A").await;

    client.request(SOURCE, RequestOptions::get()).await.unwrap();

    assert_eq!(client.csrf_token().as_str(), "tok-A");
}

#[tokio::test]
async fn headers_query_and_timeouts_are_merged() {
    let transport = ScriptedTransport::new();
    transport.push(DISCOVERY_PATH, login_ok("tok-A"));
    transport.always(SOURCE, ok(""));
    let client = client_with(
        &transport,
        config()
            .client("001")
            .language("EN")
            .header("x-tool", "adtc")
            .header("accept", "application/xml")
            .timeout(Duration::from_secs(30)),
    );

    client
        .request(
            SOURCE,
            RequestOptions::get()
                .header("Accept", "text/plain")
                .query("sap-client", "100")
                .timeout(Duration::from_secs(2)),
        )
        .await
        .unwrap();

    let login = &transport.requests_to(DISCOVERY_PATH)[0];
    assert_eq!(login.headers.get("accept"), Some("application/xml"));
    assert_eq!(login.timeout, Some(Duration::from_secs(30)));
    assert_eq!(
        login.query,
        vec![
            ("sap-client".to_string(), "001".to_string()),
            ("sap-language".to_string(), "EN".to_string()),
        ]
    );

    let sent = &transport.requests_to(SOURCE)[0];
    assert_eq!(sent.headers.get("accept"), Some("text/plain"));
    assert_eq!(sent.headers.get("x-tool"), Some("adtc"));
    assert_eq!(sent.timeout, Some(Duration::from_secs(2)));
    assert_eq!(
        sent.query,
        vec![
            ("sap-language".to_string(), "EN".to_string()),
            ("sap-client".to_string(), "100".to_string()),
        ]
    );
}

#[tokio::test]
async fn base_address_override_redirects_calls() {
    let transport = ScriptedTransport::new();
    let proxied = format!("http://proxy.test:9000{DISCOVERY_PATH}");
    transport.push(&proxied, login_ok("tok-A"));
    let client = client_with(&transport, config().base_address_override("http://proxy.test:9000/"));

    client.login().await.unwrap();

    assert_eq!(transport.requests()[0].url, proxied);
    assert_eq!(client.engine().config().base_address(), BASE);
}

#[tokio::test]
async fn per_call_auth_overrides_session_auth() {
    let transport = ScriptedTransport::new();
    transport.always(SOURCE, ok(""));
    let client = logged_in(&transport, "tok-A").await;

    client
        .request(SOURCE, RequestOptions::get().auth(Auth::Bearer("other".into())))
        .await
        .unwrap();

    assert_eq!(
        transport.requests_to(SOURCE)[0].auth,
        Some(Auth::Bearer("other".into()))
    );
}

#[tokio::test]
async fn bearer_token_is_fetched_once_and_reused() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let transport = ScriptedTransport::new();
    transport.push(DISCOVERY_PATH, login_ok("tok-A"));
    transport.push(SOURCE, unauthorized());
    transport.always(SOURCE, ok(""));
    transport.always(DISCOVERY_PATH, login_ok("tok-B"));
    let client = client_with(
        &transport,
        common::config().token_supplier(FnTokenSupplier(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("oauth-1".to_string())
            }
        })),
    );

    client.login().await.unwrap();
    // 401 triggers a re-login, which reuses the cached token.
    client.request(SOURCE, RequestOptions::get()).await.unwrap();

    assert_eq!(transport.count(DISCOVERY_PATH), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(transport
        .requests()
        .iter()
        .all(|r| r.auth == Some(Auth::Bearer("oauth-1".into()))));
}

#[tokio::test]
async fn failing_token_supplier_fails_login() {
    let transport = ScriptedTransport::new();
    let client = client_with(
        &transport,
        common::config().token_supplier(FnTokenSupplier(|| async {
            Err(Error::configuration("identity provider unreachable"))
        })),
    );

    let error = client.login().await.unwrap_err();

    assert!(matches!(error, Error::Configuration { .. }));
    assert_eq!(transport.count(DISCOVERY_PATH), 0);
}

#[tokio::test(start_paused = true)]
async fn abandoned_login_still_completes() {
    let transport = ScriptedTransport::with_delay(Duration::from_secs(5));
    transport.push(DISCOVERY_PATH, login_ok("tok-A"));
    let client = client(&transport);

    let abandoned = tokio::time::timeout(Duration::from_secs(1), client.login()).await;
    assert!(abandoned.is_err());
    assert!(!client.is_logged_in());

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(client.is_logged_in());
    assert_eq!(client.csrf_token().as_str(), "tok-A");
    assert_eq!(transport.count(DISCOVERY_PATH), 1);
}
