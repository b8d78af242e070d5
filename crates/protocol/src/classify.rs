//! Error classification: the single conversion boundary from raw failures to
//! [`Error`].
//!
//! Three raw shapes reach this module:
//!
//! | Input | Result |
//! |-------|--------|
//! | transport fault with no reply | [`Error::Transport`], no parsing attempted |
//! | reply with status ≥ 400 | envelope parsed into [`Error::Protocol`], or [`Error::CsrfRequired`] for a 403 token demand |
//! | an already classified [`Error`] | returned unchanged |
//!
//! The envelope is the server's `exc:exception` document:
//!
//! ```xml
//! <exc:exception xmlns:exc="http://www.sap.com/abapxml/types/communicationframework">
//!   <namespace id="com.sap.adt"/>
//!   <type id="ExceptionResourceNotFound"/>
//!   <message lang="EN">Resource /sap/bc/adt/x does not exist</message>
//!   <localizedMessage lang="EN">Resource /sap/bc/adt/x does not exist</localizedMessage>
//!   <properties><entry key="T100KEY-NO">000</entry></properties>
//! </exc:exception>
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{CSRF_REQUIRED, CSRF_TOKEN_HEADER};
use crate::{Error, ProtocolError, TransportFault, TransportResponse};

static ENVELOPE_ROOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(?:<\?xml[^>]*\?>\s*)?<(?:[A-Za-z_][\w.-]*:)?exception\b")
        .expect("envelope root pattern is valid")
});
static NAMESPACE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<namespace\b[^>]*\bid\s*=\s*"([^"]*)""#).expect("namespace pattern is valid")
});
static TYPE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<type\b[^>]*\bid\s*=\s*"([^"]*)""#).expect("type pattern is valid")
});
static MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<message\b[^>]*>(.*?)</message>").expect("message pattern is valid")
});
static LOCALIZED_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<localizedMessage\b[^>]*>(.*?)</localizedMessage>")
        .expect("localized message pattern is valid")
});
static PROPERTY_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<entry\b[^>]*\bkey\s*=\s*"([^"]*)"[^>]*?(?:/>|>(.*?)</entry>)"#)
        .expect("property entry pattern is valid")
});

// ---------------------------------------------------------------------------
// Input shapes
// ---------------------------------------------------------------------------

/// Anything that can fail a call, before classification.
#[derive(Debug, Clone)]
pub enum RawFailure {
    /// The transport raised instead of returning a reply.
    Fault(TransportFault),
    /// The transport returned a reply with an error status.
    Response(TransportResponse),
    /// Already classified; passes through.
    Classified(Error),
}

impl From<TransportFault> for RawFailure {
    fn from(fault: TransportFault) -> Self {
        RawFailure::Fault(fault)
    }
}

impl From<TransportResponse> for RawFailure {
    fn from(response: TransportResponse) -> Self {
        RawFailure::Response(response)
    }
}

impl From<Error> for RawFailure {
    fn from(error: Error) -> Self {
        RawFailure::Classified(error)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Converts any raw failure into the closed [`Error`] taxonomy.
///
/// Never fails itself: an unreadable envelope degrades to a status-only
/// [`ProtocolError`], and a fault is wrapped without inspecting anything but
/// its attached reply.
pub fn classify(failure: impl Into<RawFailure>) -> Error {
    match failure.into() {
        RawFailure::Classified(error) => error,
        RawFailure::Fault(fault) => match fault.response.as_ref() {
            Some(response) if response.status >= 400 => classify_response(response.clone()),
            _ => Error::Transport(fault),
        },
        RawFailure::Response(response) => classify_response(response),
    }
}

fn classify_response(response: TransportResponse) -> Error {
    if response.status == 403 && requests_fresh_token(&response) {
        let message = parse_envelope(&response)
            .map(|e| e.message)
            .unwrap_or_else(|| response.status_text.clone());
        return Error::CsrfRequired { message };
    }

    let mut error = parse_envelope(&response)
        .unwrap_or_else(|| ProtocolError::from_status(response.status, &response.status_text));
    error.response = Some(response);
    Error::from(error)
}

fn requests_fresh_token(response: &TransportResponse) -> bool {
    response
        .headers
        .get(CSRF_TOKEN_HEADER)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(CSRF_REQUIRED))
}

/// Parses the exception envelope of an error reply.
///
/// Returns `None` when the body is not an envelope.
pub fn parse_envelope(response: &TransportResponse) -> Option<ProtocolError> {
    let body = response.body.as_str();
    if !ENVELOPE_ROOT.is_match(body) {
        return None;
    }

    let capture = |re: &Regex| {
        re.captures(body)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(m.as_str()))
    };

    let mut error = ProtocolError::from_status(response.status, &response.status_text);
    error.namespace = capture(&NAMESPACE_ID).filter(|s| !s.is_empty());
    error.type_id = capture(&TYPE_ID).unwrap_or_default();
    if let Some(message) = capture(&MESSAGE).filter(|s| !s.trim().is_empty()) {
        error.message = message;
    }
    error.localized_message = capture(&LOCALIZED_MESSAGE).filter(|s| !s.is_empty());
    error.properties = PROPERTY_ENTRY
        .captures_iter(body)
        .map(|c| {
            let key = decode_entities(c.get(1).map_or("", |m| m.as_str()));
            let value = decode_entities(c.get(2).map_or("", |m| m.as_str()).trim());
            (key, value)
        })
        .collect::<BTreeMap<_, _>>();

    Some(error)
}

/// Decodes the five predefined XML entities and numeric character references.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
