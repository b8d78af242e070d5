//! Session domain for the ADT client.
//!
//! This crate contains every value type, identifier, and error type the
//! session engine works with, plus the port traits infrastructure crates
//! implement. It defines *what* a call looks like; the `http-transport`
//! crate defines *how* it reaches the server.
//!
//! ## Architectural Layer
//!
//! **Domain + port definitions.** No I/O dependencies.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`Username`, `SystemClient`, `InstanceId`, ...) |
//! | [`types`] | Value types (`CsrfToken`, `SessionType`, `Headers`, `Timestamp`, ...) |
//! | [`errors`] | The closed [`Error`] taxonomy |
//! | [`classify`] | Raw failure → [`Error`] conversion and envelope parsing |
//! | [`cookies`] | The session [`CookieJar`] |
//! | [`transport`] | The [`Transport`] port and its request/response/fault types |
//! | [`credentials`] | Password and bearer-token credential sources |
//! | [`diagnostics`] | Per-call [`RequestRecord`]s and their sink |
//! | [`request`] | [`RequestOptions`] and [`RequestContext`] |

pub mod classify;
pub mod cookies;
pub mod credentials;
pub mod diagnostics;
pub mod errors;
pub mod identifiers;
pub mod request;
pub mod transport;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use classify::{classify, parse_envelope, RawFailure};
pub use cookies::CookieJar;
pub use credentials::{Credentials, FnTokenSupplier, TokenSupplier};
pub use diagnostics::{DiagnosticSink, MemorySink, RequestRecord};
pub use errors::{Error, ProtocolError, Result};
pub use identifiers::{InstanceId, Language, RequestSequence, SystemClient, Username};
pub use request::{merge_query, RequestContext, RequestOptions};
pub use transport::{Auth, FaultKind, Transport, TransportFault, TransportRequest, TransportResponse};
pub use types::{CsrfToken, Headers, HttpMethod, NegotiatedSessionType, SessionType, Timestamp};
