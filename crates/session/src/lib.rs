//! ADT session engine and client facade.
//!
//! This crate keeps an authenticated, CSRF-protected, cookie-tracked session
//! with the server and exposes it through [`AdtClient`]. It handles login
//! deduplication, the CSRF token lifecycle, stateful/stateless switching,
//! one-shot re-login on authentication failures, the optional keep-alive
//! ping, and stateless clones.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The engine sequences calls between the domain
//! types in [`protocol`] and whatever [`protocol::Transport`] it is given;
//! [`AdtClient::new`] wires in the `http-transport` adapter.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | [`SessionConfig`], its builder, and the well-known endpoints |
//! | [`engine`] | [`SessionEngine`]: login, request/retry, logout, session types |
//! | [`client`] | [`AdtClient`], the facade over one engine |
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> protocol::Result<()> {
//! use session::{AdtClient, SessionConfig};
//!
//! let config = SessionConfig::builder("https://dev.example.com:44300", "DEVELOPER")
//!     .password("secret")
//!     .client("001")
//!     .build()?;
//! let client = AdtClient::new(config)?;
//! let ticket = client.reentrance_ticket().await?;
//! # let _ = ticket;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod engine;

mod keep_alive;
mod state;

pub use client::AdtClient;
pub use config::{
    SessionConfig, SessionConfigBuilder, DEFAULT_KEEP_ALIVE_INTERVAL, DISCOVERY_PATH, LOGOFF_PATH,
    REENTRANCE_TICKET_PATH,
};
pub use engine::SessionEngine;
