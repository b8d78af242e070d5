//! Credential sources.
//!
//! A session authenticates either with a static password (HTTP basic auth)
//! or with a bearer token obtained from an asynchronous [`TokenSupplier`],
//! typically an OAuth flow owned by the embedding application.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

/// Produces a bearer token on demand.
///
/// Called at most once per login while no token is cached.
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    async fn fetch_token(&self) -> Result<String>;
}

/// Adapts an async closure into a [`TokenSupplier`].
pub struct FnTokenSupplier<F>(pub F);

#[async_trait]
impl<F, Fut> TokenSupplier for FnTokenSupplier<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<String>> + Send,
{
    async fn fetch_token(&self) -> Result<String> {
        (self.0)().await
    }
}

/// Where a session's credentials come from.
#[derive(Clone)]
pub enum Credentials {
    Password(String),
    Token(Arc<dyn TokenSupplier>),
}

impl Credentials {
    /// Wraps a supplier.
    pub fn token(supplier: impl TokenSupplier + 'static) -> Self {
        Credentials::Token(Arc::new(supplier))
    }

    pub fn password(&self) -> Option<&str> {
        match self {
            Credentials::Password(p) => Some(p),
            Credentials::Token(_) => None,
        }
    }

    pub fn supplier(&self) -> Option<&Arc<dyn TokenSupplier>> {
        match self {
            Credentials::Token(s) => Some(s),
            Credentials::Password(_) => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Password(<redacted>)"),
            Credentials::Token(_) => f.write_str("Token(<supplier>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_supplier_yields_its_token() {
        let creds = Credentials::token(FnTokenSupplier(|| async { Ok("bearer-1".to_string()) }));
        let supplier = creds.supplier().expect("token credentials");
        assert_eq!(supplier.fetch_token().await.unwrap(), "bearer-1");
        assert!(creds.password().is_none());
    }

    #[test]
    fn debug_never_prints_the_password() {
        let rendered = format!("{:?}", Credentials::Password("hunter2".into()));
        assert!(!rendered.contains("hunter2"));
    }
}
