//! Credential Source
//!
//! Single responsibility: produce a bearer token for authenticating a
//! freshly opened connection.
//!
//! The client invokes the source once per successful connection
//! establishment, so short-lived tokens are re-fetched on every reconnect.
//! Each client holds its own source; two clients authenticating as
//! different identities never share a token.

use async_trait::async_trait;

use crate::error::{ClientError, Result};

/// An asynchronous source of bearer tokens.
///
/// Implementations typically wrap an identity provider or a local token
/// cache. The token is sent to the backend inside an authentication
/// envelope immediately after the channel opens.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Produce a bearer token for the next authentication envelope.
    ///
    /// # Errors
    /// Returns an error if no token can be produced. The connection stays
    /// open but unauthenticated; the backend decides what to do with it.
    async fn bearer_token(&self) -> Result<String>;
}

/// A credential source that always returns the same token.
///
/// Useful for long-lived API tokens and for tests.
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn bearer_token(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(ClientError::Credentials("empty token".into()));
        }
        Ok(self.token.clone())
    }
}
