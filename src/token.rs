//! The token-issuing collaborator boundary.
//!
//! OAuth acquisition and refresh live outside the core (SPEC_FULL §1); the
//! core only needs something it can ask for a bearer token on demand.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Supplies bearer tokens for a given `auth_id`/`protocol_key` pair.
///
/// Implementations are expected to cache and refresh as needed; the core
/// re-asks on every signed request rather than holding a token itself, so a
/// 401 surfaced to the caller can be retried with a freshly issued token.
pub trait TokenProvider: Send + Sync {
    fn token<'a>(&'a self, auth_id: &'a str, protocol_key: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// A [`TokenProvider`] that always returns the same token.
///
/// Useful for tests and for callers that manage refresh entirely outside
/// the backend.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token<'a>(&'a self, _auth_id: &'a str, _protocol_key: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(self.token.clone()) })
    }
}

pub type SharedTokenProvider = Arc<dyn TokenProvider>;
