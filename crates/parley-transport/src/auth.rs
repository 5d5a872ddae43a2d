//! Auth token resolution.
//!
//! Every connection attempt (initial and reconnect) asks the
//! [`TokenProvider`] for a fresh token, so refreshed credentials are picked
//! up without rebuilding the transport.

use async_trait::async_trait;
use parley_core::TransportError;
use url::Url;

/// Query parameter carrying the token on the connection URL.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Error type returned by token providers.
pub type TokenError = Box<dyn std::error::Error + Send + Sync>;

/// Supplies the bearer token for the connection URL.
///
/// `Ok(None)` and `Err(_)` both abort the connection attempt.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Resolve the current token.
    async fn token(&self) -> Result<Option<String>, TokenError>;
}

/// A fixed token, or none.
#[derive(Clone, Debug, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    /// Provider that always yields `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// Provider that never yields a token.
    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<Option<String>, TokenError> {
        Ok(self.0.clone())
    }
}

/// Resolve a token from `provider`, mapping absence and failure to [`TransportError::Auth`].
pub async fn resolve_token(provider: &dyn TokenProvider) -> Result<String, TransportError> {
    match provider.token().await {
        Ok(Some(token)) if !token.is_empty() => Ok(token),
        Ok(_) => Err(TransportError::Auth("no auth token available".into())),
        Err(e) => Err(TransportError::Auth(e.to_string())),
    }
}

/// Append `token` to `base` as the `token` query parameter, replacing any existing one.
pub fn authorize_url(base: &Url, token: &str) -> Url {
    let mut url = base.clone();
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != TOKEN_QUERY_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    {
        let mut query = url.query_pairs_mut();
        let _ = query.clear();
        let _ = query.extend_pairs(kept);
        let _ = query.append_pair(TOKEN_QUERY_PARAM, token);
    }
    url
}
