use reqwest::StatusCode;
use thiserror::Error;

/// Failure kinds for a single fetch/parse step. Callers decide whether to
/// skip the item, log, or abort the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("failed to persist refreshed tokens: {0}")]
    TokenStore(String),

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing element in page: {0}")]
    MissingElement(&'static str),
}

impl FetchError {
    /// Whether this failure should abort the whole ranking run instead of
    /// skipping the current item. Only the authentication path aborts: an
    /// expired token gets exactly one refresh-and-retry, after which the
    /// run cannot make further authenticated calls.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Auth(_) | FetchError::TokenStore(_))
    }
}
