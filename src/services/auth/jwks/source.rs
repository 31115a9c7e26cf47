//! Where the published key set comes from.
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header;
use jsonwebtoken::jwk::Jwk;
use serde::Deserialize;
use thiserror::Error;

/// Key-set retrieval and lookup failures.
///
/// All of these surface to callers as `KeyResolutionFailed`; the detail is for logs.
#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("key set request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("key set endpoint returned status {0}")]
    Status(u16),
    #[error("malformed key set: {0}")]
    Malformed(String),
    #[error("key set fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("key set refresh throttled, next fetch allowed in {0:?}")]
    Throttled(Duration),
    #[error("key set unavailable: {0}")]
    Unavailable(String),
    #[error("no signing key with kid {0:?}")]
    UnknownKeyId(String),
}

/// A provider of the identity provider's published keys.
///
/// Implementations perform one fetch per call; caching and rate-bounding are
/// the resolver's job.
#[async_trait]
pub trait KeySetSource: Send + Sync + 'static {
    // Endpoint description for logging.
    fn describe(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<Jwk>, KeySetError>;
}

#[derive(Deserialize)]
struct RawKeySet {
    keys: Vec<serde_json::Value>,
}

/// Parse a `{"keys": [...]}` document.
///
/// Individual entries the JWK model cannot represent are skipped so that one
/// exotic key does not take the whole set down.
pub fn parse_key_set(body: &[u8]) -> Result<Vec<Jwk>, KeySetError> {
    let raw: RawKeySet =
        serde_json::from_slice(body).map_err(|e| KeySetError::Malformed(e.to_string()))?;

    let keys = raw
        .keys
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Jwk>(value) {
            Ok(jwk) => Some(jwk),
            Err(err) => {
                tracing::debug!(error = %err, "skipping unparsable key set entry");
                None
            }
        })
        .collect();

    Ok(keys)
}

/// Fetches `<issuer>/jwks` over HTTP.
#[derive(Clone, Debug)]
pub struct HttpKeySetSource {
    client: reqwest::Client,
    jwks_uri: String,
}

impl HttpKeySetSource {
    pub fn new(jwks_uri: impl Into<String>, timeout: Duration) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            jwks_uri: jwks_uri.into(),
        })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    fn describe(&self) -> &str {
        &self.jwks_uri
    }

    async fn fetch(&self) -> Result<Vec<Jwk>, KeySetError> {
        let response = self
            .client
            .get(&self.jwks_uri)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_key_set(&body)
    }
}
