//! Verification engine: credential → verified claims or a typed rejection.
use std::sync::Arc;

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

use crate::config::VerificationConfig;
use crate::services::auth::bearer::bearer_token;
use crate::services::auth::jwks::{KeyResolver, KeySetSource};
use crate::services::auth::outcome::{Rejection, VerificationOutcome, VerifiedClaims};
use crate::services::auth::strategy::{
    RemoteKeyStrategy, SharedSecretStrategy, VerificationStrategy,
};

/// Tries an ordered list of strategies: shared secret first (when configured),
/// then remote key.
///
/// - The first success wins.
/// - Otherwise the first rejection other than `AlgorithmNotAllowed` is reported,
///   since it comes from the strategy whose algorithm family matched the credential.
/// - If every strategy refused the algorithm, `AlgorithmNotAllowed` is reported.
pub struct VerificationEngine {
    strategies: Vec<Box<dyn VerificationStrategy>>,
    resolver: Arc<KeyResolver>,
}

impl std::fmt::Debug for VerificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<_> = self.strategies.iter().map(|s| s.kind()).collect();
        f.debug_struct("VerificationEngine")
            .field("strategies", &kinds)
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl VerificationEngine {
    pub fn new(config: &VerificationConfig, source: Arc<dyn KeySetSource>) -> Self {
        let resolver = Arc::new(KeyResolver::new(
            source,
            config.min_refresh_interval,
            config.fetch_timeout,
        ));

        let mut strategies: Vec<Box<dyn VerificationStrategy>> = Vec::with_capacity(2);
        if let Some(secret) = config.shared_secret.as_deref() {
            strategies.push(Box::new(SharedSecretStrategy::new(
                secret,
                config.leeway_seconds,
            )));
        }
        strategies.push(Box::new(RemoteKeyStrategy::new(
            Arc::clone(&resolver),
            config.accepted_algorithms.clone(),
            config.leeway_seconds,
        )));

        Self {
            strategies,
            resolver,
        }
    }

    /// Per-request check used by the HTTP boundary.
    pub async fn authenticate(&self, headers: &HeaderMap) -> VerificationOutcome {
        self.verify(bearer_token(headers)).await
    }

    pub async fn verify(&self, credential: Option<&str>) -> VerificationOutcome {
        let token = credential.ok_or(Rejection::MissingCredential)?;

        if token.split('.').count() != 3 {
            return Err(Rejection::MalformedCredential);
        }

        let header = jsonwebtoken::decode_header(token).map_err(|err| {
            if names_algorithm(token) {
                // Well-formed header with an algorithm outside anything we verify, e.g. `none`.
                tracing::debug!(error = %err, "credential names an unsupported algorithm");
                Rejection::AlgorithmNotAllowed
            } else {
                tracing::debug!(error = %err, "credential header is not decodable");
                Rejection::MalformedCredential
            }
        })?;

        let mut decisive = None;
        for strategy in &self.strategies {
            match strategy.verify(token, &header).await {
                Ok(claims) => {
                    return Ok(VerifiedClaims {
                        claims,
                        strategy: strategy.kind(),
                    });
                }
                Err(rejection) => {
                    tracing::debug!(
                        strategy = ?strategy.kind(),
                        reason = rejection.code(),
                        "strategy rejected credential"
                    );
                    if decisive.is_none() && rejection != Rejection::AlgorithmNotAllowed {
                        decisive = Some(rejection);
                    }
                }
            }
        }

        Err(decisive.unwrap_or(Rejection::AlgorithmNotAllowed))
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }
}

// Whether the first segment is a JSON object carrying a string `alg`.
fn names_algorithm(token: &str) -> bool {
    token
        .split('.')
        .next()
        .and_then(|segment| URL_SAFE_NO_PAD.decode(segment).ok())
        .and_then(|bytes| serde_json::from_slice::<Map<String, Value>>(&bytes).ok())
        .is_some_and(|header| header.get("alg").is_some_and(Value::is_string))
}
