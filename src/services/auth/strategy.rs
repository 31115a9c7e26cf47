//! Verification strategies: shared secret (HMAC) and remote key (JWKS).
//!
//! Each strategy pins its own algorithm family, so a credential meant for one
//! path can never validate through the other.
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation};

use crate::config::AlgorithmFamily;
use crate::services::auth::jwks::KeyResolver;
use crate::services::auth::outcome::{Claims, Rejection, StrategyKind};

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[async_trait]
pub trait VerificationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Verify `token`, whose header has already been decoded (unverified).
    async fn verify(&self, token: &str, header: &Header) -> Result<Claims, Rejection>;
}

/// Signature + `exp`/`nbf` checks. Issuer and audience are not checked.
fn time_bound_validation(algorithms: Vec<Algorithm>, leeway_seconds: u64) -> Validation {
    let mut validation = Validation::default();
    validation.algorithms = algorithms;
    validation.leeway = leeway_seconds;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation
}

fn decode_claims(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<Claims, Rejection> {
    jsonwebtoken::decode::<Claims>(token, key, validation)
        .map(|data| data.claims)
        .map_err(|err| {
            tracing::debug!(error = %err, "credential failed verification");
            Rejection::from_jwt(&err)
        })
}

/// HMAC verification against the locally configured secret.
pub struct SharedSecretStrategy {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SharedSecretStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("SharedSecretStrategy")
            .field("validation", &self.validation)
            .finish()
    }
}

impl SharedSecretStrategy {
    pub fn new(secret: &str, leeway_seconds: u64) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: time_bound_validation(HMAC_ALGORITHMS.to_vec(), leeway_seconds),
        }
    }
}

#[async_trait]
impl VerificationStrategy for SharedSecretStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SharedSecret
    }

    async fn verify(&self, token: &str, header: &Header) -> Result<Claims, Rejection> {
        if AlgorithmFamily::of(header.alg) != AlgorithmFamily::Hmac {
            return Err(Rejection::AlgorithmNotAllowed);
        }

        decode_claims(token, &self.key, &self.validation)
    }
}

/// Verification with a public key published by the identity provider.
#[derive(Debug)]
pub struct RemoteKeyStrategy {
    resolver: Arc<KeyResolver>,
    validation: Validation,
}

impl RemoteKeyStrategy {
    /// `accepted` must be a non-empty set of one asymmetric family.
    pub fn new(resolver: Arc<KeyResolver>, accepted: Vec<Algorithm>, leeway_seconds: u64) -> Self {
        Self {
            resolver,
            validation: time_bound_validation(accepted, leeway_seconds),
        }
    }
}

#[async_trait]
impl VerificationStrategy for RemoteKeyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RemoteKey
    }

    async fn verify(&self, token: &str, header: &Header) -> Result<Claims, Rejection> {
        if !self.validation.algorithms.contains(&header.alg) {
            return Err(Rejection::AlgorithmNotAllowed);
        }

        let Some(kid) = header.kid.as_deref() else {
            tracing::debug!("credential carries no kid");
            return Err(Rejection::KeyResolutionFailed);
        };

        let signing_key = self.resolver.resolve(kid).await.map_err(|err| {
            tracing::warn!(kid = %kid, error = %err, "signing key resolution failed");
            Rejection::KeyResolutionFailed
        })?;

        if let Some(pinned) = signing_key.algorithm
            && pinned != header.alg
        {
            tracing::warn!(kid = %kid, pinned = ?pinned, presented = ?header.alg, "algorithm does not match published key");
            return Err(Rejection::AlgorithmNotAllowed);
        }

        decode_claims(token, &signing_key.key, &self.validation)
    }
}
