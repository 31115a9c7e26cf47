//! Signing-key resolver: `kid` → public key, backed by the remote key set.
//!
//! # Cache strategy
//!
//! ```text
//! resolve(kid) → cache hit?  → return (no lock beyond the map shard)
//!              → miss        → queue on the refresh gate
//!                            → re-check cache (a previous holder may have filled it)
//!                            → a fetch finished while queued? → take its result
//!                            → throttled?   → fail without fetching
//!                            → fetch (bounded by timeout), insert every usable key
//!                            → return the requested key or UnknownKeyId
//! ```
//!
//! Entries never expire. This relies on the identity provider minting a new
//! `kid` when it rotates keys rather than reusing an old one.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::source::{KeySetError, KeySetSource};

/// A cached public key.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    // Algorithm the provider pinned this key to, when published.
    pub algorithm: Option<Algorithm>,
    pub key: DecodingKey,
    pub fetched_at: DateTime<Utc>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

impl SigningKey {
    fn from_jwk(jwk: &Jwk, fetched_at: DateTime<Utc>) -> Option<Self> {
        let kid = jwk.common.key_id.clone()?;

        match &jwk.common.public_key_use {
            None | Some(PublicKeyUse::Signature) => {}
            Some(_) => return None,
        }

        // Symmetric material must never come from a published key set.
        if matches!(jwk.algorithm, AlgorithmParameters::OctetKey(_)) {
            return None;
        }

        let key = match DecodingKey::from_jwk(jwk) {
            Ok(key) => key,
            Err(err) => {
                tracing::debug!(kid = %kid, error = %err, "skipping unusable signing key");
                return None;
            }
        };

        Some(Self {
            kid,
            algorithm: jwk.common.key_algorithm.as_ref().and_then(signing_algorithm),
            key,
            fetched_at,
        })
    }
}

fn signing_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        // encryption algorithms
        _ => None,
    }
}

#[derive(Default)]
struct RefreshState {
    // When the last fetch finished, successfully or not.
    last_completed: Option<Instant>,
    // Why the last fetch failed; `None` after a successful one.
    last_error: Option<String>,
}

/// Process-wide signing-key cache with single-flight, rate-bounded refresh.
pub struct KeyResolver {
    source: Arc<dyn KeySetSource>,
    keys: DashMap<String, Arc<SigningKey>>,
    // Held for the duration of one fetch; misses queue here.
    refresh: Mutex<RefreshState>,
    // Bumped under `refresh` each time a fetch finishes.
    generation: AtomicU64,
    min_refresh_interval: Duration,
    fetch_timeout: Duration,
    fetches: AtomicU64,
}

impl std::fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResolver")
            .field("source", &self.source.describe())
            .field("cached", &self.keys.len())
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl KeyResolver {
    pub fn new(
        source: Arc<dyn KeySetSource>,
        min_refresh_interval: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            keys: DashMap::new(),
            refresh: Mutex::new(RefreshState::default()),
            generation: AtomicU64::new(0),
            min_refresh_interval,
            fetch_timeout,
            fetches: AtomicU64::new(0),
        }
    }

    /// Resolve `kid` to a public key, fetching the key set on a miss.
    ///
    /// Callers that queued behind an in-flight fetch take that fetch's result
    /// instead of starting another one.
    pub async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, KeySetError> {
        // Read before the cache check: any fetch finishing after this point
        // is one this call waited on.
        let seen = self.generation.load(Ordering::Acquire);

        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }

        let mut state = self.refresh.lock().await;

        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }

        if self.generation.load(Ordering::Acquire) != seen {
            return Err(match &state.last_error {
                Some(reason) => KeySetError::Unavailable(reason.clone()),
                None => KeySetError::UnknownKeyId(kid.to_string()),
            });
        }

        if let Some(last) = state.last_completed {
            let elapsed = last.elapsed();
            if elapsed < self.min_refresh_interval {
                return Err(KeySetError::Throttled(self.min_refresh_interval - elapsed));
            }
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(kid = %kid, source = %self.source.describe(), "fetching key set");

        let fetched = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(KeySetError::Timeout(self.fetch_timeout)),
        };

        // Failures count too, so a dead endpoint is not hammered.
        state.last_completed = Some(Instant::now());
        let outcome = match fetched {
            Ok(jwks) => {
                let inserted = self.insert_all(&jwks);
                tracing::info!(
                    received = jwks.len(),
                    inserted,
                    cached = self.keys.len(),
                    "key set refreshed"
                );
                state.last_error = None;
                self.cached(kid)
                    .ok_or_else(|| KeySetError::UnknownKeyId(kid.to_string()))
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    source = %self.source.describe(),
                    "key set fetch failed"
                );
                state.last_error = Some(err.to_string());
                Err(err)
            }
        };

        self.generation.fetch_add(1, Ordering::Release);
        drop(state);

        outcome
    }

    fn cached(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).map(|entry| Arc::clone(entry.value()))
    }

    // Parse everything first; the map only sees fully-built entries.
    fn insert_all(&self, jwks: &[Jwk]) -> usize {
        let fetched_at = Utc::now();
        let parsed: Vec<SigningKey> = jwks
            .iter()
            .filter_map(|jwk| SigningKey::from_jwk(jwk, fetched_at))
            .collect();

        let inserted = parsed.len();
        for key in parsed {
            self.keys.insert(key.kid.clone(), Arc::new(key));
        }
        inserted
    }

    pub fn cached_len(&self) -> usize {
        self.keys.len()
    }

    /// Number of key-set fetches attempted so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{PRIMARY_KID, ROGUE_KID, StaticKeySource, primary_jwk, rogue_jwk};
    use serde_json::json;

    fn resolver(source: Arc<StaticKeySource>, min_interval: Duration) -> KeyResolver {
        KeyResolver::new(source, min_interval, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn miss_fetches_and_caches_every_key() {
        let source = Arc::new(StaticKeySource::new(vec![primary_jwk(), rogue_jwk()]));
        let resolver = resolver(source.clone(), Duration::from_secs(60));

        let key = resolver.resolve(PRIMARY_KID).await.unwrap();
        assert_eq!(key.kid, PRIMARY_KID);
        assert_eq!(key.algorithm, Some(Algorithm::RS256));
        assert_eq!(resolver.cached_len(), 2);

        // The other key is served from cache.
        resolver.resolve(ROGUE_KID).await.unwrap();
        assert_eq!(source.calls(), 1);
        assert_eq!(resolver.fetch_count(), 1);
    }

    #[tokio::test]
    async fn hits_do_not_fetch() {
        let source = Arc::new(StaticKeySource::new(vec![primary_jwk()]));
        let resolver = resolver(source.clone(), Duration::ZERO);

        for _ in 0..10 {
            resolver.resolve(PRIMARY_KID).await.unwrap();
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_kid_fails() {
        let source = Arc::new(StaticKeySource::new(vec![primary_jwk()]));
        let resolver = resolver(source, Duration::ZERO);

        let err = resolver.resolve("missing").await.unwrap_err();
        assert!(matches!(err, KeySetError::UnknownKeyId(kid) if kid == "missing"));
    }

    #[tokio::test]
    async fn misses_within_interval_are_throttled() {
        let source = Arc::new(StaticKeySource::new(vec![primary_jwk()]));
        let resolver = resolver(source.clone(), Duration::from_secs(60));

        assert!(resolver.resolve("unknown-1").await.is_err());
        let err = resolver.resolve("unknown-2").await.unwrap_err();

        assert!(matches!(err, KeySetError::Throttled(_)));
        assert_eq!(source.calls(), 1);
        // Keys fetched by the first miss are still served.
        resolver.resolve(PRIMARY_KID).await.unwrap();
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_untouched() {
        let source = Arc::new(StaticKeySource::new(vec![primary_jwk()]));
        let resolver = resolver(source.clone(), Duration::ZERO);
        resolver.resolve(PRIMARY_KID).await.unwrap();

        source.fail_with_status(503);
        let err = resolver.resolve(ROGUE_KID).await.unwrap_err();

        assert!(matches!(err, KeySetError::Status(503)));
        assert_eq!(resolver.cached_len(), 1);
        resolver.resolve(PRIMARY_KID).await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn skips_symmetric_and_encryption_keys() {
        let modulus = primary_jwk()["n"].clone();
        let source = Arc::new(StaticKeySource::new(vec![
            primary_jwk(),
            json!({ "kty": "oct", "kid": "shared", "k": "c2VjcmV0" }),
            json!({
                "kty": "RSA", "kid": "enc", "use": "enc",
                "n": modulus, "e": "AQAB"
            }),
        ]));
        let resolver = resolver(source, Duration::ZERO);

        resolver.resolve(PRIMARY_KID).await.unwrap();
        assert_eq!(resolver.cached_len(), 1);
        assert!(resolver.resolve("shared").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_share_one_fetch() {
        let source = Arc::new(
            StaticKeySource::new(vec![primary_jwk()]).with_delay(Duration::from_millis(100)),
        );
        let resolver = Arc::new(resolver(source.clone(), Duration::from_secs(60)));

        let handles: Vec<_> = (0..128)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve(PRIMARY_KID).await })
            })
            .collect();

        for handle in handles {
            let key = handle.await.unwrap().unwrap();
            assert_eq!(key.kid, PRIMARY_KID);
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn timeout_fails_every_waiter() {
        let source = Arc::new(
            StaticKeySource::new(vec![primary_jwk()]).with_delay(Duration::from_secs(30)),
        );
        let resolver = Arc::new(KeyResolver::new(
            source.clone(),
            Duration::from_secs(60),
            Duration::from_millis(50),
        ));

        let started = std::time::Instant::now();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve(PRIMARY_KID).await })
            })
            .collect();

        let mut timeouts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Err(KeySetError::Timeout(_)) => timeouts += 1,
                Err(KeySetError::Unavailable(_) | KeySetError::Throttled(_)) => {}
                other => panic!("unexpected result: {other:?}"),
            }
        }

        assert_eq!(timeouts, 1);
        assert_eq!(source.calls(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(resolver.cached_len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slow_fetch_is_shared_even_past_refresh_interval() {
        let source = Arc::new(
            StaticKeySource::new(vec![primary_jwk()]).with_delay(Duration::from_secs(30)),
        );
        // The fetch outlives the refresh interval, as with the default config.
        let resolver = Arc::new(KeyResolver::new(
            source.clone(),
            Duration::from_millis(100),
            Duration::from_millis(200),
        ));

        let started = std::time::Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve(PRIMARY_KID).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }

        assert_eq!(source.calls(), 1);
        assert_eq!(resolver.fetch_count(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn refresh_interval_counts_from_fetch_completion() {
        let source = Arc::new(
            StaticKeySource::new(vec![primary_jwk()]).with_delay(Duration::from_millis(150)),
        );
        let resolver = KeyResolver::new(
            source.clone(),
            Duration::from_millis(100),
            Duration::from_secs(5),
        );

        resolver.resolve(PRIMARY_KID).await.unwrap();
        let err = resolver.resolve("unknown").await.unwrap_err();

        assert!(matches!(err, KeySetError::Throttled(_)));
        assert_eq!(source.calls(), 1);
    }
}
