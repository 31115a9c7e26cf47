//! Shared fixtures for unit tests: RSA keys, token minting, and an in-memory key set.
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use crate::services::auth::jwks::source::parse_key_set;
use crate::services::auth::jwks::{KeySetError, KeySetSource};

pub const PRIMARY_KID: &str = "primary-2024";
pub const ROGUE_KID: &str = "rogue-2024";

pub const PRIMARY_PEM: &str = include_str!("../tests/fixtures/primary_rsa.pem");
pub const ROGUE_PEM: &str = include_str!("../tests/fixtures/rogue_rsa.pem");
const PRIMARY_N: &str = include_str!("../tests/fixtures/primary_rsa.n");
const ROGUE_N: &str = include_str!("../tests/fixtures/rogue_rsa.n");

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn rsa_jwk(kid: &str, modulus: &str) -> Value {
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": modulus.trim(),
        "e": "AQAB"
    })
}

pub fn primary_jwk() -> Value {
    rsa_jwk(PRIMARY_KID, PRIMARY_N)
}

pub fn rogue_jwk() -> Value {
    rsa_jwk(ROGUE_KID, ROGUE_N)
}

pub fn claims_expiring_in(sub: &str, seconds: i64) -> Value {
    let now = now();
    json!({ "sub": sub, "iat": now, "exp": now + seconds })
}

pub fn sign_rs256(pem: &str, kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture rsa pem");
    jsonwebtoken::encode(&header, claims, &key).expect("sign rs256")
}

pub fn sign_hs256(secret: &str, claims: &Value) -> String {
    let key = EncodingKey::from_secret(secret.as_bytes());
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &key).expect("sign hs256")
}

/// In-memory key set that counts fetches and can be told to fail or stall.
pub struct StaticKeySource {
    body: Mutex<Result<Value, u16>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticKeySource {
    pub fn new(keys: Vec<Value>) -> Self {
        Self {
            body: Mutex::new(Ok(json!({ "keys": keys }))),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_with_status(&self, status: u16) {
        *self.body.lock().unwrap() = Err(status);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetSource for StaticKeySource {
    fn describe(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<Jwk>, KeySetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let body = self.body.lock().unwrap().clone();
        match body {
            Ok(value) => parse_key_set(value.to_string().as_bytes()),
            Err(status) => Err(KeySetError::Status(status)),
        }
    }
}
