/*
 * Responsibility
 * - 環境変数の読み込み (PORT, OPENID_*, JWT_*, JWKS_* など)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 * - 検証エンジンに渡す不変の VerificationConfig を切り出す
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Signing algorithm families. A deployment accepts exactly one asymmetric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl AlgorithmFamily {
    pub fn of(alg: Algorithm) -> Self {
        match alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Self::Hmac,
            Algorithm::ES256 | Algorithm::ES384 => Self::Ec,
            Algorithm::EdDSA => Self::Ed,
            _ => Self::Rsa,
        }
    }
}

/// Immutable verification settings, shared by every request.
#[derive(Clone)]
pub struct VerificationConfig {
    pub shared_secret: Option<String>,
    pub issuer: String,
    pub accepted_algorithms: Vec<Algorithm>,
    pub leeway_seconds: u64,
    pub min_refresh_interval: Duration,
    pub fetch_timeout: Duration,
}

impl fmt::Debug for VerificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("VerificationConfig")
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "***"))
            .field("issuer", &self.issuer)
            .field("accepted_algorithms", &self.accepted_algorithms)
            .field("leeway_seconds", &self.leeway_seconds)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl VerificationConfig {
    pub fn jwks_uri(&self) -> String {
        format!("{}/jwks", self.issuer)
    }
}

#[derive(Clone)]
pub struct OidcClientConfig {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub frontend_url: String,
}

impl fmt::Debug for OidcClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcClientConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("frontend_url", &self.frontend_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub verification: VerificationConfig,
    pub oidc: OidcClientConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let issuer = std::env::var("OPENID_ISSUER")
            .map_err(|_| ConfigError::Missing("OPENID_ISSUER"))?
            .trim()
            .trim_end_matches('/')
            .to_string();
        if issuer.is_empty() {
            return Err(ConfigError::Missing("OPENID_ISSUER"));
        }

        let shared_secret = std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());

        let accepted_algorithms = parse_accepted_algorithms(
            &std::env::var("JWT_ACCEPTED_ALGORITHMS").unwrap_or_else(|_| "RS256".to_string()),
        )?;

        let leeway_seconds = env_u64("JWT_LEEWAY_SECONDS", 0)?;
        let min_refresh_interval =
            Duration::from_secs(env_u64("JWKS_MIN_REFRESH_INTERVAL_SECONDS", 6)?);
        let fetch_timeout = Duration::from_secs(env_u64("JWKS_FETCH_TIMEOUT_SECONDS", 10)?);
        if fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid("JWKS_FETCH_TIMEOUT_SECONDS"));
        }

        let oidc = OidcClientConfig {
            issuer: issuer.clone(),
            client_id: std::env::var("OPENID_CLIENT_ID")
                .unwrap_or_else(|_| "PLACEHOLDER_ID".to_string()),
            client_secret: std::env::var("OPENID_CLIENT_SECRET").unwrap_or_default(),
            redirect_uri: std::env::var("OPENID_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:3000/auth/callback".to_string()),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            verification: VerificationConfig {
                shared_secret,
                issuer,
                accepted_algorithms,
                leeway_seconds,
                min_refresh_interval,
                fetch_timeout,
            },
            oidc,
        })
    }
}

fn env_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Parse `JWT_ACCEPTED_ALGORITHMS`.
///
/// The list must be non-empty, asymmetric only, and confined to one family so a
/// key published for one family can never verify a credential of another.
pub fn parse_accepted_algorithms(raw: &str) -> Result<Vec<Algorithm>, ConfigError> {
    const KEY: &str = "JWT_ACCEPTED_ALGORITHMS";

    let mut algorithms = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alg = Algorithm::from_str(name).map_err(|_| ConfigError::Invalid(KEY))?;
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }

    let family = match algorithms.first() {
        Some(first) => AlgorithmFamily::of(*first),
        None => return Err(ConfigError::Invalid(KEY)),
    };
    if family == AlgorithmFamily::Hmac
        || algorithms
            .iter()
            .any(|alg| AlgorithmFamily::of(*alg) != family)
    {
        return Err(ConfigError::Invalid(KEY));
    }

    Ok(algorithms)
}
