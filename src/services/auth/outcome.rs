//! Verification outcome: verified claims or a typed rejection.
use serde_json::{Map, Value};
use thiserror::Error;

/// Claim name → value, exactly as carried in the credential payload.
pub type Claims = Map<String, Value>;

/// Why a credential was not accepted.
///
/// Every variant is a per-request failure; none of them is fatal to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no bearer credential was presented")]
    MissingCredential,
    #[error("credential is not a well-formed signed token")]
    MalformedCredential,
    #[error("signing key could not be resolved")]
    KeyResolutionFailed,
    #[error("signature or validity period check failed")]
    SignatureInvalid,
    #[error("signing algorithm is not allowed")]
    AlgorithmNotAllowed,
}

impl Rejection {
    /// Machine-readable reason code returned to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::MalformedCredential => "MALFORMED_CREDENTIAL",
            Self::KeyResolutionFailed => "KEY_RESOLUTION_FAILED",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::AlgorithmNotAllowed => "ALGORITHM_NOT_ALLOWED",
        }
    }

    /// Map a token library failure onto the rejection taxonomy.
    pub(crate) fn from_jwt(err: &jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::MalformedCredential,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => Self::AlgorithmNotAllowed,
            // bad signature, expired, not yet valid, missing `exp`, unusable key
            _ => Self::SignatureInvalid,
        }
    }
}

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    SharedSecret,
    RemoteKey,
}

/// A successfully verified credential.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    pub claims: Claims,
    pub strategy: StrategyKind,
}

impl VerifiedClaims {
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }
}

pub type VerificationOutcome = Result<VerifiedClaims, Rejection>;
