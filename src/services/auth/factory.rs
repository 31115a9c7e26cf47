/// Factory: build `VerificationEngine` from application `Config`.
use std::sync::Arc;

use crate::config::VerificationConfig;
use crate::services::auth::VerificationEngine;
use crate::services::auth::jwks::{HttpKeySetSource, KeySetError};

pub fn build_verification_engine(
    config: &VerificationConfig,
) -> Result<Arc<VerificationEngine>, KeySetError> {
    // The issuer is not contacted here; an unreachable key set surfaces on first use.
    let source = HttpKeySetSource::new(config.jwks_uri(), config.fetch_timeout)?;

    Ok(Arc::new(VerificationEngine::new(config, Arc::new(source))))
}
