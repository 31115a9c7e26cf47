/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - ex: engine: VerificationEngine, oidc: OidcClient, app_env
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::config::AppEnv;
use crate::services::{auth::VerificationEngine, oidc::OidcClient};

#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: Arc<VerificationEngine>,
    pub oidc: Arc<OidcClient>,
    pub app_env: AppEnv,
}

impl AppState {
    pub fn new(engine: Arc<VerificationEngine>, oidc: Arc<OidcClient>, app_env: AppEnv) -> Self {
        Self {
            engine,
            oidc,
            app_env,
        }
    }
}
