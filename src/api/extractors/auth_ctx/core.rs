use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::Rejection;
use crate::state::AppState;

use super::AuthCtx;

/// 検証済み claims を handler で受け取るための extractor
///
/// access middleware が `AuthCtx` を extensions に入れている前提。
/// 無ければ middleware が掛かっていない route なので、credential なしと同じ 401 を返す。
pub struct AuthCtxExtractor(pub AuthCtx);

impl FromRequestParts<AppState> for AuthCtxExtractor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthCtx>() {
            Some(ctx) => Ok(AuthCtxExtractor(ctx.clone())),
            None => {
                tracing::error!(path = %parts.uri.path(), "AuthCtx requested on an unprotected route");
                Err(Rejection::MissingCredential.into())
            }
        }
    }
}
