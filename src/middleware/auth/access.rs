//! bearer credential 検証 → AuthCtx を extensions に入れる
//!
//! - `Authorization: Bearer <token>` を取り出し、VerificationEngine で検証する
//! - 成功: claims を `AuthCtx` として request extensions に格納
//! - 失敗: 401 (credential なし / 不正形式) or 403 (鍵解決・署名・アルゴリズム)

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::state::AppState;

/// 保護したい Router に認証 middleware を適用する。
///
/// 例：
/// ```ignore
/// let protected = Router::new().route("/protected", get(protected));
/// let protected = middleware::auth::access::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let verified = match state.engine.authenticate(req.headers()).await {
        Ok(verified) => verified,
        Err(rejection) => {
            tracing::warn!(
                reason = rejection.code(),
                path = %req.uri().path(),
                "bearer credential rejected"
            );
            return Err(rejection.into());
        }
    };

    tracing::debug!(
        sub = verified.subject().unwrap_or("-"),
        strategy = ?verified.strategy,
        "bearer credential verified"
    );

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(AuthCtx::from(verified));

    Ok(next.run(req).await)
}
