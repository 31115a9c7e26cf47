/*
 * Responsibility
 * - URL 構造を定義
 * - /api 配下: /, /health, /protected (bearer 必須)
 * - /auth 配下: /login, /callback (OIDC authorization code)
 */
use axum::{Router, routing::get};

use crate::middleware;
use crate::state::AppState;

use crate::api::handlers::{
    auth::{callback, login},
    health::{health, index},
    protected::protected,
};

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new().route("/protected", get(protected));
    let protected = middleware::auth::access::apply(protected, state);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .merge(protected)
}

/// Mounted under both `/auth` and `/api/auth`; the doubled paths keep
/// redirect URIs registered as `/auth/auth/callback` working.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/auth/login", get(login))
        .route("/callback", get(callback))
        .route("/auth/callback", get(callback))
}
