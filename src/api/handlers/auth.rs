/*
 * Responsibility
 * - GET /auth/login: identity provider の authorization endpoint へ redirect
 * - GET /auth/callback: code → token 交換 → フロントエンドへ redirect
 */
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
}

pub async fn login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let url = state.oidc.authorization_url().map_err(|err| {
        tracing::error!(error = %err, "cannot build authorization url");
        AppError::Internal
    })?;

    Ok(Redirect::to(url.as_str()))
}

pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return Ok((StatusCode::BAD_REQUEST, "No code returned from provider").into_response());
    };

    let id_token = state.oidc.exchange_code(&code).await.map_err(|err| {
        tracing::warn!(error = %err, "authorization code exchange failed");
        AppError::AuthenticationFailed(err.to_string())
    })?;

    tracing::info!("authentication successful, token received");

    Ok(Redirect::to(&state.oidc.landing_url(state.app_env, &id_token)).into_response())
}
