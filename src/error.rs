/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - 認証の Rejection を 401 / 403 に変換
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::Rejection;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    Unauthorized { code: &'static str, message: String },
    #[error("{code}: {message}")]
    Forbidden { code: &'static str, message: String },
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::AuthenticationFailed(_) | AppError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::Unauthorized { code, message } | AppError::Forbidden { code, message } => {
                (code, message)
            }
            AppError::AuthenticationFailed(details) => ("AUTHENTICATION_FAILED", details),
            AppError::Internal => ("INTERNAL_SERVER_ERROR", "internal server error".into()),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        let code = rejection.code();
        let message = rejection.to_string();
        match rejection {
            // The caller did not present a usable credential.
            Rejection::MissingCredential | Rejection::MalformedCredential => {
                AppError::Unauthorized { code, message }
            }
            Rejection::KeyResolutionFailed
            | Rejection::SignatureInvalid
            | Rejection::AlgorithmNotAllowed => AppError::Forbidden { code, message },
        }
    }
}
