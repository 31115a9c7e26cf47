/*
 * Responsibility
 * - GET /api (挨拶), GET /api/health (疎通用)
 * - 認証 middleware を通さない
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn index() -> impl IntoResponse {
    Json(json!({"message": "Hello from Backend API!"}))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
