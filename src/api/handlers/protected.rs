/*
 * Responsibility
 * - GET /api/protected
 * - middleware が検証済みの claims をそのまま返す
 */
use axum::Json;
use serde_json::{Value, json};

use crate::api::extractors::AuthCtxExtractor;

pub async fn protected(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<Value> {
    Json(json!({
        "message": "This is a protected route!",
        "user": ctx.claims,
    }))
}
