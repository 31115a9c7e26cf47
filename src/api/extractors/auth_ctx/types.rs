/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - 署名検証や鍵解決は services/auth 側の責務
 * - request の間だけ生きる。キャッシュも永続化もしない
 */
use crate::services::auth::{Claims, StrategyKind, VerifiedClaims};

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `claims` は credential の payload そのまま
/// - `subject` は `sub` claim (文字列の場合のみ)
/// - `strategy` はどの検証経路で通ったか (ログ相関用)
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub claims: Claims,
    pub subject: Option<String>,
    pub strategy: StrategyKind,
}

impl From<VerifiedClaims> for AuthCtx {
    fn from(verified: VerifiedClaims) -> Self {
        let subject = verified.subject().map(str::to_string);
        Self {
            claims: verified.claims,
            subject,
            strategy: verified.strategy,
        }
    }
}
