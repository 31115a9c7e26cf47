/*!
 * 認証済みコンテキスト
 *
 * - types: handler が受け取る `AuthCtx` (claims + subject + strategy)
 * - core:  axum の extractor 実装 (extensions から取り出すだけ)
 */

mod core;
mod types;

pub use core::AuthCtxExtractor;
pub use types::AuthCtx;
