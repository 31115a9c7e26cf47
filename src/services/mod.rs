/*
 * Responsibility
 * - 認証 (bearer credential の検証) と OIDC ログインの service 層
 * - HTTP/axum の routing からは切り離す
 */
pub mod auth;
pub mod oidc;
