/*
 * Responsibility
 * - HTTP surface の公開ポイント (routes() / auth_routes() の re-export)
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::{auth_routes, routes};
