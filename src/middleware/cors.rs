//! CORS for the browser dashboard, which calls `/api/*` with a bearer header.
//!
//! - Development: any origin.
//! - Production: exact-match allowlist from `CORS_ALLOWED_ORIGINS`; empty allows none.
//!
//! Credentials (cookies) are never allowed: the dashboard authenticates with the
//! `Authorization` header only.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;

fn allow_origin(config: &Config) -> AllowOrigin {
    if !config.app_env.is_production() {
        return AllowOrigin::from(Any);
    }

    let allowed: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unusable CORS origin");
                None
            }
        })
        .collect();

    AllowOrigin::list(allowed)
}

pub fn apply(router: Router, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allow_origin(config))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .max_age(Duration::from_secs(600));

    router.layer(cors)
}
