/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → 依存生成 (VerificationEngine, OidcClient) → Router 組み立て
 * - Middleware の適用 (CORS / request-id / trace / timeout)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api,
    config::Config,
    middleware,
    services::{auth::build_verification_engine, oidc::OidcClient},
    state::AppState,
};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,bearer_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing; stderr may be hidden.
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        app_env = ?config.app_env,
        addr = %config.addr,
        mode = if config.verification.shared_secret.is_some() {
            "shared-secret+remote-key"
        } else {
            "remote-key"
        },
        jwks_uri = %config.verification.jwks_uri(),
        "starting gateway"
    );

    let state = build_state(&config)?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build process-level services and inject them into the shared state.
pub fn build_state(config: &Config) -> Result<AppState> {
    let engine = build_verification_engine(&config.verification)
        .context("failed to build verification engine")?;

    let oidc = OidcClient::new(config.oidc.clone(), config.verification.fetch_timeout)
        .context("failed to build oidc client")?;

    Ok(AppState::new(engine, Arc::new(oidc), config.app_env))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api", api::routes(state.clone()))
        .nest("/api/auth", api::auth_routes())
        .nest("/auth", api::auth_routes())
        .with_state(state);

    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router, config.verification.fetch_timeout)
}
