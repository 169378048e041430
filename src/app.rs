/*
 * Responsibility
 * - Config loading -> dependency wiring -> Router assembly
 * - Middleware application (auth interceptor + transport layers)
 * - axum::serve() startup
 */
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::middleware;
use crate::services::auth::identity::HttpIdentityClient;
use crate::services::auth::token::TokenValidator;
use crate::services::proxy::{self, Forwarder, RouteTable};
use crate::state::AppState;

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let state = build_state(&config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Wire the immutable configuration into the request-scoped dependencies.
pub fn build_state(config: &Config) -> Result<AppState> {
    let validator = Arc::new(TokenValidator::new(&config.jwt_secret));
    let identity = Arc::new(
        HttpIdentityClient::new(&config.identity_base_url, config.delegate_timeout)
            .context("failed to build identity client")?,
    );
    let routes = Arc::new(RouteTable::new(config.routes.clone()));
    let forwarder = Arc::new(Forwarder::new().context("failed to build forwarder")?);

    Ok(AppState::new(validator, identity, routes, forwarder))
}

/// Every path falls through to the proxy handler; the authentication
/// interceptor sits in front of all of them.
pub fn build_router(state: AppState) -> Router {
    let routes = Router::new().fallback(proxy::handle);
    let routes = middleware::auth::apply(routes, state.clone());

    middleware::http::apply(routes.with_state(state))
}
