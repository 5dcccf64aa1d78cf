// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The gateway's HTTP surface: builds the axum [`Router`] described by
//! spec §6 on top of [`AppState`], with auth middleware scoped per route
//! group the way `sven-gateway/src/http/auth.rs` scopes its own bearer
//! check to the routes that need it.

pub mod admin;
pub mod auth;
pub mod error;
pub mod models;
pub mod routes;
pub mod sse;
pub mod state;

use std::time::Duration;

use axum::http::Method;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Assembles the full router: the three client-facing dialects under
/// shared-key auth, `/health` open, `/admin/*` JWT-gated (`/admin/login`
/// excepted), plus the cross-cutting layers every route gets (tracing,
/// CORS, request-id propagation, and the body-size cap from
/// `config.server.max_request_size_bytes`).
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.server.max_request_size_bytes;

    let openai_routes = Router::new()
        .route("/v1/chat/completions", post(routes::openai::chat_completions))
        .route("/v1/models", get(routes::openai::models))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key_or_admin));

    let anthropic_routes = Router::new()
        .route("/v1/messages", post(routes::anthropic::messages))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key_or_admin));

    let gemini_routes = Router::new()
        .route("/v1beta/models", get(routes::gemini::list_models))
        .route("/v1beta/models/:model", get(routes::gemini::get_model).post(routes::gemini::dispatch_action))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key_or_admin_google));

    let admin_routes = Router::new()
        .route("/admin/accounts", get(routes::admin::list_accounts).post(routes::admin::add_account))
        .route("/admin/accounts/:id", delete(routes::admin::remove_account))
        .route("/admin/accounts/:id/disabled", put(routes::admin::set_disabled))
        .route("/admin/accounts/:id/quota", get(routes::admin::quota_for))
        .route("/admin/rotation-policy", put(routes::admin::set_rotation_policy))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    let admin_login = Router::new().route("/admin/login", post(routes::admin::login));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(openai_routes)
        .merge(anthropic_routes)
        .merge(gemini_routes)
        .merge(admin_routes)
        .merge(admin_login)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(max_body))
        .with_state(state)
}

/// Binds and serves the router until `shutdown` resolves, the way
/// `sven-node`'s own binary drives its axum listener — graceful shutdown so
/// in-flight streaming responses finish rather than being severed.
pub async fn serve(
    state: AppState,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let heartbeat = Duration::from_secs(state.config.server.heartbeat_interval_secs);
    tracing::info!(%addr, heartbeat_secs = heartbeat.as_secs(), "binding chatgate listener");
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
