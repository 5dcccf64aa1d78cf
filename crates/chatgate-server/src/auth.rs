// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Auth boundary for the client-facing surface (spec §6): `/v1/*` accepts a
//! bearer API key or an admin JWT; `/v1beta/*` additionally accepts
//! `?key=`/`x-goog-api-key`. With no API key configured the routes are
//! open, matching `sven-gateway/src/http/auth.rs`'s shape (constant-time
//! comparison, state threaded through axum middleware) but swapping the
//! token-hash check for a plain shared key plus the admin JWT alternative.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

fn query_key(req: &Request) -> Option<String> {
    let query = req.uri().query()?;
    query.split('&').find_map(|pair| pair.strip_prefix("key=").map(str::to_string))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let ok: bool = a.as_bytes().ct_eq(b.as_bytes()).into();
    ok
}

/// Middleware for `/v1/*`: bearer API key or a valid admin JWT.
pub async fn require_api_key_or_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = &state.secrets.api_key else {
        return next.run(req).await;
    };
    let headers = req.headers();
    if let Some(token) = bearer_token(headers) {
        if constant_time_eq(token, expected) || state.admin.verify_token(token) {
            return next.run(req).await;
        }
    }
    unauthorized()
}

/// Middleware for `/v1beta/*`: everything `/v1/*` accepts, plus
/// `?key=`/`x-goog-api-key`.
pub async fn require_api_key_or_admin_google(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = &state.secrets.api_key else {
        return next.run(req).await;
    };
    let headers = req.headers();
    if let Some(token) = bearer_token(headers) {
        if constant_time_eq(token, expected) || state.admin.verify_token(token) {
            return next.run(req).await;
        }
    }
    if let Some(goog_key) = headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) {
        if constant_time_eq(goog_key, expected) {
            return next.run(req).await;
        }
    }
    if let Some(query_key) = query_key(&req) {
        if constant_time_eq(&query_key, expected) {
            return next.run(req).await;
        }
    }
    unauthorized()
}

/// Middleware for `/admin/*` routes other than `/admin/login`: requires a
/// valid admin JWT, nothing else.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let headers = req.headers();
    if let Some(token) = bearer_token(headers) {
        if state.admin.verify_token(token) {
            return next.run(req).await;
        }
    }
    unauthorized()
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "invalid API key").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer sk-abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("sk-abc"));
    }

    #[test]
    fn missing_auth_header_yields_none() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn constant_time_eq_matches_equal_strings() {
        assert!(constant_time_eq("same", "same"));
        assert!(!constant_time_eq("same", "diff"));
    }
}
