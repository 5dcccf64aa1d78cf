// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! `/admin/*` control-plane routes (spec §6): thin HTTP adapters over
//! [`crate::admin::AdminApi`]. `login` is mounted without the admin-JWT
//! middleware; every other route requires one.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chatgate_proto::{Account, RotationPolicy};
use serde::Deserialize;
use serde_json::json;

use crate::admin::AdminApi;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
    match state.login(&body.username, &body.password).await {
        Some(token) => Json(json!({"token": token})).into_response(),
        None => (StatusCode::UNAUTHORIZED, "invalid admin credentials").into_response(),
    }
}

pub async fn list_accounts(State(state): State<AppState>) -> Json<Vec<Account>> {
    Json(state.list_accounts().await)
}

pub async fn add_account(State(state): State<AppState>, Json(account): Json<Account>) -> StatusCode {
    state.add_account(account).await;
    StatusCode::CREATED
}

pub async fn remove_account(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.remove_account(&id).await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
pub struct DisabledRequest {
    disabled: bool,
}

pub async fn set_disabled(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DisabledRequest>,
) -> StatusCode {
    state.set_disabled(&id, body.disabled).await;
    StatusCode::NO_CONTENT
}

pub async fn set_rotation_policy(State(state): State<AppState>, Json(policy): Json<RotationPolicy>) -> StatusCode {
    state.set_rotation_policy(policy).await;
    StatusCode::NO_CONTENT
}

pub async fn quota_for(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.quota_for(&id).await {
        Ok(value) => Json(value).into_response(),
        Err(err) => (crate::error::http_status(&err), Json(chatgate_dialects::gemini::render_error(&err))).into_response(),
    }
}
