// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! `GET /health` (spec §6): unauthenticated liveness probe reporting uptime
//! and the size of the live credential pool, matching the shallow
//! "process is up" checks `sven-gateway`'s own health route performs rather
//! than an upstream-reachability probe.

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let accounts = state.accounts.snapshot().await;
    let enabled = accounts.iter().filter(|a| !a.disabled).count();
    Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime_secs(),
        "accounts_total": accounts.len(),
        "accounts_enabled": enabled,
    }))
}
