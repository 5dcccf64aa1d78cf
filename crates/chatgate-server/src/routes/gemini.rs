// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! `POST /v1beta/models/{model}:generateContent`,
//! `POST /v1beta/models/{model}:streamGenerateContent`, and the Gemini
//! model-list endpoints (spec §6). Gemini's model name travels in the URL
//! path rather than the body, and streaming is chosen by which verb the
//! client hit (plus `?alt=sse`) rather than a body field, so this handler
//! takes the model and the stream flag as arguments instead of reading them
//! out of `translate_inbound`'s return value.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use chatgate_dialects::gemini::{aggregate_events, render_error, render_non_streaming, StreamRenderer};
use chatgate_dialects::{InboundContext, OutboundContext};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::http_status;
use crate::sse::{frame_stream, sse_response};
use crate::state::AppState;

pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    Json(crate::models::list_gemini(&state).await)
}

pub async fn get_model(State(state): State<AppState>, Path(model): Path<String>) -> Response {
    let list = crate::models::list_gemini(&state).await;
    let name = format!("models/{model}");
    match list["models"].as_array().and_then(|models| models.iter().find(|m| m["name"] == name)) {
        Some(found) => Json(found.clone()).into_response(),
        None => (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": {"code": 404, "message": format!("model {model} not found"), "status": "NOT_FOUND"}})),
        )
            .into_response(),
    }
}

/// Handles both `:generateContent` and `:streamGenerateContent` — Gemini
/// encodes the verb as a suffix of the last path segment
/// (`models/gemini-2.5-pro:streamGenerateContent`) rather than as its own
/// segment, which doesn't fit axum's per-segment router, so both actions
/// are registered against one route and split here.
pub async fn dispatch_action(
    State(state): State<AppState>,
    Path(model_action): Path<String>,
    Query(params): Query<std::collections::HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let Some((model, action)) = model_action.split_once(':') else {
        return (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": {"code": 404, "message": "missing action suffix", "status": "NOT_FOUND"}})),
        )
            .into_response();
    };
    // `?alt=sse` selects streaming on the otherwise-unary `generateContent`
    // verb (spec §6); `streamGenerateContent` always streams regardless.
    let alt_sse = params.get("alt").map(|v| v == "sse").unwrap_or(false);
    match action {
        "generateContent" => handle(state, model.to_string(), body, alt_sse).await,
        "streamGenerateContent" => handle(state, model.to_string(), body, true).await,
        other => (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": {"code": 404, "message": format!("unknown action {other}"), "status": "NOT_FOUND"}})),
        )
            .into_response(),
    }
}

async fn handle(state: AppState, model: String, body: Value, stream: bool) -> Response {
    let account = match state.dispatcher.acquire_account().await {
        Ok(account) => account,
        Err(err) => return error_response(&err),
    };
    let out = OutboundContext { pass_signature_to_client: state.config.other.pass_signature_to_client };
    let ctx = InboundContext {
        project_id: account.project_id.clone().unwrap_or_default(),
        session_id: account.session_id.clone(),
        user_agent: state.config.api.user_agent.clone(),
        defaults: state.config.defaults.fill(Default::default()),
        configured_system_instruction: state.secrets.system_instruction.clone(),
        use_context_system_prompt: state.config.other.use_context_system_prompt,
        signatures: &state.signatures,
        tool_names: &state.tool_names,
    };
    let internal = match chatgate_dialects::gemini::translate_inbound(&model, &body, &ctx).await {
        Ok(internal) => internal,
        Err(err) => return error_response(&err),
    };

    if !stream {
        return match state.dispatcher.dispatch_unary_with(account, internal).await {
            Ok(events) => Json(render_non_streaming(&aggregate_events(&events), &out)).into_response(),
            Err(err) => error_response(&err),
        };
    }

    let (events_tx, events_rx) = mpsc::channel(64);
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        let _cancel_tx = cancel_tx;
        if let Err(err) = dispatcher.dispatch_streaming_with(account, internal, events_tx, cancel_rx).await {
            tracing::debug!(%err, "streaming dispatch ended with an error");
        }
    });

    let mut renderer = StreamRenderer::new();
    let stream = frame_stream(events_rx, move |event| renderer.render(event, &out), None);
    sse_response(stream, Duration::from_secs(state.config.server.heartbeat_interval_secs))
}

fn error_response(err: &chatgate_proto::GatewayError) -> Response {
    (http_status(err), Json(render_error(err))).into_response()
}
