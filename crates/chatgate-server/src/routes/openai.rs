// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! `POST /v1/chat/completions`, `GET /v1/models` (spec §6). The handler's
//! only job is gluing the OpenAI dialect to the account-scoped context it
//! needs and to the dispatcher; every translation rule lives in
//! `chatgate_dialects::openai`.

use std::time::Duration;

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use chatgate_dialects::openai::{aggregate_events, render_error, render_non_streaming, StreamRenderer};
use chatgate_dialects::{InboundContext, OutboundContext};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::http_status;
use crate::sse::{frame_stream, sse_response};
use crate::state::AppState;

pub async fn models(State(state): State<AppState>) -> Json<Value> {
    Json(crate::models::list_openai(&state).await)
}

pub async fn chat_completions(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
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
    let (internal, stream) = match chatgate_dialects::openai::translate_inbound(&body, &ctx).await {
        Ok(pair) => pair,
        Err(err) => return error_response(&err),
    };
    let model = internal.model.clone();

    if !stream {
        return match state.dispatcher.dispatch_unary_with(account, internal).await {
            Ok(events) => Json(render_non_streaming(&aggregate_events(&events), &model, &out)).into_response(),
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

    let mut renderer = StreamRenderer::new(model);
    let stream = frame_stream(events_rx, move |event| renderer.render(event, &out), Some("[DONE]".to_string()));
    sse_response(stream, Duration::from_secs(state.config.server.heartbeat_interval_secs))
}

fn error_response(err: &chatgate_proto::GatewayError) -> Response {
    (http_status(err), Json(render_error(err))).into_response()
}
