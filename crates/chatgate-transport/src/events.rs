// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-payload parsing of a decoded upstream SSE record into [`StreamEvent`]s
//! (spec §4.3): `candidates[0].content.parts[]` becomes a reasoning, text, or
//! buffered tool-call event; `finishReason` flushes the buffered tool calls
//! and emits usage + done.

use chatgate_cache::{SignatureCache, ToolNameCache};
use chatgate_dialects::tools::restore_original_name;
use chatgate_proto::{FinishReason, FunctionCallPart, StreamEvent, Usage};
use serde_json::Value;

/// Per-stream state: tool calls are buffered across payloads and flushed
/// only once a `finishReason` arrives, since every outbound dialect expects
/// complete call arguments rather than a streamed delta (spec §4.2/§4.3).
pub struct PayloadParser {
    session_id: String,
    model: String,
    pending_tool_calls: Vec<FunctionCallPart>,
}

impl PayloadParser {
    pub fn new(session_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), model: model.into(), pending_tool_calls: Vec::new() }
    }

    /// Parses one decoded JSON payload, caching any thought signature seen
    /// along the way under `(sessionId, model)` and rewriting any
    /// `functionCall` name back to the client's original spelling via
    /// `tool_names` (spec §8: "O — not S — appears in the outbound
    /// rendering").
    pub async fn parse(
        &mut self,
        payload: &Value,
        signatures: &SignatureCache,
        tool_names: &ToolNameCache,
    ) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let Some(candidate) = payload.get("candidates").and_then(|c| c.get(0)) else {
            return events;
        };

        if let Some(parts) = candidate.get("content").and_then(|c| c.get("parts")).and_then(|p| p.as_array()) {
            for part in parts {
                self.parse_part(part, &mut events, signatures, tool_names).await;
            }
        }

        if let Some(reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
            if !self.pending_tool_calls.is_empty() {
                events.push(StreamEvent::ToolCalls(std::mem::take(&mut self.pending_tool_calls)));
            }
            if let Some(usage) = payload.get("usageMetadata") {
                events.push(StreamEvent::Usage(parse_usage(usage)));
            }
            events.push(StreamEvent::Done { finish_reason: map_finish_reason(reason) });
        }

        events
    }

    async fn parse_part(
        &mut self,
        part: &Value,
        events: &mut Vec<StreamEvent>,
        signatures: &SignatureCache,
        tool_names: &ToolNameCache,
    ) {
        if let Some(fc) = part.get("functionCall") {
            let id = fc.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let sanitized_name = fc.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            let name = restore_original_name(sanitized_name, &self.session_id, &self.model, tool_names).await;
            let args = fc.get("args").cloned().unwrap_or_else(|| Value::Object(Default::default()));
            let thought_signature = part.get("thoughtSignature").and_then(|v| v.as_str()).map(str::to_string);
            self.pending_tool_calls.push(FunctionCallPart { id, name, args, thought_signature });
            return;
        }

        // `thought:true` marks a reasoning part even when `text` is absent
        // or empty — spec §4.3 requires checking definedness, not truthiness.
        let is_thought = part.get("thought").and_then(|v| v.as_bool()).unwrap_or(false);
        let text = part.get("text").and_then(|v| v.as_str()).map(str::to_string);

        if is_thought {
            let thought_signature = part.get("thoughtSignature").and_then(|v| v.as_str()).map(str::to_string);
            if let Some(sig) = &thought_signature {
                signatures.put(&self.session_id, &self.model, sig.clone()).await;
            }
            events.push(StreamEvent::Reasoning { text: text.unwrap_or_default(), thought_signature });
        } else if let Some(text) = text {
            events.push(StreamEvent::Text { text });
        }
    }
}

fn parse_usage(usage: &Value) -> Usage {
    Usage {
        prompt_tokens: usage.get("promptTokenCount").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: usage.get("candidatesTokenCount").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        total_tokens: usage.get("totalTokenCount").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
    }
}

/// Both of the upstream's finish cases render as `STOP` per spec §9 open
/// question 2; anything carrying the literal `MAX_TOKENS` string is the one
/// distinction outbound dialects actually need to make.
fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "MAX_TOKENS" => FinishReason::MaxTokens,
        "STOP" => FinishReason::Stop,
        _ => FinishReason::Other,
    }
}
