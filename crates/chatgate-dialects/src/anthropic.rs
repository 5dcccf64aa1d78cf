// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Anthropic messages dialect: inbound request parsing and the two
//! outbound renderers (streaming block events, single aggregated message).

use chatgate_proto::{GatewayError, GenerationConfig, InternalRequest, RequestBody, StreamEvent, Usage};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::{InboundContext, OutboundContext};
use crate::model_map;
use crate::params;
use crate::shared::{aggregate, translate_history, Aggregated, GenericMessage, GenericToolCall};
use crate::system_instruction;
use crate::tools::{translate_tools, RawToolDeclaration};

/// Anthropic's `system` field is either a plain string or an array of
/// `{type:"text", text}` blocks — unlike OpenAI/Gemini, it never lives in
/// the `messages` array, so it's read directly rather than through the
/// shared leading-system-run extraction.
fn parse_system(body: &Value) -> Option<String> {
    match body.get("system") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Array(blocks)) => {
            let text: String = blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n\n");
            if text.is_empty() { None } else { Some(text) }
        }
        _ => None,
    }
}

fn parse_source_image(source: &Value) -> Option<(String, String)> {
    if source.get("type").and_then(Value::as_str) != Some("base64") {
        return None;
    }
    let mime = source.get("media_type").and_then(Value::as_str)?.to_string();
    let mime = if mime.eq_ignore_ascii_case("image/jpg") { "image/jpeg".to_string() } else { mime };
    let data = source.get("data").and_then(Value::as_str)?.to_string();
    Some((mime, data))
}

/// Splits one Anthropic message's `content` (string, or array of typed
/// blocks) into the generic messages it represents. A single Anthropic
/// `user` message can hold interleaved text/image blocks and `tool_result`
/// blocks; each `tool_result` becomes its own [`GenericMessage`] so the
/// shared coalescing logic can group consecutive ones.
fn expand_message(role: &str, content: &Value) -> Vec<GenericMessage> {
    match content {
        Value::String(s) => match role {
            "assistant" => vec![GenericMessage::assistant(Some(s.clone()), Vec::new(), None)],
            _ => vec![GenericMessage::user(s.clone(), Vec::new())],
        },
        Value::Array(blocks) => {
            let mut out = Vec::new();
            let mut pending_text = String::new();
            let mut pending_images = Vec::new();
            let mut pending_calls = Vec::new();

            let flush_user = |out: &mut Vec<GenericMessage>, text: &mut String, images: &mut Vec<(String, String)>| {
                if !text.is_empty() || !images.is_empty() {
                    out.push(GenericMessage::user(std::mem::take(text), std::mem::take(images)));
                }
            };
            let flush_assistant = |out: &mut Vec<GenericMessage>, text: &mut String, calls: &mut Vec<GenericToolCall>| {
                if !text.is_empty() || !calls.is_empty() {
                    let t = if text.is_empty() { None } else { Some(std::mem::take(text)) };
                    out.push(GenericMessage::assistant(t, std::mem::take(calls), None));
                }
            };

            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(t) = block.get("text").and_then(Value::as_str) {
                            pending_text.push_str(t);
                        }
                    }
                    Some("image") => {
                        if let Some(src) = block.get("source") {
                            if let Some(img) = parse_source_image(src) {
                                pending_images.push(img);
                            }
                        }
                    }
                    Some("tool_use") => {
                        if let (Some(id), Some(name)) =
                            (block.get("id").and_then(Value::as_str), block.get("name").and_then(Value::as_str))
                        {
                            let arguments_json = block.get("input").map(|v| v.to_string()).unwrap_or_else(|| "{}".into());
                            pending_calls.push(GenericToolCall { id: id.into(), name: name.into(), arguments_json });
                        }
                    }
                    Some("tool_result") => {
                        flush_user(&mut out, &mut pending_text, &mut pending_images);
                        flush_assistant(&mut out, &mut pending_text, &mut pending_calls);
                        if let Some(id) = block.get("tool_use_id").and_then(Value::as_str) {
                            let output = match block.get("content") {
                                Some(Value::String(s)) => s.clone(),
                                Some(Value::Array(items)) => items
                                    .iter()
                                    .filter_map(|i| i.get("text").and_then(Value::as_str))
                                    .collect::<Vec<_>>()
                                    .join("\n"),
                                _ => String::new(),
                            };
                            out.push(GenericMessage::tool_result(id, output));
                        }
                    }
                    _ => {}
                }
            }
            if role == "assistant" {
                flush_assistant(&mut out, &mut pending_text, &mut pending_calls);
            } else {
                flush_user(&mut out, &mut pending_text, &mut pending_images);
            }
            out
        }
        _ => Vec::new(),
    }
}

fn parse_messages(body: &Value) -> Result<Vec<GenericMessage>, GatewayError> {
    let raw = body
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::Validation("messages is required".into()))?;
    let mut messages = Vec::new();
    for m in raw {
        let role = m.get("role").and_then(Value::as_str).unwrap_or("user");
        let content = m.get("content").cloned().unwrap_or(Value::Null);
        messages.extend(expand_message(role, &content));
    }
    Ok(messages)
}

fn parse_tools(body: &Value) -> Vec<RawToolDeclaration> {
    body.get("tools")
        .and_then(Value::as_array)
        .map(|tools| {
            tools
                .iter()
                .filter_map(|t| {
                    Some(RawToolDeclaration {
                        name: t.get("name").and_then(Value::as_str)?.to_string(),
                        description: t.get("description").and_then(Value::as_str).map(str::to_string),
                        parameters: t.get("input_schema").cloned().unwrap_or_else(|| json!({})),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub async fn translate_inbound(body: &Value, ctx: &InboundContext<'_>) -> Result<(InternalRequest, bool), GatewayError> {
    let client_model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Validation("model is required".into()))?
        .to_string();
    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    let explicit_thinking =
        body.get("thinking").and_then(|t| t.get("type")).and_then(Value::as_str) == Some("enabled");
    let enable_thinking = model_map::is_thinking_enabled(&client_model) || explicit_thinking;
    let upstream_model = model_map::resolve_upstream_model(&client_model);
    let drop_top_p = enable_thinking && model_map::is_claude_family(&upstream_model);

    let messages = parse_messages(body)?;
    let (contents, _leading_system) =
        translate_history(&messages, enable_thinking, &ctx.session_id, &upstream_model, ctx.signatures).await;
    let client_system = parse_system(body);
    let system_instruction = system_instruction::merge(
        ctx.configured_system_instruction.as_deref(),
        client_system.as_deref(),
        ctx.use_context_system_prompt,
    );

    let raw_tools = parse_tools(body);
    let tools = translate_tools(&raw_tools, &ctx.session_id, &upstream_model, ctx.tool_names).await;

    let normalized = params::normalize_anthropic(body).or_defaults(&ctx.defaults);
    let generation_config = GenerationConfig::from_normalized(normalized, enable_thinking, drop_top_p);

    let request = RequestBody {
        contents,
        tools,
        tool_config: None,
        generation_config,
        session_id: ctx.session_id.clone(),
        system_instruction,
    };
    let internal = InternalRequest {
        project: ctx.project_id.clone(),
        request_id: Uuid::new_v4().to_string(),
        model: upstream_model,
        user_agent: ctx.user_agent.clone(),
        request,
    };
    Ok((internal, stream))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OpenBlock {
    None,
    Thinking,
    Text,
}

/// Renders the internal event stream as Anthropic's `message_start` /
/// `content_block_*` / `message_delta` / `message_stop` sequence. One
/// instance per streamed call.
pub struct StreamRenderer {
    id: String,
    model: String,
    started: bool,
    open_block: OpenBlock,
    next_index: usize,
    saw_tool_calls: bool,
    pending_usage: Option<Usage>,
}

impl StreamRenderer {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("msg_{}", Uuid::new_v4()),
            model: model.into(),
            started: false,
            open_block: OpenBlock::None,
            next_index: 0,
            saw_tool_calls: false,
            pending_usage: None,
        }
    }

    fn close_open_block(&mut self, frames: &mut Vec<Value>) {
        if self.open_block != OpenBlock::None {
            frames.push(json!({"type": "content_block_stop", "index": self.next_index - 1}));
            self.open_block = OpenBlock::None;
        }
    }

    pub fn render(&mut self, event: &StreamEvent, out: &OutboundContext) -> Vec<Value> {
        let mut frames = Vec::new();
        if !self.started {
            frames.push(json!({
                "type": "message_start",
                "message": {
                    "id": self.id,
                    "type": "message",
                    "role": "assistant",
                    "model": self.model,
                    "content": [],
                    "stop_reason": Value::Null,
                    "usage": {"input_tokens": 0, "output_tokens": 0},
                },
            }));
            self.started = true;
        }
        match event {
            StreamEvent::Reasoning { text, thought_signature } => {
                if self.open_block != OpenBlock::Thinking {
                    self.close_open_block(&mut frames);
                    frames.push(json!({
                        "type": "content_block_start",
                        "index": self.next_index,
                        "content_block": {"type": "thinking", "thinking": ""},
                    }));
                    self.open_block = OpenBlock::Thinking;
                    self.next_index += 1;
                }
                let mut delta = json!({"type": "thinking_delta", "thinking": text});
                if out.pass_signature_to_client {
                    if let Some(sig) = thought_signature {
                        delta["signature"] = json!(sig);
                    }
                }
                frames.push(json!({"type": "content_block_delta", "index": self.next_index - 1, "delta": delta}));
            }
            StreamEvent::Text { text } => {
                if self.open_block != OpenBlock::Text {
                    self.close_open_block(&mut frames);
                    frames.push(json!({
                        "type": "content_block_start",
                        "index": self.next_index,
                        "content_block": {"type": "text", "text": ""},
                    }));
                    self.open_block = OpenBlock::Text;
                    self.next_index += 1;
                }
                frames.push(json!({
                    "type": "content_block_delta",
                    "index": self.next_index - 1,
                    "delta": {"type": "text_delta", "text": text},
                }));
            }
            StreamEvent::ToolCalls(calls) => {
                self.saw_tool_calls = true;
                for call in calls {
                    self.close_open_block(&mut frames);
                    frames.push(json!({
                        "type": "content_block_start",
                        "index": self.next_index,
                        "content_block": {"type": "tool_use", "id": call.id, "name": call.name, "input": {}},
                    }));
                    // Arguments arrive already complete (tool calls are
                    // buffered until `finishReason`), so a single
                    // input_json_delta carries the whole object rather than
                    // a token-by-token stream (spec §4.2).
                    frames.push(json!({
                        "type": "content_block_delta",
                        "index": self.next_index,
                        "delta": {"type": "input_json_delta", "partial_json": call.args.to_string()},
                    }));
                    frames.push(json!({"type": "content_block_stop", "index": self.next_index}));
                    self.next_index += 1;
                }
            }
            StreamEvent::Usage(usage) => {
                self.pending_usage = Some(*usage);
            }
            StreamEvent::Done { .. } => {
                self.close_open_block(&mut frames);
                let stop_reason = if self.saw_tool_calls { "tool_use" } else { "end_turn" };
                let output_tokens = self.pending_usage.map(|u| u.completion_tokens).unwrap_or(0);
                frames.push(json!({
                    "type": "message_delta",
                    "delta": {"stop_reason": stop_reason},
                    "usage": {"output_tokens": output_tokens},
                }));
                frames.push(json!({"type": "message_stop"}));
            }
        }
        frames
    }
}

/// Renders a fully aggregated (non-streaming) call as one Anthropic
/// `message` object.
pub fn render_non_streaming(agg: &Aggregated, model: &str, out: &OutboundContext) -> Value {
    let mut content = Vec::new();
    if !agg.reasoning_text.is_empty() {
        let mut block = json!({"type": "thinking", "thinking": agg.reasoning_text});
        if out.pass_signature_to_client {
            if let Some(sig) = &agg.reasoning_signature {
                block["signature"] = json!(sig);
            }
        }
        content.push(block);
    }
    if !agg.text.is_empty() {
        content.push(json!({"type": "text", "text": agg.text}));
    }
    for call in &agg.tool_calls {
        content.push(json!({"type": "tool_use", "id": call.id, "name": call.name, "input": call.args}));
    }
    let stop_reason = if !agg.tool_calls.is_empty() { "tool_use" } else { "end_turn" };
    json!({
        "id": format!("msg_{}", Uuid::new_v4()),
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": content,
        "stop_reason": stop_reason,
        "usage": {"input_tokens": agg.usage.prompt_tokens, "output_tokens": agg.usage.completion_tokens},
    })
}

/// Renders a `GatewayError` as Anthropic's `{type:"error", error:{type,message}}`
/// shape (spec §7).
pub fn render_error(err: &GatewayError) -> Value {
    let error_type = match err {
        GatewayError::Validation(_) | GatewayError::ContextOverflow(_) => "invalid_request_error",
        GatewayError::Auth(_) => "authentication_error",
        GatewayError::RateLimit { .. } => "rate_limit_error",
        GatewayError::Upstream { .. } | GatewayError::Internal(_) | GatewayError::Cancelled => "api_error",
    };
    json!({"type": "error", "error": {"type": error_type, "message": err.to_string()}})
}

pub fn aggregate_events(events: &[StreamEvent]) -> Aggregated {
    aggregate(events)
}
