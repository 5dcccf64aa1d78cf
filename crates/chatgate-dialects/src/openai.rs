// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! OpenAI chat-completions dialect: inbound request parsing and the two
//! outbound renderers (streaming chunks, single aggregated response).

use std::time::{SystemTime, UNIX_EPOCH};

use chatgate_proto::{
    GatewayError, GenerationConfig, InternalRequest, RequestBody, StreamEvent, Usage,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::{InboundContext, OutboundContext};
use crate::model_map;
use crate::params;
use crate::shared::{aggregate, translate_history, Aggregated, GenericMessage, GenericToolCall};
use crate::system_instruction;
use crate::tools::{translate_tools, RawToolDeclaration};

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Splits an OpenAI `content` field (string, array of parts, or absent)
/// into plain text and `(mime, base64)` inline images. Only `data:` URLs
/// are recognized as images — the gateway doesn't fetch remote URLs.
fn parse_content(content: Option<&Value>) -> (Option<String>, Vec<(String, String)>) {
    match content {
        None | Some(Value::Null) => (None, Vec::new()),
        Some(Value::String(s)) => (Some(s.clone()), Vec::new()),
        Some(Value::Array(parts)) => {
            let mut text = String::new();
            let mut images = Vec::new();
            for part in parts {
                match part.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(t) = part.get("text").and_then(Value::as_str) {
                            text.push_str(t);
                        }
                    }
                    Some("image_url") => {
                        if let Some(url) = part.get("image_url").and_then(|u| u.get("url")).and_then(Value::as_str) {
                            if let Some((mime, data)) = parse_data_url(url) {
                                images.push((mime, data));
                            }
                        }
                    }
                    _ => {}
                }
            }
            (if text.is_empty() { None } else { Some(text) }, images)
        }
        Some(_) => (None, Vec::new()),
    }
}

fn parse_data_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime = header.split(';').next().unwrap_or("application/octet-stream");
    let mime = if mime.eq_ignore_ascii_case("image/jpg") { "image/jpeg" } else { mime };
    Some((mime.to_string(), data.to_string()))
}

fn parse_tool_calls(value: &Value) -> Vec<GenericToolCall> {
    value
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    let id = c.get("id").and_then(Value::as_str)?.to_string();
                    let function = c.get("function")?;
                    let name = function.get("name").and_then(Value::as_str)?.to_string();
                    let arguments_json = function.get("arguments").and_then(Value::as_str).unwrap_or("{}").to_string();
                    Some(GenericToolCall { id, name, arguments_json })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_messages(body: &Value) -> Result<Vec<GenericMessage>, GatewayError> {
    let raw = body
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::Validation("messages is required".into()))?;
    let mut messages = Vec::with_capacity(raw.len());
    for m in raw {
        let role = m.get("role").and_then(Value::as_str).unwrap_or("user");
        match role {
            "system" | "developer" => {
                let (text, _) = parse_content(m.get("content"));
                messages.push(GenericMessage::system(text.unwrap_or_default()));
            }
            "assistant" => {
                let (text, _) = parse_content(m.get("content"));
                let tool_calls = m.get("tool_calls").map(parse_tool_calls).unwrap_or_default();
                let reasoning = m.get("reasoning_content").and_then(Value::as_str).map(str::to_string);
                messages.push(GenericMessage::assistant(text, tool_calls, reasoning));
            }
            "tool" => {
                let id = m
                    .get("tool_call_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| GatewayError::Validation("tool message missing tool_call_id".into()))?;
                let (text, _) = parse_content(m.get("content"));
                messages.push(GenericMessage::tool_result(id, text.unwrap_or_default()));
            }
            _ => {
                let (text, images) = parse_content(m.get("content"));
                messages.push(GenericMessage::user(text.unwrap_or_default(), images));
            }
        }
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
                    let function = t.get("function")?;
                    Some(RawToolDeclaration {
                        name: function.get("name").and_then(Value::as_str)?.to_string(),
                        description: function.get("description").and_then(Value::as_str).map(str::to_string),
                        parameters: function.get("parameters").cloned().unwrap_or_else(|| json!({})),
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

    let enable_thinking = model_map::is_thinking_enabled(&client_model);
    let upstream_model = model_map::resolve_upstream_model(&client_model);
    let drop_top_p = enable_thinking && model_map::is_claude_family(&upstream_model);

    let messages = parse_messages(body)?;
    let (contents, leading_system) =
        translate_history(&messages, enable_thinking, &ctx.session_id, &upstream_model, ctx.signatures).await;
    let system_instruction = system_instruction::merge(
        ctx.configured_system_instruction.as_deref(),
        leading_system.as_deref(),
        ctx.use_context_system_prompt,
    );

    let raw_tools = parse_tools(body);
    let tools = translate_tools(&raw_tools, &ctx.session_id, &upstream_model, ctx.tool_names).await;

    let normalized = params::normalize_openai(body).or_defaults(&ctx.defaults);
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

fn usage_json(usage: &Usage) -> Value {
    json!({
        "prompt_tokens": usage.prompt_tokens,
        "completion_tokens": usage.completion_tokens,
        "total_tokens": usage.total_tokens,
    })
}

/// Renders the internal event stream as `chat.completion.chunk` SSE
/// frames. One renderer instance per streamed call.
pub struct StreamRenderer {
    id: String,
    created: i64,
    model: String,
    role_sent: bool,
    tool_call_index: usize,
    saw_tool_calls: bool,
    pending_usage: Option<Usage>,
}

impl StreamRenderer {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            created: now_unix(),
            model: model.into(),
            role_sent: false,
            tool_call_index: 0,
            saw_tool_calls: false,
            pending_usage: None,
        }
    }

    fn base(&self) -> Value {
        json!({"id": self.id, "object": "chat.completion.chunk", "created": self.created, "model": self.model})
    }

    pub fn render(&mut self, event: &StreamEvent, out: &OutboundContext) -> Vec<Value> {
        let mut frames = Vec::new();
        if !self.role_sent {
            let mut chunk = self.base();
            chunk["choices"] = json!([{"index": 0, "delta": {"role": "assistant"}, "finish_reason": Value::Null}]);
            frames.push(chunk);
            self.role_sent = true;
        }
        match event {
            StreamEvent::Reasoning { text, thought_signature } => {
                let mut delta = json!({"reasoning_content": text});
                if out.pass_signature_to_client {
                    if let Some(sig) = thought_signature {
                        delta["reasoning_signature"] = json!(sig);
                    }
                }
                let mut chunk = self.base();
                chunk["choices"] = json!([{"index": 0, "delta": delta, "finish_reason": Value::Null}]);
                frames.push(chunk);
            }
            StreamEvent::Text { text } => {
                let mut chunk = self.base();
                chunk["choices"] = json!([{"index": 0, "delta": {"content": text}, "finish_reason": Value::Null}]);
                frames.push(chunk);
            }
            StreamEvent::ToolCalls(calls) => {
                self.saw_tool_calls = true;
                for call in calls {
                    let tool_call = json!({
                        "index": self.tool_call_index,
                        "id": call.id,
                        "type": "function",
                        "function": {"name": call.name, "arguments": call.args.to_string()},
                    });
                    self.tool_call_index += 1;
                    let mut chunk = self.base();
                    chunk["choices"] = json!([{"index": 0, "delta": {"tool_calls": [tool_call]}, "finish_reason": Value::Null}]);
                    frames.push(chunk);
                }
            }
            StreamEvent::Usage(usage) => {
                self.pending_usage = Some(*usage);
            }
            StreamEvent::Done { finish_reason } => {
                let reason = if self.saw_tool_calls {
                    "tool_calls"
                } else {
                    match finish_reason {
                        chatgate_proto::FinishReason::MaxTokens => "length",
                        _ => "stop",
                    }
                };
                let mut chunk = self.base();
                chunk["choices"] = json!([{"index": 0, "delta": {}, "finish_reason": reason}]);
                if let Some(usage) = self.pending_usage.take() {
                    chunk["usage"] = usage_json(&usage);
                }
                frames.push(chunk);
            }
        }
        frames
    }

    pub fn terminator(&self) -> &'static str {
        "[DONE]"
    }
}

/// Renders a fully aggregated (non-streaming) call as one `chat.completion`
/// response.
pub fn render_non_streaming(agg: &Aggregated, model: &str, out: &OutboundContext) -> Value {
    let mut message = json!({"role": "assistant", "content": agg.text});
    if !agg.reasoning_text.is_empty() {
        message["reasoning_content"] = json!(agg.reasoning_text);
        if out.pass_signature_to_client {
            if let Some(sig) = &agg.reasoning_signature {
                message["reasoning_signature"] = json!(sig);
            }
        }
    }
    if !agg.tool_calls.is_empty() {
        message["tool_calls"] = Value::Array(
            agg.tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": {"name": c.name, "arguments": c.args.to_string()},
                    })
                })
                .collect(),
        );
    }
    let finish_reason = if !agg.tool_calls.is_empty() {
        "tool_calls"
    } else {
        match agg.finish_reason {
            chatgate_proto::FinishReason::MaxTokens => "length",
            _ => "stop",
        }
    };
    json!({
        "id": format!("chatcmpl-{}", Uuid::new_v4()),
        "object": "chat.completion",
        "created": now_unix(),
        "model": model,
        "choices": [{"index": 0, "message": message, "finish_reason": finish_reason}],
        "usage": usage_json(&agg.usage),
    })
}

/// Renders a `GatewayError` as OpenAI's `{error:{message,type,code}}` shape
/// (spec §7).
pub fn render_error(err: &GatewayError) -> Value {
    let error_type = match err {
        GatewayError::Validation(_) => "invalid_request_error",
        GatewayError::Auth(_) => "authentication_error",
        GatewayError::ContextOverflow(_) => "invalid_request_error",
        GatewayError::RateLimit { .. } => "rate_limit_error",
        GatewayError::Upstream { .. } | GatewayError::Internal(_) | GatewayError::Cancelled => "api_error",
    };
    json!({"error": {"message": err.to_string(), "type": error_type, "code": err.status_code()}})
}

pub fn aggregate_events(events: &[StreamEvent]) -> Aggregated {
    aggregate(events)
}
