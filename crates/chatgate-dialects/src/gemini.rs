// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Gemini generative-content dialect. Unlike OpenAI/Anthropic this wire
//! format is already shaped like the internal protocol, so inbound
//! translation is close to identity — parse each part by hand rather than
//! through [`Content`]'s derived `Deserialize` (which is `#[serde(untagged)]`
//! and, since the `Thought` variant's fields are a strict subset of `Text`'s,
//! would otherwise happily misparse a plain text part as a thought).

use chatgate_proto::{
    Content, GatewayError, GenerationConfig, InternalRequest, Part, RequestBody, Role, StreamEvent, Usage,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::{InboundContext, OutboundContext};
use crate::model_map;
use crate::params;
use crate::sanitize::sanitize_tool_name;
use crate::shared::{aggregate, Aggregated};
use crate::system_instruction;
use crate::tools::{translate_tools, RawToolDeclaration};

fn parse_part(part: &Value) -> Option<Part> {
    if let Some(fc) = part.get("functionCall") {
        let id = fc.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let name = sanitize_tool_name(fc.get("name").and_then(Value::as_str)?);
        let args = fc.get("args").cloned().unwrap_or_else(|| json!({}));
        let sig = part.get("thoughtSignature").and_then(Value::as_str).map(str::to_string);
        return Some(Part::function_call(id, name, args, sig));
    }
    if let Some(fr) = part.get("functionResponse") {
        let id = fr.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let name = fr.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        let output = fr.get("response").and_then(|r| r.get("output")).and_then(Value::as_str).unwrap_or_default();
        return Some(Part::function_response(id, name, output));
    }
    if let Some(inline) = part.get("inlineData") {
        let mime = inline.get("mimeType").and_then(Value::as_str).unwrap_or("application/octet-stream");
        let mime = if mime.eq_ignore_ascii_case("image/jpg") { "image/jpeg" } else { mime };
        let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
        return Some(Part::inline_data(mime, data));
    }
    if let Some(text) = part.get("text").and_then(Value::as_str) {
        let sig = part.get("thoughtSignature").and_then(Value::as_str).map(str::to_string);
        return Some(if part.get("thought").and_then(Value::as_bool) == Some(true) {
            Part::thought(text, sig)
        } else {
            Part::text(text)
        });
    }
    None
}

fn parse_contents(body: &Value) -> Result<Vec<Content>, GatewayError> {
    let raw = body
        .get("contents")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::Validation("contents is required".into()))?;
    let mut contents = Vec::with_capacity(raw.len());
    for c in raw {
        let role = if c.get("role").and_then(Value::as_str) == Some("model") { Role::Model } else { Role::User };
        let parts = c
            .get("parts")
            .and_then(Value::as_array)
            .map(|parts| parts.iter().filter_map(parse_part).collect())
            .unwrap_or_default();
        contents.push(Content { role, parts });
    }
    Ok(contents)
}

fn parse_tools(body: &Value) -> Vec<RawToolDeclaration> {
    body.get("tools")
        .and_then(Value::as_array)
        .map(|tools| {
            tools
                .iter()
                .flat_map(|t| t.get("functionDeclarations").and_then(Value::as_array).cloned().unwrap_or_default())
                .filter_map(|f| {
                    Some(RawToolDeclaration {
                        name: f.get("name").and_then(Value::as_str)?.to_string(),
                        description: f.get("description").and_then(Value::as_str).map(str::to_string),
                        parameters: f.get("parameters").cloned().unwrap_or_else(|| json!({})),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_system(body: &Value) -> Option<String> {
    let parts = body.get("systemInstruction").and_then(|si| si.get("parts")).and_then(Value::as_array)?;
    let text: String =
        parts.iter().filter_map(|p| p.get("text").and_then(Value::as_str)).collect::<Vec<_>>().join("\n\n");
    if text.is_empty() { None } else { Some(text) }
}

/// `client_model` comes from the `{model}` path segment, not the body.
pub async fn translate_inbound(
    client_model: &str,
    body: &Value,
    ctx: &InboundContext<'_>,
) -> Result<InternalRequest, GatewayError> {
    let gen_config = body.get("generationConfig");
    let explicit_thinking = gen_config
        .and_then(|c| c.get("thinkingConfig"))
        .and_then(|tc| tc.get("includeThoughts"))
        .and_then(Value::as_bool)
        == Some(true);
    let enable_thinking = model_map::is_thinking_enabled(client_model) || explicit_thinking;
    let upstream_model = model_map::resolve_upstream_model(client_model);
    let drop_top_p = enable_thinking && model_map::is_claude_family(&upstream_model);

    let contents = parse_contents(body)?;
    let client_system = parse_system(body);
    let system_instruction = system_instruction::merge(
        ctx.configured_system_instruction.as_deref(),
        client_system.as_deref(),
        ctx.use_context_system_prompt,
    );

    let raw_tools = parse_tools(body);
    let tools = translate_tools(&raw_tools, &ctx.session_id, &upstream_model, ctx.tool_names).await;

    let normalized = params::normalize_gemini(body).or_defaults(&ctx.defaults);
    let generation_config = GenerationConfig::from_normalized(normalized, enable_thinking, drop_top_p);

    let request = RequestBody {
        contents,
        tools,
        tool_config: body.get("toolConfig").cloned(),
        generation_config,
        session_id: ctx.session_id.clone(),
        system_instruction,
    };
    Ok(InternalRequest {
        project: ctx.project_id.clone(),
        request_id: Uuid::new_v4().to_string(),
        model: upstream_model,
        user_agent: ctx.user_agent.clone(),
        request,
    })
}

fn usage_metadata(usage: &Usage) -> Value {
    json!({
        "promptTokenCount": usage.prompt_tokens,
        "candidatesTokenCount": usage.completion_tokens,
        "totalTokenCount": usage.total_tokens,
    })
}

/// Renders the internal event stream as Gemini candidate/content frames.
/// Each frame carries at most one `parts` array matching the event that
/// produced it; the closing frame adds `finishReason`/`usageMetadata`.
pub struct StreamRenderer {
    pending_usage: Option<Usage>,
}

impl StreamRenderer {
    pub fn new() -> Self {
        Self { pending_usage: None }
    }

    pub fn render(&mut self, event: &StreamEvent, out: &OutboundContext) -> Vec<Value> {
        match event {
            StreamEvent::Reasoning { text, thought_signature } => {
                let mut part = json!({"text": text, "thought": true});
                if out.pass_signature_to_client {
                    if let Some(sig) = thought_signature {
                        part["thoughtSignature"] = json!(sig);
                    }
                }
                vec![json!({"candidates": [{"content": {"role": "model", "parts": [part]}}]})]
            }
            StreamEvent::Text { text } => {
                vec![json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})]
            }
            StreamEvent::ToolCalls(calls) => {
                let parts: Vec<Value> = calls
                    .iter()
                    .map(|c| {
                        let mut part = json!({"functionCall": {"id": c.id, "name": c.name, "args": c.args}});
                        if out.pass_signature_to_client {
                            if let Some(sig) = &c.thought_signature {
                                part["thoughtSignature"] = json!(sig);
                            }
                        }
                        part
                    })
                    .collect();
                vec![json!({"candidates": [{"content": {"role": "model", "parts": parts}}]})]
            }
            StreamEvent::Usage(usage) => {
                self.pending_usage = Some(*usage);
                Vec::new()
            }
            StreamEvent::Done { .. } => {
                // Both of the source's finish branches render as STOP (spec
                // §9 open question 2).
                let mut frame = json!({"candidates": [{"finishReason": "STOP"}]});
                if let Some(usage) = self.pending_usage.take() {
                    frame["usageMetadata"] = usage_metadata(&usage);
                }
                vec![frame]
            }
        }
    }
}

impl Default for StreamRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a fully aggregated (non-streaming) call as one Gemini
/// `GenerateContentResponse`.
pub fn render_non_streaming(agg: &Aggregated, out: &OutboundContext) -> Value {
    let mut parts = Vec::new();
    if !agg.reasoning_text.is_empty() {
        let mut part = json!({"text": agg.reasoning_text, "thought": true});
        if out.pass_signature_to_client {
            if let Some(sig) = &agg.reasoning_signature {
                part["thoughtSignature"] = json!(sig);
            }
        }
        parts.push(part);
    }
    if !agg.text.is_empty() {
        parts.push(json!({"text": agg.text}));
    }
    for call in &agg.tool_calls {
        parts.push(json!({"functionCall": {"id": call.id, "name": call.name, "args": call.args}}));
    }
    json!({
        "candidates": [{"content": {"role": "model", "parts": parts}, "finishReason": "STOP"}],
        "usageMetadata": usage_metadata(&agg.usage),
    })
}

/// Renders a `GatewayError` as Gemini's `{error:{code,message,status}}`
/// shape (spec §7) — the upstream's own envelope always reports
/// `status:"INTERNAL"` regardless of the HTTP code.
pub fn render_error(err: &GatewayError) -> Value {
    json!({"error": {"code": err.status_code(), "message": err.to_string(), "status": "INTERNAL"}})
}

pub fn aggregate_events(events: &[StreamEvent]) -> Aggregated {
    aggregate(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_cache::{AlwaysLow, SignatureCache, ToolNameCache};
    use chatgate_proto::FinishReason;
    use std::sync::Arc;

    fn ctx() -> (SignatureCache, ToolNameCache) {
        (SignatureCache::new(Arc::new(AlwaysLow)), ToolNameCache::new(Arc::new(AlwaysLow)))
    }

    #[tokio::test]
    async fn plain_text_part_is_not_mistaken_for_a_thought() {
        let (sig, names) = ctx();
        let inbound = InboundContext {
            project_id: "p".into(),
            session_id: "s1".into(),
            user_agent: "antigravity".into(),
            defaults: Default::default(),
            configured_system_instruction: None,
            use_context_system_prompt: true,
            signatures: &sig,
            tool_names: &names,
        };
        let body = json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]});
        let internal = translate_inbound("gemini-2.5-flash", &body, &inbound).await.unwrap();
        assert!(matches!(internal.request.contents[0].parts[0], Part::Text { .. }));
    }

    #[tokio::test]
    async fn include_thoughts_false_forces_zero_budget_and_disables_include_thoughts() {
        let (sig, names) = ctx();
        let inbound = InboundContext {
            project_id: "p".into(),
            session_id: "s1".into(),
            user_agent: "antigravity".into(),
            defaults: Default::default(),
            configured_system_instruction: None,
            use_context_system_prompt: true,
            signatures: &sig,
            tool_names: &names,
        };
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
            "generationConfig": {"thinkingConfig": {"includeThoughts": false}},
        });
        let internal = translate_inbound("gemini-2.5-pro", &body, &inbound).await.unwrap();
        // gemini-2.5-pro is always-thinking per the detector, so thinkingConfig is still
        // present, but the client's explicit includeThoughts:false carries through rather
        // than being overridden back to true (spec §8 round-trip law).
        let thinking = internal.request.generation_config.thinking_config.unwrap();
        assert!(!thinking.include_thoughts);
        assert_eq!(thinking.thinking_budget, 0);
    }

    #[test]
    fn both_finish_branches_render_as_stop() {
        let mut renderer = StreamRenderer::new();
        let out = OutboundContext { pass_signature_to_client: true };
        let frame = &renderer.render(&StreamEvent::Done { finish_reason: FinishReason::Stop }, &out)[0];
        assert_eq!(frame["candidates"][0]["finishReason"], "STOP");
        let mut renderer2 = StreamRenderer::new();
        let frame2 = &renderer2.render(&StreamEvent::Done { finish_reason: FinishReason::Other }, &out)[0];
        assert_eq!(frame2["candidates"][0]["finishReason"], "STOP");
    }
}
