// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Message-history translation shared between the OpenAI and Anthropic
//! inbound adapters — spec §4.2 notes the two "follow the same shape up to
//! vendor details", so both dialects convert their own wire format into
//! [`GenericMessage`] first and hand it to [`translate_history`] here.
//! Gemini's history is close enough to the internal shape that it doesn't
//! go through this path (see `crate::gemini`).

use chatgate_cache::SignatureCache;
use chatgate_proto::{Content, FinishReason, FunctionCallPart, Part, Role, StreamEvent, Usage};

use crate::sanitize::sanitize_tool_name;

/// The non-streaming collapse of a full internal event sequence — what the
/// Dispatcher hands each dialect's single-response renderer (spec §4.4:
/// `{content, reasoningContent, reasoningSignature, toolCalls, usage}`).
#[derive(Debug, Clone, Default)]
pub struct Aggregated {
    pub reasoning_text: String,
    pub reasoning_signature: Option<String>,
    pub text: String,
    pub tool_calls: Vec<FunctionCallPart>,
    pub usage: Usage,
    pub finish_reason: FinishReason,
}

pub fn aggregate(events: &[StreamEvent]) -> Aggregated {
    let mut agg = Aggregated::default();
    for event in events {
        match event {
            StreamEvent::Reasoning { text, thought_signature } => {
                agg.reasoning_text.push_str(text);
                if thought_signature.is_some() {
                    agg.reasoning_signature = thought_signature.clone();
                }
            }
            StreamEvent::Text { text } => agg.text.push_str(text),
            StreamEvent::ToolCalls(calls) => agg.tool_calls.extend(calls.iter().cloned()),
            StreamEvent::Usage(usage) => agg.usage = *usage,
            StreamEvent::Done { finish_reason } => agg.finish_reason = *finish_reason,
        }
    }
    agg
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
pub struct GenericToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument JSON text as the client sent it (OpenAI) or already a
    /// parsed object (Anthropic) — callers normalize to a string either way
    /// so this module has one parsing path.
    pub arguments_json: String,
}

#[derive(Debug, Clone, Default)]
pub struct GenericMessage {
    pub role: GenericRole,
    pub text: Option<String>,
    /// `(mime_type, base64_data)` inline image attachments.
    pub images: Vec<(String, String)>,
    pub tool_calls: Vec<GenericToolCall>,
    /// Present on `Tool`-role messages: the `functionCall` id this message
    /// answers.
    pub tool_call_id: Option<String>,
    /// Present on `Tool`-role messages: the textual result.
    pub tool_output: Option<String>,
    /// Real reasoning content the client echoed back, if any. When absent
    /// and thinking is enabled, a sentinel thought part is still emitted
    /// (spec §4.2).
    pub reasoning_text: Option<String>,
}

impl GenericMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: GenericRole::System, text: Some(text.into()), ..Default::default() }
    }

    pub fn user(text: impl Into<String>, images: Vec<(String, String)>) -> Self {
        Self { role: GenericRole::User, text: Some(text.into()), images, ..Default::default() }
    }

    pub fn assistant(text: Option<String>, tool_calls: Vec<GenericToolCall>, reasoning: Option<String>) -> Self {
        Self { role: GenericRole::Assistant, text, tool_calls, reasoning_text: reasoning, ..Default::default() }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: GenericRole::Tool,
            tool_call_id: Some(tool_call_id.into()),
            tool_output: Some(output.into()),
            ..Default::default()
        }
    }
}

impl Default for GenericRole {
    fn default() -> Self {
        GenericRole::User
    }
}

/// Parses a tool call's JSON-string arguments into the object the upstream
/// expects; an unparseable string is wrapped as `{"query": <raw string>}`
/// rather than dropped (spec §4.2).
fn parse_tool_arguments(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::json!({ "query": raw }))
}

/// Translates a full message list into internal [`Content`]s plus the
/// leading joined system text (caller merges it with the configured
/// default via `crate::system_instruction::merge`). Leading `System`
/// messages are consumed here and never appear in the returned contents.
pub async fn translate_history(
    messages: &[GenericMessage],
    enable_thinking: bool,
    session_id: &str,
    model: &str,
    signatures: &SignatureCache,
) -> (Vec<Content>, Option<String>) {
    let mut iter = messages.iter().peekable();
    let mut system_parts = Vec::new();
    while let Some(m) = iter.peek() {
        if m.role != GenericRole::System {
            break;
        }
        if let Some(text) = &m.text {
            system_parts.push(text.clone());
        }
        iter.next();
    }
    let leading_system = if system_parts.is_empty() { None } else { Some(system_parts.join("\n\n")) };

    let mut contents: Vec<Content> = Vec::new();
    // Maps a functionCall id to the (sanitized) name it was declared under,
    // so a later Tool-role message can resolve its name without the client
    // having to repeat it (spec §4.2: "name resolved by scanning backwards
    // through model Contents").
    let mut call_names: std::collections::HashMap<String, String> = std::collections::HashMap::new();

    for m in iter {
        match m.role {
            GenericRole::System => {
                // A system message appearing after the leading run is folded
                // into the conversation as plain user text rather than
                // dropped, since only the *leading* run is special-cased.
                if let Some(text) = &m.text {
                    push_user(&mut contents, Part::text(text.clone()));
                }
            }
            GenericRole::User => {
                let mut parts = Vec::new();
                if let Some(text) = &m.text {
                    parts.push(Part::text(text.clone()));
                }
                for (mime, data) in &m.images {
                    let mime = if mime.eq_ignore_ascii_case("image/jpg") { "image/jpeg".to_string() } else { mime.clone() };
                    parts.push(Part::inline_data(mime, data.clone()));
                }
                if !parts.is_empty() {
                    push_model_or_user(&mut contents, Content::user(parts));
                }
            }
            GenericRole::Assistant => {
                let mut parts = Vec::new();
                if enable_thinking {
                    let signature = signatures.get(session_id, model).await;
                    let thought_text = m.reasoning_text.clone().unwrap_or_else(|| " ".to_string());
                    parts.push(Part::thought(thought_text, signature));
                }
                // An empty-string assistant content with tool calls carries
                // zero text parts, not an empty-text artifact (spec §8).
                if let Some(text) = &m.text {
                    if !text.is_empty() {
                        parts.push(Part::text(text.clone()));
                    }
                }
                for call in &m.tool_calls {
                    let sanitized_name = sanitize_tool_name(&call.name);
                    call_names.insert(call.id.clone(), sanitized_name.clone());
                    let args = parse_tool_arguments(&call.arguments_json);
                    let signature = signatures.get(session_id, model).await;
                    parts.push(Part::function_call(call.id.clone(), sanitized_name, args, signature));
                }
                if !parts.is_empty() {
                    push_model_or_user(&mut contents, Content::model(parts));
                }
            }
            GenericRole::Tool => {
                let Some(id) = &m.tool_call_id else { continue };
                let name = call_names.get(id).cloned().unwrap_or_else(|| "tool".to_string());
                let output = m.tool_output.clone().unwrap_or_default();
                push_user(&mut contents, Part::function_response(id.clone(), name, output));
            }
        }
    }

    (contents, leading_system)
}

/// Appends `part` as a user Content, coalescing consecutive function-
/// response parts into a single Content rather than one per tool result
/// (spec §4.2: "Consecutive tool responses coalesce...").
fn push_user(contents: &mut Vec<Content>, part: Part) {
    let is_function_response = matches!(part, Part::FunctionResponse { .. });
    if is_function_response {
        if let Some(last) = contents.last_mut() {
            if last.role == Role::User && last.parts.iter().all(|p| matches!(p, Part::FunctionResponse { .. })) {
                last.parts.push(part);
                return;
            }
        }
    }
    contents.push(Content::user(vec![part]));
}

/// Appends a fully-built Content, coalescing a run of consecutive
/// model-role contents when either side is tool-call-only — the teacher
/// source's odd but deliberate behavior preserved per spec §9 open question
/// 3.
fn push_model_or_user(contents: &mut Vec<Content>, content: Content) {
    if content.role == Role::Model {
        if let Some(last) = contents.last_mut() {
            if last.role == Role::Model && (is_tool_only(last) || is_tool_only(&content)) {
                last.parts.extend(content.parts);
                return;
            }
        }
    }
    contents.push(content);
}

fn is_tool_only(content: &Content) -> bool {
    !content.parts.is_empty() && content.parts.iter().all(|p| matches!(p, Part::FunctionCall { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_cache::AlwaysLow;
    use std::sync::Arc;

    fn cache() -> SignatureCache {
        SignatureCache::new(Arc::new(AlwaysLow))
    }

    #[tokio::test]
    async fn leading_system_messages_are_extracted_and_removed() {
        let messages = vec![GenericMessage::system("be terse"), GenericMessage::user("hi", vec![])];
        let (contents, system) = translate_history(&messages, false, "s1", "m", &cache()).await;
        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, Role::User);
    }

    #[tokio::test]
    async fn empty_text_with_tool_calls_has_no_empty_text_part() {
        let messages = vec![GenericMessage::assistant(
            Some(String::new()),
            vec![GenericToolCall { id: "c1".into(), name: "get_weather".into(), arguments_json: "{}".into() }],
            None,
        )];
        let (contents, _) = translate_history(&messages, false, "s1", "m", &cache()).await;
        assert_eq!(contents.len(), 1);
        assert!(contents[0].parts.iter().all(|p| !matches!(p, Part::Text { text } if text.is_empty())));
        assert!(matches!(contents[0].parts[0], Part::FunctionCall { .. }));
    }

    #[tokio::test]
    async fn unparseable_tool_arguments_wrap_as_query() {
        let messages = vec![GenericMessage::assistant(
            None,
            vec![GenericToolCall { id: "c1".into(), name: "search".into(), arguments_json: "not json".into() }],
            None,
        )];
        let (contents, _) = translate_history(&messages, false, "s1", "m", &cache()).await;
        let Part::FunctionCall { function_call } = &contents[0].parts[0] else { panic!("expected call") };
        assert_eq!(function_call.args, serde_json::json!({"query": "not json"}));
    }

    #[tokio::test]
    async fn tool_name_containing_special_characters_is_sanitized() {
        let messages = vec![GenericMessage::assistant(
            None,
            vec![GenericToolCall { id: "c1".into(), name: "weather.lookup!".into(), arguments_json: "{}".into() }],
            None,
        )];
        let (contents, _) = translate_history(&messages, false, "s1", "m", &cache()).await;
        let Part::FunctionCall { function_call } = &contents[0].parts[0] else { panic!("expected call") };
        assert_eq!(function_call.name, "weather_lookup");
    }

    #[tokio::test]
    async fn tool_result_resolves_name_from_prior_function_call() {
        let messages = vec![
            GenericMessage::assistant(
                None,
                vec![GenericToolCall { id: "c1".into(), name: "get_weather".into(), arguments_json: "{}".into() }],
                None,
            ),
            GenericMessage::tool_result("c1", "72F and sunny"),
        ];
        let (contents, _) = translate_history(&messages, false, "s1", "m", &cache()).await;
        let Part::FunctionResponse { function_response } = &contents[1].parts[0] else { panic!("expected response") };
        assert_eq!(function_response.name, "get_weather");
        assert_eq!(function_response.id, "c1");
        assert_eq!(function_response.response.output, "72F and sunny");
    }

    #[tokio::test]
    async fn consecutive_tool_results_coalesce_into_one_content() {
        let messages = vec![
            GenericMessage::assistant(
                None,
                vec![
                    GenericToolCall { id: "c1".into(), name: "a".into(), arguments_json: "{}".into() },
                    GenericToolCall { id: "c2".into(), name: "b".into(), arguments_json: "{}".into() },
                ],
                None,
            ),
            GenericMessage::tool_result("c1", "result a"),
            GenericMessage::tool_result("c2", "result b"),
        ];
        let (contents, _) = translate_history(&messages, false, "s1", "m", &cache()).await;
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1].parts.len(), 2);
    }

    #[tokio::test]
    async fn thinking_enabled_prepends_sentinel_thought_part() {
        let messages = vec![GenericMessage::assistant(Some("hello".into()), vec![], None)];
        let (contents, _) = translate_history(&messages, true, "s1", "m", &cache()).await;
        assert!(contents[0].is_well_ordered());
        assert!(matches!(contents[0].parts[0], Part::Thought { .. }));
    }

    #[test]
    fn aggregate_concatenates_text_and_keeps_last_signature() {
        let events = vec![
            StreamEvent::Text { text: "Hel".into() },
            StreamEvent::Text { text: "lo".into() },
            StreamEvent::Reasoning { text: "thinking".into(), thought_signature: Some("sig1".into()) },
            StreamEvent::Usage(Usage { prompt_tokens: 3, completion_tokens: 2, total_tokens: 5 }),
            StreamEvent::Done { finish_reason: FinishReason::Stop },
        ];
        let agg = aggregate(&events);
        assert_eq!(agg.text, "Hello");
        assert_eq!(agg.reasoning_signature.as_deref(), Some("sig1"));
        assert_eq!(agg.usage.total_tokens, 5);
        assert_eq!(agg.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn tool_only_assistant_turns_coalesce_with_the_prior_model_content() {
        let messages = vec![
            GenericMessage::assistant(Some("thinking out loud".into()), vec![], None),
            GenericMessage::assistant(
                None,
                vec![GenericToolCall { id: "c1".into(), name: "a".into(), arguments_json: "{}".into() }],
                None,
            ),
        ];
        let (contents, _) = translate_history(&messages, false, "s1", "m", &cache()).await;
        assert_eq!(contents.len(), 1);
        assert!(contents[0].is_well_ordered());
    }
}
