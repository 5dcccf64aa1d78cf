// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use crate::content::Content;

/// A tool declaration translated from whichever inbound dialect the client
/// used, with its schema already sanitized (see `chatgate-dialects::sanitize`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInstruction {
    pub parts: Vec<SystemInstructionPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInstructionPart {
    pub text: String,
}

impl SystemInstruction {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { parts: vec![SystemInstructionPart { text: text.into() }] }
    }
}

/// Client-facing generation knobs after dialect-specific normalization but
/// before the thinking-aware `topP` rule in [`GenerationConfig::from_normalized`]
/// has been applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
}

impl NormalizedParameters {
    /// Fills every field the client left unset with the deployment-wide
    /// default (spec §4.2: "missing fields fill from process-wide
    /// defaults"). `thinking_budget` is left alone — an unset budget means
    /// "use the upstream's own default for this model", not zero.
    pub fn or_defaults(self, defaults: &NormalizedParameters) -> Self {
        Self {
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            temperature: self.temperature.or(defaults.temperature),
            top_p: self.top_p.or(defaults.top_p),
            top_k: self.top_k.or(defaults.top_k),
            thinking_budget: self.thinking_budget,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    pub include_thoughts: bool,
    pub thinking_budget: u32,
}

/// The outbound `generationConfig` block. Built from [`NormalizedParameters`]
/// by applying the one upstream quirk spec §3 calls out: once thinking is
/// enabled, `topP` must be omitted entirely rather than forwarded, or the
/// upstream rejects the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "topP")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "topK")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "maxOutputTokens")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "thinkingConfig")]
    pub thinking_config: Option<ThinkingConfig>,
}

impl GenerationConfig {
    /// `drop_top_p` is the Claude-family-specific quirk from spec §3: once
    /// thinking is enabled for a Claude target model, the upstream rejects
    /// the request if `topP` is present at all. Other thinking-capable
    /// families keep `topP`, so this isn't folded into `thinking_enabled`
    /// itself — callers (in `chatgate-dialects`) know the target model.
    ///
    /// A `thinking_budget` of exactly `Some(0)` means thinking was
    /// positively disabled by the client (Anthropic's `type:"disabled"`,
    /// Gemini's `includeThoughts:false`) rather than merely left unset, so
    /// `includeThoughts` follows that distinction rather than always being
    /// `true` whenever thinking is otherwise enabled (spec §8 round-trip
    /// law).
    pub fn from_normalized(params: NormalizedParameters, thinking_enabled: bool, drop_top_p: bool) -> Self {
        let thinking_config = if thinking_enabled {
            Some(ThinkingConfig {
                include_thoughts: params.thinking_budget != Some(0),
                thinking_budget: params.thinking_budget.unwrap_or(0),
            })
        } else {
            None
        };
        Self {
            temperature: params.temperature,
            top_p: if drop_top_p { None } else { params.top_p },
            top_k: params.top_k,
            max_output_tokens: params.max_tokens,
            thinking_config,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tools: Vec<ToolDeclaration>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "toolConfig")]
    pub tool_config: Option<serde_json::Value>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "systemInstruction")]
    pub system_instruction: Option<SystemInstruction>,
}

/// The full outbound Antigravity payload: wire-ready contents plus the
/// envelope metadata the upstream needs to route and bill the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalRequest {
    pub project: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub model: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    pub request: RequestBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_thinking_drops_top_p() {
        let params = NormalizedParameters { top_p: Some(0.9), thinking_budget: Some(2048), ..Default::default() };
        let cfg = GenerationConfig::from_normalized(params, true, true);
        assert!(cfg.top_p.is_none());
        assert_eq!(cfg.thinking_config.unwrap().thinking_budget, 2048);
    }

    #[test]
    fn non_claude_thinking_keeps_top_p() {
        let params = NormalizedParameters { top_p: Some(0.9), thinking_budget: Some(2048), ..Default::default() };
        let cfg = GenerationConfig::from_normalized(params, true, false);
        assert_eq!(cfg.top_p, Some(0.9));
        assert!(cfg.thinking_config.is_some());
    }

    #[test]
    fn or_defaults_fills_only_unset_fields() {
        let params = NormalizedParameters { temperature: Some(0.2), ..Default::default() };
        let defaults = NormalizedParameters {
            temperature: Some(0.7),
            top_p: Some(0.95),
            top_k: Some(40),
            max_tokens: Some(8192),
            thinking_budget: Some(8192),
        };
        let filled = params.or_defaults(&defaults);
        assert_eq!(filled.temperature, Some(0.2));
        assert_eq!(filled.top_p, Some(0.95));
        assert_eq!(filled.max_tokens, Some(8192));
        assert_eq!(filled.thinking_budget, None, "an unset budget must not pick up the process-wide default");
    }

    #[test]
    fn thinking_disabled_keeps_top_p() {
        let params = NormalizedParameters { top_p: Some(0.9), ..Default::default() };
        let cfg = GenerationConfig::from_normalized(params, false, false);
        assert_eq!(cfg.top_p, Some(0.9));
        assert!(cfg.thinking_config.is_none());
    }

    #[test]
    fn explicit_zero_budget_disables_include_thoughts_even_though_thinking_is_enabled() {
        let params = NormalizedParameters { thinking_budget: Some(0), ..Default::default() };
        let cfg = GenerationConfig::from_normalized(params, true, false);
        let thinking = cfg.thinking_config.unwrap();
        assert!(!thinking.include_thoughts);
        assert_eq!(thinking.thinking_budget, 0);
    }

    #[test]
    fn unset_budget_keeps_include_thoughts_true_when_thinking_is_enabled() {
        let params = NormalizedParameters::default();
        let cfg = GenerationConfig::from_normalized(params, true, false);
        let thinking = cfg.thinking_config.unwrap();
        assert!(thinking.include_thoughts);
        assert_eq!(thinking.thinking_budget, 0);
    }
}
