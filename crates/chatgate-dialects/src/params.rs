// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-dialect parameter normalization (spec §4.2 table).

use chatgate_proto::NormalizedParameters;
use serde_json::Value;

/// Extension `reasoning_effort` → `thinking_budget` mapping OpenAI clients
/// that don't send `thinking_budget` directly may use instead.
fn reasoning_effort_budget(effort: &str) -> Option<u32> {
    match effort {
        "low" => Some(1024),
        "medium" => Some(16000),
        "high" => Some(32000),
        _ => None,
    }
}

/// OpenAI: `max_tokens`/`temperature`/`top_p`/`top_k` map directly;
/// `thinking_budget` is a gateway extension clients may send directly, else
/// `reasoning_effort` is translated through the low/medium/high table.
pub fn normalize_openai(body: &Value) -> NormalizedParameters {
    let thinking_budget = body
        .get("thinking_budget")
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .or_else(|| body.get("reasoning_effort").and_then(Value::as_str).and_then(reasoning_effort_budget));

    NormalizedParameters {
        max_tokens: body.get("max_tokens").and_then(Value::as_u64).map(|v| v as u32),
        temperature: body.get("temperature").and_then(Value::as_f64).map(|v| v as f32),
        top_p: body.get("top_p").and_then(Value::as_f64).map(|v| v as f32),
        top_k: body.get("top_k").and_then(Value::as_u64).map(|v| v as u32),
        thinking_budget,
    }
}

/// Anthropic: same direct fields, plus the `thinking` block —
/// `type: "enabled"` with `budget_tokens` sets the budget; `type:
/// "disabled"` forces it to `0` rather than leaving it unset, so thinking
/// is positively turned off rather than merely unspecified.
pub fn normalize_anthropic(body: &Value) -> NormalizedParameters {
    let thinking_budget = match body.get("thinking") {
        Some(thinking) if thinking.get("type").and_then(Value::as_str) == Some("enabled") => {
            thinking.get("budget_tokens").and_then(Value::as_u64).map(|v| v as u32)
        }
        Some(thinking) if thinking.get("type").and_then(Value::as_str) == Some("disabled") => Some(0),
        _ => None,
    };

    NormalizedParameters {
        max_tokens: body.get("max_tokens").and_then(Value::as_u64).map(|v| v as u32),
        temperature: body.get("temperature").and_then(Value::as_f64).map(|v| v as f32),
        top_p: body.get("top_p").and_then(Value::as_f64).map(|v| v as f32),
        top_k: body.get("top_k").and_then(Value::as_u64).map(|v| v as u32),
        thinking_budget,
    }
}

/// Gemini: read from `generationConfig`, renaming its camelCase keys to the
/// normalized snake_case fields. `thinkingConfig.includeThoughts == false`
/// forces the budget to `0`; `thinkingConfig.thinkingBudget` maps directly.
pub fn normalize_gemini(body: &Value) -> NormalizedParameters {
    let gen_config = body.get("generationConfig");
    let thinking_budget = gen_config.and_then(|c| c.get("thinkingConfig")).and_then(|tc| {
        if tc.get("includeThoughts").and_then(Value::as_bool) == Some(false) {
            Some(0)
        } else {
            tc.get("thinkingBudget").and_then(Value::as_u64).map(|v| v as u32)
        }
    });

    NormalizedParameters {
        max_tokens: gen_config.and_then(|c| c.get("maxOutputTokens")).and_then(Value::as_u64).map(|v| v as u32),
        temperature: gen_config.and_then(|c| c.get("temperature")).and_then(Value::as_f64).map(|v| v as f32),
        top_p: gen_config.and_then(|c| c.get("topP")).and_then(Value::as_f64).map(|v| v as f32),
        top_k: gen_config.and_then(|c| c.get("topK")).and_then(Value::as_u64).map(|v| v as u32),
        thinking_budget,
    }
}
