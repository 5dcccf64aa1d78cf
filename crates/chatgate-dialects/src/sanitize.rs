// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tool name and schema sanitization for the upstream dialect, which is far
//! stricter about both than any of the three client-facing dialects.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const MAX_NAME_LEN: usize = 128;

/// JSON Schema keys the upstream tool declaration format doesn't recognize
/// and will reject the request over if present — both the camelCase keys
/// JSON Schema itself uses and the snake_case variants some client SDKs
/// emit.
const STRIPPED_KEYS: &[&str] = &[
    "$schema",
    "additionalProperties",
    "additional_properties",
    "minLength",
    "min_length",
    "maxLength",
    "max_length",
    "minItems",
    "min_items",
    "maxItems",
    "max_items",
    "uniqueItems",
    "unique_items",
    "exclusiveMaximum",
    "exclusive_maximum",
    "exclusiveMinimum",
    "exclusive_minimum",
    "const",
    "anyOf",
    "any_of",
    "oneOf",
    "one_of",
    "allOf",
    "all_of",
];

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap())
}

/// Rewrites `name` into one matching `^[A-Za-z0-9_-]{1,128}$`: disallowed
/// characters become underscores, leading/trailing underscores are then
/// trimmed, and an empty or all-disallowed result falls back to `"tool"`
/// rather than producing an empty name.
///
/// Returns the name unchanged when it already satisfies the pattern — the
/// common case, so callers shouldn't assume the cache is always populated.
pub fn sanitize_tool_name(name: &str) -> String {
    if name_pattern().is_match(name) {
        return name.to_string();
    }
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(MAX_NAME_LEN)
        .collect();
    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        "tool".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Removes [`STRIPPED_KEYS`] from a tool parameter schema (recursively),
/// then fills in the two defaults the upstream requires but clients often
/// omit at the top level: a missing `type` becomes `object`, and a missing
/// `properties` on an `object`-typed schema becomes an empty one.
pub fn sanitize_schema(schema: &Value) -> Value {
    let cleaned = strip_keys(schema);
    match cleaned {
        Value::Object(mut map) => {
            map.entry("type").or_insert_with(|| Value::String("object".to_string()));
            if map.get("type").and_then(Value::as_str) == Some("object") && !map.contains_key("properties") {
                map.insert("properties".to_string(), Value::Object(serde_json::Map::new()));
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn strip_keys(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut cleaned = serde_json::Map::new();
            for (key, value) in map {
                if STRIPPED_KEYS.contains(&key.as_str()) {
                    continue;
                }
                cleaned.insert(key.clone(), strip_keys(value));
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_name_is_unchanged() {
        assert_eq!(sanitize_tool_name("get_weather"), "get_weather");
    }

    #[test]
    fn invalid_characters_become_underscores_and_edges_are_trimmed() {
        assert_eq!(sanitize_tool_name("weather.lookup!"), "weather_lookup");
    }

    #[test]
    fn leading_and_trailing_underscores_are_stripped() {
        assert_eq!(sanitize_tool_name("!get_weather!"), "get_weather");
    }

    #[test]
    fn overlong_name_is_truncated() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_tool_name(&long).len(), MAX_NAME_LEN);
    }

    #[test]
    fn all_invalid_characters_falls_back_to_tool() {
        assert_eq!(sanitize_tool_name("!!!"), "tool");
    }

    #[test]
    fn schema_strips_disallowed_keys_recursively() {
        let schema = serde_json::json!({
            "type": "object",
            "$schema": "http://json-schema.org/draft-07/schema#",
            "additionalProperties": false,
            "properties": {
                "city": { "type": "string", "minLength": 1, "anyOf": [{"type": "string"}] }
            }
        });
        let cleaned = sanitize_schema(&schema);
        assert_eq!(
            cleaned,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string" }
                }
            })
        );
    }

    #[test]
    fn missing_type_defaults_to_object() {
        let cleaned = sanitize_schema(&serde_json::json!({}));
        assert_eq!(cleaned, serde_json::json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn missing_properties_on_object_defaults_to_empty() {
        let cleaned = sanitize_schema(&serde_json::json!({"type": "object"}));
        assert_eq!(cleaned, serde_json::json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn snake_case_variant_keys_are_also_stripped() {
        let cleaned = sanitize_schema(&serde_json::json!({
            "type": "string",
            "min_length": 1,
            "exclusive_maximum": 10
        }));
        assert_eq!(cleaned, serde_json::json!({"type": "string"}));
    }
}
