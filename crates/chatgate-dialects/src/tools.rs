// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tool-declaration translation: every dialect declares tools as a flat
//! `name`/`description`/`parameters` triple (spec §4.2), differing only in
//! where that triple sits in the wire payload. This module sanitizes the
//! name and schema and records the sanitized↔original mapping so later
//! `functionCall` events can be rendered back in the client's naming.

use chatgate_cache::ToolNameCache;
use chatgate_proto::ToolDeclaration;
use serde_json::Value;

use crate::sanitize::{sanitize_schema, sanitize_tool_name};

#[derive(Debug, Clone)]
pub struct RawToolDeclaration {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Value,
}

/// Sanitizes every declaration's name and schema, and records each rewrite
/// in `names` under `(sessionId, model)` so a later `functionCall` part
/// bearing the sanitized name can be rendered back to the client as the
/// name it originally declared.
pub async fn translate_tools(
    raw: &[RawToolDeclaration],
    session_id: &str,
    model: &str,
    names: &ToolNameCache,
) -> Vec<ToolDeclaration> {
    let mut declarations = Vec::with_capacity(raw.len());
    for tool in raw {
        let sanitized_name = sanitize_tool_name(&tool.name);
        if sanitized_name != tool.name {
            names.put(session_id, model, &sanitized_name, tool.name.clone()).await;
        }
        declarations.push(ToolDeclaration {
            name: sanitized_name,
            description: tool.description.clone(),
            parameters: sanitize_schema(&tool.parameters),
        });
    }
    declarations
}

/// Resolves a `functionCall` name emitted by the upstream back to the
/// name the client originally declared, falling back to the sanitized
/// name itself when no rewrite was recorded (the common case).
pub async fn restore_original_name(
    sanitized_name: &str,
    session_id: &str,
    model: &str,
    names: &ToolNameCache,
) -> String {
    names.get(session_id, model, sanitized_name).await.unwrap_or_else(|| sanitized_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_cache::AlwaysLow;
    use std::sync::Arc;

    fn cache() -> ToolNameCache {
        ToolNameCache::new(Arc::new(AlwaysLow))
    }

    #[tokio::test]
    async fn unrewritten_name_is_not_cached() {
        let names = cache();
        let raw = vec![RawToolDeclaration {
            name: "get_weather".into(),
            description: None,
            parameters: serde_json::json!({"type": "object"}),
        }];
        let declarations = translate_tools(&raw, "s1", "m", &names).await;
        assert_eq!(declarations[0].name, "get_weather");
        assert_eq!(names.get("s1", "m", "get_weather").await, None);
    }

    #[tokio::test]
    async fn rewritten_name_round_trips_through_the_cache() {
        let names = cache();
        let raw = vec![RawToolDeclaration {
            name: "weather.lookup!".into(),
            description: Some("looks up weather".into()),
            parameters: serde_json::json!({}),
        }];
        let declarations = translate_tools(&raw, "s1", "gpt-4o", &names).await;
        assert_eq!(declarations[0].name, "weather_lookup");
        assert_eq!(declarations[0].parameters, serde_json::json!({"type": "object", "properties": {}}));

        let restored = restore_original_name("weather_lookup", "s1", "gpt-4o", &names).await;
        assert_eq!(restored, "weather.lookup!");
    }

    #[tokio::test]
    async fn unknown_sanitized_name_falls_back_to_itself() {
        let names = cache();
        let restored = restore_original_name("mystery_tool", "s1", "m", &names).await;
        assert_eq!(restored, "mystery_tool");
    }
}
