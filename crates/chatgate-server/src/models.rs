// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Model-List Service (spec §4.6): fetches the upstream catalog through
//! whichever account is currently available, merges it with a fixed
//! default list so well-known names are always present, and caches the
//! rendered body behind [`chatgate_cache::ModelListCache`]'s dynamic TTL.
//! When no account can be acquired, the default list is served
//! unconditionally rather than failing the request.

use serde_json::{json, Value};

use crate::state::AppState;

/// Names always present in `/v1/models` and `/v1beta/models`, independent
/// of whatever the upstream catalog call returns. Matches the well-known
/// upstream and client-facing aliases this gateway's model map recognizes.
const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-flash-thinking",
    "gemini-2.5-pro",
    "gemini-3-pro-preview",
    "claude-sonnet-4-5",
    "claude-sonnet-4-5-thinking",
    "claude-opus-4-5",
    "gpt-oss-120b-medium",
];

fn default_openai_list() -> Value {
    json!({
        "object": "list",
        "data": DEFAULT_MODELS.iter().map(|id| json!({"id": id, "object": "model", "owned_by": "antigravity"})).collect::<Vec<_>>(),
    })
}

fn default_gemini_list() -> Value {
    json!({
        "models": DEFAULT_MODELS.iter().map(|id| json!({"name": format!("models/{id}"), "supportedGenerationMethods": ["generateContent", "streamGenerateContent"]})).collect::<Vec<_>>(),
    })
}

/// Merges whatever the upstream returned with the default list, keyed by
/// model id so a name present in both is not duplicated.
fn merge_openai(upstream: &Value) -> Value {
    let mut seen: std::collections::HashSet<String> = DEFAULT_MODELS.iter().map(|s| s.to_string()).collect();
    let mut data: Vec<Value> =
        DEFAULT_MODELS.iter().map(|id| json!({"id": id, "object": "model", "owned_by": "antigravity"})).collect();
    if let Some(models) = upstream.get("models").and_then(Value::as_object) {
        for (id, _) in models {
            if seen.insert(id.clone()) {
                data.push(json!({"id": id, "object": "model", "owned_by": "antigravity"}));
            }
        }
    }
    json!({"object": "list", "data": data})
}

/// Fetches (through the cache) the merged model list rendered as the
/// OpenAI `/v1/models` shape.
pub async fn list_openai(state: &AppState) -> Value {
    render_cached(state, |upstream| merge_openai(upstream)).await
}

/// Renders the merged model list as Anthropic's `GET /v1/models` shape
/// (spec §6: served by whichever router handles the path first).
pub async fn list_anthropic(state: &AppState) -> Value {
    let openai_shaped = render_cached(state, merge_openai).await;
    let data = openai_shaped["data"].as_array().cloned().unwrap_or_default();
    json!({
        "data": data.iter().map(|m| json!({"id": m["id"], "type": "model", "display_name": m["id"]})).collect::<Vec<_>>(),
        "has_more": false,
    })
}

/// Renders the merged model list as Gemini's `GET /v1beta/models` shape.
pub async fn list_gemini(state: &AppState) -> Value {
    if let Ok(Some(account)) = state.accounts.acquire_ready().await {
        if let Ok(upstream) = state.transport.list_models(&state.config.api.models_url, &account.access_token).await {
            let mut seen: std::collections::HashSet<String> = DEFAULT_MODELS.iter().map(|s| s.to_string()).collect();
            let mut models: Vec<Value> = DEFAULT_MODELS
                .iter()
                .map(|id| json!({"name": format!("models/{id}"), "supportedGenerationMethods": ["generateContent", "streamGenerateContent"]}))
                .collect();
            if let Some(upstream_models) = upstream.get("models").and_then(Value::as_object) {
                for (id, _) in upstream_models {
                    if seen.insert(id.clone()) {
                        models.push(json!({"name": format!("models/{id}"), "supportedGenerationMethods": ["generateContent", "streamGenerateContent"]}));
                    }
                }
            }
            return json!({"models": models});
        }
    }
    default_gemini_list()
}

/// Shared cache path for the two OpenAI-shaped callers: serve the cached
/// body if fresh, else fetch (or fall back to defaults with no account),
/// render with `render`, and cache the result.
async fn render_cached(state: &AppState, render: impl Fn(&Value) -> Value) -> Value {
    if let Some(cached) = state.model_list_cache.get().await {
        if let Ok(value) = serde_json::from_str(&cached) {
            return value;
        }
    }
    let rendered = match state.accounts.acquire_ready().await {
        Ok(Some(account)) => {
            match state.transport.list_models(&state.config.api.models_url, &account.access_token).await {
                Ok(upstream) => render(&upstream),
                Err(_) => default_openai_list(),
            }
        }
        _ => default_openai_list(),
    };
    if let Ok(body) = serde_json::to_string(&rendered) {
        state.model_list_cache.set(body).await;
    }
    rendered
}

/// The explicit "quotas" call (spec §4.6): bypasses the model-list cache
/// entirely and returns the upstream's raw per-model `quotaInfo` for one
/// account, keyed by model id.
pub async fn quotas_for_account(state: &AppState, account_id: &str) -> Result<Value, chatgate_proto::GatewayError> {
    let account = state
        .accounts
        .snapshot()
        .await
        .into_iter()
        .find(|a| a.id == account_id)
        .ok_or_else(|| chatgate_proto::GatewayError::Validation(format!("unknown account id {account_id}")))?;
    state.transport.list_models(&state.config.api.models_url, &account.access_token).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_list_always_includes_well_known_models() {
        let list = default_openai_list();
        let ids: Vec<&str> = list["data"].as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap()).collect();
        assert!(ids.contains(&"gemini-2.5-flash"));
        assert!(ids.contains(&"claude-opus-4-5"));
    }

    #[test]
    fn merge_deduplicates_against_defaults() {
        let upstream = json!({"models": {"gemini-2.5-flash": {}, "brand-new-model": {}}});
        let merged = merge_openai(&upstream);
        let ids: Vec<&str> = merged["data"].as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap()).collect();
        assert_eq!(ids.iter().filter(|id| **id == "gemini-2.5-flash").count(), 1);
        assert!(ids.contains(&"brand-new-model"));
    }
}
