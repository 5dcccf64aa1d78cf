// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Client-facing model name to upstream model name translation, and the
//! thinking-enabled detector that runs against the *client-requested* name
//! before mapping is applied (spec §4.2).

/// Maps a client-requested model id to the upstream model id. Three
/// specific rewrites, everything else passes through unchanged:
///
/// - `claude-sonnet-4-5-thinking` → `claude-sonnet-4-5`
/// - `claude-opus-4-5` → `claude-opus-4-5-thinking`
/// - `gemini-2.5-flash-thinking` → `gemini-2.5-flash`
///
/// The opus mapping reads backwards from the other two — the *non*-thinking
/// name is the one rewritten to the thinking variant. Spec §9 open question
/// 1 says to preserve this bit-for-bit rather than "fix" it: requesting
/// plain `claude-opus-4-5` silently activates thinking upstream.
pub fn resolve_upstream_model(client_model: &str) -> String {
    let mapped = match client_model {
        "claude-sonnet-4-5-thinking" => Some("claude-sonnet-4-5"),
        "claude-opus-4-5" => Some("claude-opus-4-5-thinking"),
        "gemini-2.5-flash-thinking" => Some("gemini-2.5-flash"),
        _ => None,
    };
    match mapped {
        Some(upstream) => {
            tracing::debug!(client_model, upstream_model = upstream, "remapping model id");
            upstream.to_string()
        }
        None => client_model.to_string(),
    }
}

/// `true` if the upstream model id belongs to the Claude family — used by
/// the generation-config builder to decide whether `topP` must be dropped
/// when thinking is on (spec §3).
pub fn is_claude_family(upstream_model: &str) -> bool {
    upstream_model.starts_with("claude-")
}

/// Thinking-enabled detection runs against the *client-requested* model
/// name, before [`resolve_upstream_model`] is applied (spec §4.2): any name
/// containing `-thinking`, `gemini-2.5-pro`, the prefix `gemini-3-pro-`, or
/// one of two specific names.
pub fn is_thinking_enabled(client_model: &str) -> bool {
    client_model.contains("-thinking")
        || client_model == "gemini-2.5-pro"
        || client_model.starts_with("gemini-3-pro-")
        || client_model == "rev19-uic3-1p"
        || client_model == "gpt-oss-120b-medium"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaps_sonnet_thinking_to_plain() {
        assert_eq!(resolve_upstream_model("claude-sonnet-4-5-thinking"), "claude-sonnet-4-5");
    }

    #[test]
    fn remaps_opus_4_5_to_thinking_variant() {
        assert_eq!(resolve_upstream_model("claude-opus-4-5"), "claude-opus-4-5-thinking");
    }

    #[test]
    fn remaps_gemini_flash_thinking_to_plain() {
        assert_eq!(resolve_upstream_model("gemini-2.5-flash-thinking"), "gemini-2.5-flash");
    }

    #[test]
    fn passes_through_unknown_models() {
        assert_eq!(resolve_upstream_model("gpt-4o"), "gpt-4o");
        assert_eq!(resolve_upstream_model("claude-opus-4-5-thinking"), "claude-opus-4-5-thinking");
    }

    #[test]
    fn claude_family_detected_by_prefix() {
        assert!(is_claude_family("claude-opus-4-5-thinking"));
        assert!(!is_claude_family("gemini-2.5-pro"));
    }

    #[test]
    fn thinking_detector_matches_suffix_and_special_cases() {
        assert!(is_thinking_enabled("claude-sonnet-4-5-thinking"));
        assert!(is_thinking_enabled("gemini-2.5-pro"));
        assert!(is_thinking_enabled("gemini-3-pro-preview"));
        assert!(is_thinking_enabled("rev19-uic3-1p"));
        assert!(is_thinking_enabled("gpt-oss-120b-medium"));
        assert!(!is_thinking_enabled("gemini-2.5-flash"));
        assert!(!is_thinking_enabled("gpt-4o"));
    }

    #[test]
    fn opus_4_5_request_activates_thinking_via_the_odd_mapping() {
        // Requesting the plain (non-thinking-suffixed) name doesn't trip the
        // detector itself, but the model map sends it to the thinking
        // variant upstream regardless — callers must derive
        // `thinking_enabled` from the client model *before* mapping, per
        // spec §4.2, and then separately honor the upstream rename.
        assert!(!is_thinking_enabled("claude-opus-4-5"));
        assert_eq!(resolve_upstream_model("claude-opus-4-5"), "claude-opus-4-5-thinking");
    }
}
