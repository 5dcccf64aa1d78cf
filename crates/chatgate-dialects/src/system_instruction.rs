// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! System-instruction merging (spec §4.2): the process-wide default system
//! text is concatenated with the client's leading system text, and the
//! leading system messages are then removed from the translated history.

use chatgate_proto::SystemInstruction;

/// `configured_default` is the deployment-wide `SYSTEM_INSTRUCTION` secret;
/// `client_system_text` is the leading run of `system` messages already
/// joined by the caller. When `use_context_system_prompt` is `false`, the
/// client-supplied text is ignored entirely and only the configured default
/// is used (still honoring an empty default as "no system instruction").
pub fn merge(
    configured_default: Option<&str>,
    client_system_text: Option<&str>,
    use_context_system_prompt: bool,
) -> Option<SystemInstruction> {
    let client_text = if use_context_system_prompt { client_system_text } else { None };

    let merged = match (configured_default, client_text) {
        (Some(default), Some(client)) if !default.is_empty() && !client.is_empty() => {
            format!("{default}\n\n{client}")
        }
        (Some(default), _) if !default.is_empty() => default.to_string(),
        (_, Some(client)) if !client.is_empty() => client.to_string(),
        _ => return None,
    };

    Some(SystemInstruction::from_text(merged))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_default_and_client_text() {
        let merged = merge(Some("be concise"), Some("you are a pirate"), true).unwrap();
        assert_eq!(merged.parts[0].text, "be concise\n\nyou are a pirate");
    }

    #[test]
    fn ignores_client_text_when_context_system_prompt_disabled() {
        let merged = merge(Some("be concise"), Some("you are a pirate"), false).unwrap();
        assert_eq!(merged.parts[0].text, "be concise");
    }

    #[test]
    fn client_only_when_no_default_configured() {
        let merged = merge(None, Some("you are a pirate"), true).unwrap();
        assert_eq!(merged.parts[0].text, "you are a pirate");
    }

    #[test]
    fn none_when_neither_present() {
        assert!(merge(None, None, true).is_none());
    }
}
