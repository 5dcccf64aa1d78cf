// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Role attached to an internal [`Content`] block.
///
/// The internal protocol only ever speaks `user` and `model` — inbound
/// adapters fold `system`/`tool` messages into one of these two before a
/// [`Content`] is constructed (see `chatgate-dialects`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One part of a [`Content`] block.
///
/// Modeled as a sum type rather than optional fields on one struct: the
/// ordering invariant in spec §3 ("a model content may carry at most one
/// thought part, followed by zero or one text part, followed by any number
/// of functionCall parts") is a property of the `Vec<Part>` as a whole, not
/// enforceable through any single variant, but keeping each shape a distinct
/// constructor makes violations easy to spot in adapter code and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    /// A reasoning ("thinking") block. `thought: true` is the marker the
    /// upstream uses to recognize this variant on replay (and, for this
    /// untagged enum, the field that keeps a plain `Text` part from being
    /// misparsed as one); `thought_signature` is replayed from the
    /// signature cache when the client didn't supply one itself.
    Thought {
        text: String,
        thought: bool,
        #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    /// Plain visible text.
    Text { text: String },
    /// An inline attachment (images only, per spec).
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    /// A tool invocation requested by the model.
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCallPart,
    },
    /// The result of a tool invocation, supplied back to the model.
    /// Only ever appears under a `user`-role [`Content`].
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: FunctionResponsePart,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn thought(text: impl Into<String>, thought_signature: Option<String>) -> Self {
        Self::Thought { text: text.into(), thought: true, thought_signature }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData { inline_data: InlineData { mime_type: mime_type.into(), data: data.into() } }
    }

    pub fn function_call(
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Value,
        thought_signature: Option<String>,
    ) -> Self {
        Self::FunctionCall {
            function_call: FunctionCallPart { id: id.into(), name: name.into(), args, thought_signature },
        }
    }

    pub fn function_response(
        id: impl Into<String>,
        name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self::FunctionResponse {
            function_response: FunctionResponsePart {
                id: id.into(),
                name: name.into(),
                response: FunctionResponseBody { output: output.into() },
            },
        }
    }

    /// `true` for the reasoning-sentinel variant. A part is a reasoning part
    /// whenever it is the `Thought` variant, even if its text is empty — the
    /// spec requires checking "thought:true" rather than text truthiness.
    pub fn is_thought(&self) -> bool {
        matches!(self, Part::Thought { .. })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } | Part::Thought { text, .. } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallPart {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
    #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponsePart {
    pub id: String,
    pub name: String,
    pub response: FunctionResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponseBody {
    pub output: String,
}

/// A single turn in the internal conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self { role: Role::User, parts }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self { role: Role::Model, parts }
    }

    /// Returns `false` if any part violates the model-content ordering
    /// invariant from spec §3: an optional leading `Thought`, then an
    /// optional `Text`, then any number of `FunctionCall`s. `FunctionResponse`
    /// parts are never valid in a `model`-role content.
    pub fn is_well_ordered(&self) -> bool {
        if self.role == Role::User {
            return !self.parts.iter().any(|p| p.is_thought());
        }
        let mut seen_thought = false;
        let mut seen_text = false;
        let mut seen_call = false;
        for part in &self.parts {
            match part {
                Part::Thought { .. } => {
                    if seen_thought || seen_text || seen_call {
                        return false;
                    }
                    seen_thought = true;
                }
                Part::Text { .. } => {
                    if seen_text || seen_call {
                        return false;
                    }
                    seen_text = true;
                }
                Part::FunctionCall { .. } => {
                    seen_call = true;
                }
                Part::FunctionResponse { .. } | Part::InlineData { .. } => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thought_part_is_reasoning_even_with_empty_text() {
        let p = Part::thought("", None);
        assert!(p.is_thought());
        assert_eq!(p.as_text(), Some(""));
    }

    #[test]
    fn thought_part_serializes_with_camel_case_marker_and_signature() {
        let p = Part::thought("musing", Some("sig-1".into()));
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(value, serde_json::json!({"text": "musing", "thought": true, "thoughtSignature": "sig-1"}));
    }

    #[test]
    fn plain_text_does_not_round_trip_as_thought() {
        let value: Part = serde_json::from_value(serde_json::json!({"text": "hi"})).unwrap();
        assert!(matches!(value, Part::Text { .. }));
        assert!(!value.is_thought());
    }

    #[test]
    fn function_call_and_inline_data_serialize_with_camel_case_wrapper_keys() {
        let call = Part::function_call("c1", "get_weather", serde_json::json!({"city": "Beijing"}), Some("sig".into()));
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"functionCall": {"id": "c1", "name": "get_weather", "args": {"city": "Beijing"}, "thoughtSignature": "sig"}})
        );

        let image = Part::inline_data("image/png", "YmFzZTY0");
        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(value, serde_json::json!({"inlineData": {"mimeType": "image/png", "data": "YmFzZTY0"}}));

        let response = Part::function_response("c1", "get_weather", "72F");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"functionResponse": {"id": "c1", "name": "get_weather", "response": {"output": "72F"}}})
        );
    }

    #[test]
    fn well_ordered_model_content_accepts_thought_text_then_calls() {
        let c = Content::model(vec![
            Part::thought(" ", Some("sig".into())),
            Part::text("hello"),
            Part::function_call("c1", "get_weather", serde_json::json!({}), None),
        ]);
        assert!(c.is_well_ordered());
    }

    #[test]
    fn function_response_never_valid_under_model_role() {
        let c = Content::model(vec![Part::function_response("c1", "get_weather", "42")]);
        assert!(!c.is_well_ordered());
    }

    #[test]
    fn user_content_rejects_thought_parts() {
        let c = Content::user(vec![Part::thought("x", None)]);
        assert!(!c.is_well_ordered());
    }

    #[test]
    fn second_text_part_violates_ordering() {
        let c = Content::model(vec![Part::text("a"), Part::text("b")]);
        assert!(!c.is_well_ordered());
    }

    #[test]
    fn text_after_function_call_violates_ordering() {
        let c = Content::model(vec![
            Part::function_call("c1", "f", serde_json::json!({}), None),
            Part::text("late"),
        ]);
        assert!(!c.is_well_ordered());
    }
}
