// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use crate::content::FunctionCallPart;

/// One decoded increment from the upstream stream, as produced by the
/// Stream Framer in `chatgate-transport` and consumed by the per-dialect
/// outbound renderers in `chatgate-dialects`.
///
/// Tool calls are buffered upstream-side and flushed as a single `ToolCalls`
/// event once a turn's `finishReason` arrives, rather than trickled out part
/// by part — the outbound dialects all expect complete call arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    Reasoning {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    Text {
        text: String,
    },
    ToolCalls(Vec<FunctionCallPart>),
    Usage(Usage),
    Done {
        finish_reason: FinishReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    #[default]
    Stop,
    MaxTokens,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
