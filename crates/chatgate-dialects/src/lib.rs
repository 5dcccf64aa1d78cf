// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Translation between the three client-facing dialects (OpenAI chat,
//! Anthropic messages, Gemini generative-content) and the internal
//! Antigravity protocol.
//!
//! Each dialect module exposes `translate_inbound` (wire request →
//! [`chatgate_proto::InternalRequest`]), a `StreamRenderer` (internal event
//! → streamed wire frames), `render_non_streaming` (aggregated result →
//! one wire response), and `render_error`. `chatgate-server`'s route
//! handlers are the only callers, sitting between this crate and
//! `chatgate-dispatch` — this crate never touches a network socket or an
//! account itself, only the `InboundContext` the caller already resolved
//! one for.

pub mod anthropic;
pub mod context;
pub mod gemini;
pub mod model_map;
pub mod openai;
pub mod params;
pub mod sanitize;
pub mod shared;
pub mod system_instruction;
pub mod tools;

pub use context::{InboundContext, OutboundContext};
pub use shared::{aggregate, Aggregated, GenericMessage, GenericRole, GenericToolCall};
