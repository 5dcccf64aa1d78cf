// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The inputs an inbound adapter needs beyond the client's own JSON body —
//! account-scoped identifiers and the deployment-wide defaults/flags, all
//! supplied by the caller (`chatgate-server`'s route handlers, from the
//! account they acquired via `chatgate-dispatch` before translating the
//! request) so this crate stays a pure function of its arguments
//! (spec §4.2).

use chatgate_cache::{SignatureCache, ToolNameCache};
use chatgate_proto::NormalizedParameters;

pub struct InboundContext<'a> {
    pub project_id: String,
    pub session_id: String,
    pub user_agent: String,
    /// Deployment-wide generation defaults, already resolved by the caller
    /// (e.g. `DefaultsConfig::fill`) — this crate only fills gaps the client
    /// left, it never reads configuration itself.
    pub defaults: NormalizedParameters,
    pub configured_system_instruction: Option<String>,
    pub use_context_system_prompt: bool,
    pub signatures: &'a SignatureCache,
    pub tool_names: &'a ToolNameCache,
}

/// Flags the outbound renderers need that don't vary per event.
#[derive(Debug, Clone, Copy)]
pub struct OutboundContext {
    /// When `false`, `thoughtSignature`/`signature` fields are stripped from
    /// every outbound frame (spec §4.2).
    pub pass_signature_to_client: bool,
}
