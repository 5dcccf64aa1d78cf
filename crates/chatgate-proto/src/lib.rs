// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Internal protocol types shared by every gateway crate: the `Content`/`Part`
//! data model, the outbound Antigravity request envelope, stream events, the
//! account/rotation-policy types, and the gateway error taxonomy.

mod account;
mod content;
mod error;
mod events;
mod request;

pub use account::{Account, AccountOutcome, RotationPolicy};
pub use content::{
    Content, FunctionCallPart, FunctionResponseBody, FunctionResponsePart, InlineData, Part, Role,
};
pub use error::GatewayError;
pub use events::{FinishReason, StreamEvent, Usage};
pub use request::{
    GenerationConfig, InternalRequest, NormalizedParameters, RequestBody, SystemInstruction,
    SystemInstructionPart, ThinkingConfig, ToolDeclaration,
};
