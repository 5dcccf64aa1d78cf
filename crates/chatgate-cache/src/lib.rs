// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Signature, tool-name, and model-list caches plus the pressure-indexed
//! object pools used on the streaming hot path.

mod model_list_cache;
mod pool;
mod pressure;
mod signature_cache;
mod tool_name_cache;

pub use model_list_cache::ModelListCache;
pub use pool::{ObjectPool, Resettable, CHUNK_SKELETON_CAPS, LINE_BUFFER_CAPS, TOOL_CALL_SKELETON_CAPS};
pub use pressure::{AlwaysLow, PressureHint, PressureLevel, PressureTable, WatchPressureHint};
pub use signature_cache::SignatureCache;
pub use tool_name_cache::ToolNameCache;
