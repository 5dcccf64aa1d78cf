// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The upstream HTTP transport and Stream Framer (spec §4.1/§4.3): issues
//! unary and streaming requests against the Antigravity endpoint, and
//! decodes the streamed response into per-payload protocol events.

mod client;
mod events;
mod framer;

pub use client::{ByteStream, Transport};

pub use events::PayloadParser;
pub use framer::StreamFramer;
