// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Gateway configuration: the JSON config file (spec §6 sections
//! `server`/`rotation`/`api`/`defaults`/`cache`/`other`) plus sensitive
//! values loaded from an env file or the process environment.

mod env;
mod loader;
mod model;

pub use env::{load_env_file, parse_env_file, resolve as resolve_secrets, Secrets};
pub use loader::{load, search_paths};
pub use model::{
    ApiConfig, CacheConfig, DefaultsConfig, FileConfig, OtherConfig, RotationConfig, ServerConfig,
};
