// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! JSON config-file shape (spec §6): `server`, `rotation`, `api`, `defaults`,
//! `cache`, `other`. Every field defaults so an empty `{}` file is valid.

use chatgate_proto::{NormalizedParameters, RotationPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub heartbeat_interval_secs: u64,
    /// RSS threshold in bytes past which the pressure sampler reports
    /// anything above `Low`. See `chatgate-server::pressure`.
    pub memory_threshold_bytes: u64,
    pub max_request_size_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8045,
            host: "0.0.0.0".into(),
            heartbeat_interval_secs: 15,
            memory_threshold_bytes: 1 << 30,
            max_request_size_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RotationConfig {
    RoundRobin,
    QuotaExhausted,
    RequestCount { request_count: u32 },
}

impl Default for RotationConfig {
    fn default() -> Self {
        RotationConfig::RoundRobin
    }
}

impl From<RotationConfig> for RotationPolicy {
    fn from(cfg: RotationConfig) -> Self {
        match cfg {
            RotationConfig::RoundRobin => RotationPolicy::RoundRobin,
            RotationConfig::QuotaExhausted => RotationPolicy::QuotaExhausted,
            RotationConfig::RequestCount { request_count } => {
                RotationPolicy::RequestCount { n: request_count.max(1) }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub models_url: String,
    pub no_stream_url: String,
    pub host: String,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "https://daybreak.googleapis.com/v1internal:streamGenerateContent".into(),
            models_url: "https://daybreak.googleapis.com/v1internal:listModels".into(),
            no_stream_url: "https://daybreak.googleapis.com/v1internal:generateContent".into(),
            host: "daybreak.googleapis.com".into(),
            user_agent: "antigravity".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
    pub thinking_budget: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self { temperature: 0.7, top_p: 0.95, top_k: 40, max_tokens: 8192, thinking_budget: 8192 }
    }
}

impl DefaultsConfig {
    /// Fills every unset field of `params` with this deployment's defaults.
    pub fn fill(&self, params: NormalizedParameters) -> NormalizedParameters {
        NormalizedParameters {
            max_tokens: params.max_tokens.or(Some(self.max_tokens)),
            temperature: params.temperature.or(Some(self.temperature)),
            top_p: params.top_p.or(Some(self.top_p)),
            top_k: params.top_k.or(Some(self.top_k)),
            thinking_budget: params.thinking_budget,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub model_list_ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { model_list_ttl_secs: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtherConfig {
    pub timeout_secs: u64,
    pub retry_times: u32,
    pub skip_project_id_fetch: bool,
    pub use_context_system_prompt: bool,
    pub pass_signature_to_client: bool,
}

impl Default for OtherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            retry_times: 3,
            skip_project_id_fetch: false,
            use_context_system_prompt: true,
            pass_signature_to_client: true,
        }
    }
}

/// Full JSON config-file shape. Every section defaults, so `{}` is a valid
/// file and an absent file is equivalent to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub rotation: RotationConfig,
    pub api: ApiConfig,
    pub defaults: DefaultsConfig,
    pub cache: CacheConfig,
    pub other: OtherConfig,
}
