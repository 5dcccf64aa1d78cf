// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Process-wide application state (spec §9: "explicitly-wired component
//! owned by a top-level application context" rather than lazy globals):
//! the credential pool, dispatcher, caches, and admin control-plane state,
//! constructed once at startup and cloned (cheaply, via `Arc`) into every
//! request handler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chatgate_accounts::AccountPool;
use chatgate_cache::{
    AlwaysLow, ModelListCache, ObjectPool, PressureLevel, SignatureCache, ToolNameCache,
    WatchPressureHint, LINE_BUFFER_CAPS,
};
use chatgate_config::{FileConfig, Secrets};
use chatgate_dispatch::{ApiEndpoints, Dispatcher, RetryConfig};
use chatgate_proto::RotationPolicy;
use chatgate_transport::Transport;
use tokio::sync::watch;

use crate::admin::AdminState;

/// Shared state cloned into every axum handler. Cheap to clone: every field
/// is either `Arc`-wrapped or itself cheaply cloneable (`Transport` pools
/// its own connections).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FileConfig>,
    pub secrets: Arc<Secrets>,
    pub accounts: Arc<AccountPool>,
    pub dispatcher: Arc<Dispatcher>,
    pub transport: Transport,
    pub signatures: Arc<SignatureCache>,
    pub tool_names: Arc<ToolNameCache>,
    pub model_list_cache: Arc<ModelListCache>,
    pub pressure_tx: watch::Sender<PressureLevel>,
    pub admin: Arc<AdminState>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires every component from a loaded config/secrets pair, the way
    /// `sven`'s own bootstrap constructs its `AppContext` (spec §9). The
    /// account pool is not refreshed here; the caller decides when to run
    /// `ensure_initialized` (normally right after this returns, before the
    /// HTTP listener binds).
    pub fn build(config: FileConfig, secrets: Secrets, accounts_path: PathBuf) -> anyhow::Result<Self> {
        let (pressure_tx, pressure_hint) = WatchPressureHint::new(PressureLevel::Low);
        let pressure_hint: Arc<dyn chatgate_cache::PressureHint> = Arc::new(pressure_hint);

        let rotation_policy: RotationPolicy = config.rotation.clone().into();
        let accounts = Arc::new(AccountPool::new(
            accounts_path,
            rotation_policy,
            secrets.oauth_client_id.clone(),
            secrets.oauth_client_secret.clone(),
        ));

        let transport = Transport::new(
            config.api.user_agent.clone(),
            secrets.proxy.as_deref(),
            Duration::from_secs(config.other.timeout_secs),
        )?;

        let signatures = Arc::new(SignatureCache::new(pressure_hint.clone()));
        let tool_names = Arc::new(ToolNameCache::new(pressure_hint.clone()));
        let line_buffers = Arc::new(ObjectPool::new(LINE_BUFFER_CAPS, pressure_hint.clone()));
        let model_list_cache = Arc::new(ModelListCache::new(
            config.cache.model_list_ttl_secs.map(Duration::from_secs),
            pressure_hint.clone(),
        ));

        let endpoints = ApiEndpoints {
            stream_url: config.api.url.clone(),
            no_stream_url: config.api.no_stream_url.clone(),
        };
        let dispatcher = Arc::new(Dispatcher::new(
            accounts.clone(),
            transport.clone(),
            RetryConfig::from_retry_times(config.other.retry_times),
            endpoints,
            line_buffers,
            signatures.clone(),
            tool_names.clone(),
        ));

        let admin = Arc::new(AdminState::new(&secrets));

        Ok(Self {
            config: Arc::new(config),
            secrets: Arc::new(secrets),
            accounts,
            dispatcher,
            transport,
            signatures,
            tool_names,
            model_list_cache,
            pressure_tx,
            admin,
            started_at: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_wires_every_component_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::build(
            FileConfig::default(),
            Secrets {
                api_key: None,
                admin_username: "admin".into(),
                admin_password: "pw".into(),
                jwt_secret: "secret".into(),
                proxy: None,
                system_instruction: None,
                image_base_url: None,
                oauth_client_id: "id".into(),
                oauth_client_secret: "secret".into(),
            },
            dir.path().join("accounts.json"),
        )
        .unwrap();
        assert_eq!(state.uptime_secs(), 0);
    }
}
