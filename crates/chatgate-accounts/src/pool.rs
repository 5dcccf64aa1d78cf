// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The credential pool itself: account selection under a [`RotationPolicy`],
//! startup refresh-on-expiry, and outcome-driven bookkeeping.

use std::collections::HashSet;
use std::path::PathBuf;

use chatgate_proto::{Account, AccountOutcome, GatewayError, RotationPolicy};
use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

use crate::refresh;
use crate::storage::{self, AccountWriter};

struct PoolState {
    accounts: Vec<Account>,
    /// Index into `accounts` of the next candidate under `RoundRobin` /
    /// `RequestCount`.
    cursor: usize,
    /// Requests served by the account currently pinned at `cursor`, reset
    /// whenever the cursor advances. Only meaningful under `RequestCount`.
    pinned_count: u32,
    /// Account ids currently known to have an exhausted quota. Cleared in
    /// one atomic sweep once every enabled account is in this set — the
    /// "global exhaustion reset" spec §8 calls for, rather than expiring
    /// entries individually on a timer.
    exhausted: HashSet<String>,
    policy: RotationPolicy,
}

pub struct AccountPool {
    state: Mutex<PoolState>,
    init: OnceCell<()>,
    http: reqwest::Client,
    writer: AccountWriter,
    path: PathBuf,
    oauth_client_id: String,
    oauth_client_secret: String,
}

pub struct RefreshOutcome {
    pub account_id: String,
    pub result: Result<(), GatewayError>,
}

impl AccountPool {
    pub fn new(
        path: PathBuf,
        policy: RotationPolicy,
        oauth_client_id: String,
        oauth_client_secret: String,
    ) -> Self {
        let writer = AccountWriter::spawn(path.clone());
        Self {
            state: Mutex::new(PoolState {
                accounts: Vec::new(),
                cursor: 0,
                pinned_count: 0,
                exhausted: HashSet::new(),
                policy,
            }),
            init: OnceCell::new(),
            http: reqwest::Client::new(),
            writer,
            path,
            oauth_client_id,
            oauth_client_secret,
        }
    }

    /// Loads the account file and refreshes every token within its
    /// expiry window, exactly once no matter how many callers race to call
    /// this at startup. Safe to call on every request; after the first
    /// caller wins the race the rest return immediately.
    pub async fn ensure_initialized(&self) -> anyhow::Result<Vec<RefreshOutcome>> {
        let mut outcomes = Vec::new();
        self.init
            .get_or_try_init(|| async {
                let mut accounts = storage::load(&self.path).await?;
                for account in &mut accounts {
                    account.session_id = Uuid::new_v4().to_string();
                }
                let results = self.refresh_all_expired(&mut accounts).await;
                outcomes = results;
                let mut guard = self.state.lock().await;
                guard.accounts = accounts;
                self.writer.persist(guard.accounts.clone());
                Ok::<_, anyhow::Error>(())
            })
            .await?;
        Ok(outcomes)
    }

    async fn refresh_all_expired(&self, accounts: &mut [Account]) -> Vec<RefreshOutcome> {
        let now = chrono::Utc::now();
        let futures = accounts
            .iter_mut()
            .filter(|a| !a.disabled && a.needs_refresh(now))
            .map(|account| {
                let http = self.http.clone();
                let client_id = self.oauth_client_id.clone();
                let client_secret = self.oauth_client_secret.clone();
                async move {
                    let result = refresh::refresh(&http, account, &client_id, &client_secret).await;
                    if let Err(GatewayError::Auth(reason)) = &result {
                        account.disabled = true;
                        account.disabled_reason = Some(reason.clone());
                    }
                    RefreshOutcome { account_id: account.id.clone(), result }
                }
            });
        futures::future::join_all(futures).await
    }

    /// Selects the next account per the pool's rotation policy. Returns
    /// `None` only when every account is disabled or quota-exhausted.
    pub async fn acquire(&self) -> Option<Account> {
        let mut guard = self.state.lock().await;
        let policy = guard.policy;
        match policy {
            RotationPolicy::RoundRobin => acquire_round_robin(&mut guard),
            RotationPolicy::RequestCount { n } => acquire_request_count(&mut guard, n),
            RotationPolicy::QuotaExhausted => acquire_quota_aware(&mut guard),
        }
    }

    /// Like [`Self::acquire`], but also enforces the 30s expiry buffer
    /// (spec §4.1): if the selected account's token is expired or about to
    /// expire, it's refreshed inline before being handed back. A refresh
    /// rejected with an auth error disables that account and moves on to
    /// the next candidate under the pool's rotation policy, up to once per
    /// account currently in the pool. This is the entry point the
    /// dispatcher calls; bare `acquire` is for callers (tests, admin
    /// introspection) that don't need a ready-to-use token.
    pub async fn acquire_ready(&self) -> Result<Option<Account>, GatewayError> {
        let total = self.state.lock().await.accounts.len().max(1);
        for _ in 0..total {
            let Some(mut account) = self.acquire().await else { return Ok(None) };
            if !account.needs_refresh(chrono::Utc::now()) {
                return Ok(Some(account));
            }
            match refresh::refresh(&self.http, &mut account, &self.oauth_client_id, &self.oauth_client_secret).await
            {
                Ok(()) => {
                    self.update_token(&account).await;
                    return Ok(Some(account));
                }
                Err(GatewayError::Auth(reason)) => {
                    tracing::warn!(account_id = %account.id, %reason, "disabling account after inline refresh failure");
                    self.disable_with_reason(&account.id, reason).await;
                }
                Err(other) => return Err(other),
            }
        }
        Ok(None)
    }

    async fn update_token(&self, account: &Account) {
        let mut guard = self.state.lock().await;
        if let Some(stored) = guard.accounts.iter_mut().find(|a| a.id == account.id) {
            stored.access_token = account.access_token.clone();
            stored.expires_at = account.expires_at;
        }
        self.writer.persist(guard.accounts.clone());
    }

    async fn disable_with_reason(&self, id: &str, reason: String) {
        let mut guard = self.state.lock().await;
        if let Some(stored) = guard.accounts.iter_mut().find(|a| a.id == id) {
            stored.disabled = true;
            stored.disabled_reason = Some(reason);
        }
        self.writer.persist(guard.accounts.clone());
    }

    /// Reports the outcome of a request made against `account` so the pool
    /// can update rotation bookkeeping and, on an unrecoverable auth
    /// failure, disable the account outright.
    pub async fn release(&self, account: &Account, outcome: AccountOutcome) {
        let mut guard = self.state.lock().await;
        let should_persist;
        {
            let stored = guard.accounts.iter_mut().find(|a| a.id == account.id);
            let Some(stored) = stored else { return };
            match outcome {
                AccountOutcome::Ok => {
                    guard.exhausted.remove(&stored.id);
                    should_persist = false;
                }
                AccountOutcome::QuotaExhausted => {
                    guard.exhausted.insert(stored.id.clone());
                    should_persist = false;
                }
                AccountOutcome::AuthInvalid => {
                    stored.disabled = true;
                    stored.disabled_reason = Some("auth rejected by upstream".into());
                    should_persist = true;
                }
                AccountOutcome::TransportError => {
                    should_persist = false;
                }
            }
        }
        if matches!(outcome, AccountOutcome::QuotaExhausted) {
            maybe_reset_exhaustion(&mut guard);
        }
        if should_persist {
            self.writer.persist(guard.accounts.clone());
        }
    }

    pub async fn snapshot(&self) -> Vec<Account> {
        self.state.lock().await.accounts.clone()
    }

    pub async fn add(&self, account: Account) {
        let mut guard = self.state.lock().await;
        guard.accounts.push(account);
        self.writer.persist(guard.accounts.clone());
    }

    pub async fn remove(&self, id: &str) {
        let mut guard = self.state.lock().await;
        guard.accounts.retain(|a| a.id != id);
        self.writer.persist(guard.accounts.clone());
    }

    pub async fn set_disabled(&self, id: &str, disabled: bool) {
        let mut guard = self.state.lock().await;
        if let Some(a) = guard.accounts.iter_mut().find(|a| a.id == id) {
            a.disabled = disabled;
            if !disabled {
                a.disabled_reason = None;
            }
        }
        self.writer.persist(guard.accounts.clone());
    }

    pub async fn set_policy(&self, policy: RotationPolicy) {
        let mut guard = self.state.lock().await;
        guard.policy = policy;
        guard.cursor = 0;
        guard.pinned_count = 0;
    }

    /// Resolves and caches `account_id`'s `project_id` if it hasn't been
    /// looked up yet. A no-op on every call after the first.
    pub async fn ensure_project_id(&self, account_id: &str) -> Result<String, GatewayError> {
        let (access_token, existing) = {
            let guard = self.state.lock().await;
            let account = guard
                .accounts
                .iter()
                .find(|a| a.id == account_id)
                .ok_or_else(|| GatewayError::Internal(format!("unknown account {account_id}")))?;
            (account.access_token.clone(), account.project_id.clone())
        };
        if let Some(project_id) = existing {
            return Ok(project_id);
        }
        let project_id = crate::project::fetch_project_id(&self.http, &access_token).await?;
        let mut guard = self.state.lock().await;
        if let Some(account) = guard.accounts.iter_mut().find(|a| a.id == account_id) {
            account.project_id = Some(project_id.clone());
        }
        self.writer.persist(guard.accounts.clone());
        Ok(project_id)
    }
}

fn active_indices(state: &PoolState) -> Vec<usize> {
    state
        .accounts
        .iter()
        .enumerate()
        .filter(|(_, a)| !a.disabled && !state.exhausted.contains(&a.id))
        .map(|(i, _)| i)
        .collect()
}

fn acquire_round_robin(state: &mut PoolState) -> Option<Account> {
    let n = state.accounts.len();
    if n == 0 {
        return None;
    }
    for offset in 0..n {
        let idx = (state.cursor + offset) % n;
        if !state.accounts[idx].disabled {
            state.cursor = (idx + 1) % n;
            return Some(state.accounts[idx].clone());
        }
    }
    None
}

fn acquire_request_count(state: &mut PoolState, n: u32) -> Option<Account> {
    let total = state.accounts.len();
    if total == 0 {
        return None;
    }
    for offset in 0..total {
        let idx = (state.cursor + offset) % total;
        if !state.accounts[idx].disabled {
            if offset > 0 {
                state.cursor = idx;
                state.pinned_count = 0;
            }
            state.pinned_count += 1;
            let account = state.accounts[idx].clone();
            if state.pinned_count >= n {
                state.cursor = (idx + 1) % total;
                state.pinned_count = 0;
            }
            return Some(account);
        }
    }
    None
}

fn acquire_quota_aware(state: &mut PoolState) -> Option<Account> {
    let mut indices = active_indices(state);
    if indices.is_empty() {
        maybe_reset_exhaustion(state);
        indices = active_indices(state);
        if indices.is_empty() {
            return None;
        }
    }
    let total = state.accounts.len();
    for offset in 0..total {
        let idx = (state.cursor + offset) % total;
        if indices.contains(&idx) {
            state.cursor = (idx + 1) % total;
            return Some(state.accounts[idx].clone());
        }
    }
    None
}

/// Clears the exhausted set in one sweep once every enabled account has
/// been marked exhausted, so the pool doesn't permanently wedge itself
/// after a burst that exhausts the whole fleet.
fn maybe_reset_exhaustion(state: &mut PoolState) {
    let enabled: HashSet<&str> =
        state.accounts.iter().filter(|a| !a.disabled).map(|a| a.id.as_str()).collect();
    if !enabled.is_empty() && enabled.iter().all(|id| state.exhausted.contains(*id)) {
        state.exhausted.clear();
    }
}
