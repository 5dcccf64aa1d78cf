// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Selection strategy the credential pool cycles accounts under.
///
/// `RequestCount(n)` keeps one account pinned for `n` consecutive requests
/// before advancing, rather than rotating on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RotationPolicy {
    RoundRobin,
    QuotaExhausted,
    RequestCount { n: u32 },
}

impl Default for RotationPolicy {
    fn default() -> Self {
        RotationPolicy::RoundRobin
    }
}

/// One OAuth-authenticated upstream identity in the pool.
///
/// `project_id` is fetched lazily on first use rather than at load time, so
/// it starts out `None` for freshly-imported accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub refresh_token: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
    /// Assigned fresh each time the account is loaded into an in-memory
    /// pool; never persisted back to the account file.
    #[serde(skip)]
    pub session_id: String,
}

impl Account {
    /// Spec §8: an access token is due for refresh once it is within 30
    /// seconds of its stated expiry, not only once it has actually expired.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - chrono::Duration::seconds(30)
    }
}

/// Outcome of a single request made against an account, reported back to
/// the pool via `release` so it can update rotation bookkeeping and,
/// for repeated auth failures, disable the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOutcome {
    Ok,
    QuotaExhausted,
    AuthInvalid,
    TransportError,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_expiring_in(secs: i64) -> Account {
        Account {
            id: "a1".into(),
            email: "a@example.com".into(),
            refresh_token: "rt".into(),
            access_token: "at".into(),
            expires_at: Utc::now() + chrono::Duration::seconds(secs),
            project_id: None,
            disabled: false,
            disabled_reason: None,
            session_id: String::new(),
        }
    }

    #[test]
    fn refresh_triggers_inside_30s_window() {
        let acct = account_expiring_in(20);
        assert!(acct.needs_refresh(Utc::now()));
    }

    #[test]
    fn refresh_not_needed_well_before_expiry() {
        let acct = account_expiring_in(3600);
        assert!(!acct.needs_refresh(Utc::now()));
    }

    #[test]
    fn refresh_needed_once_already_expired() {
        let acct = account_expiring_in(-5);
        assert!(acct.needs_refresh(Utc::now()));
    }
}
