// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Durable storage for the account list: atomic write-then-rename so a
//! crash mid-write never leaves a half-written file behind, plus a
//! background writer task so callers on the request path never block on
//! disk I/O.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chatgate_proto::Account;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct AccountFile {
    accounts: Vec<Account>,
}

pub async fn load(path: &Path) -> anyhow::Result<Vec<Account>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = tokio::fs::read(path).await?;
    let file: AccountFile = serde_json::from_slice(&bytes)?;
    Ok(file.accounts)
}

/// Writes `accounts` to `path` via a sibling temp file followed by a
/// rename, so readers never observe a partially-written file.
pub async fn write_atomic(path: &Path, accounts: &[Account]) -> anyhow::Result<()> {
    let file = AccountFile { accounts: accounts.to_vec() };
    let json = serde_json::to_vec_pretty(&file)?;
    let tmp_path = tmp_path_for(path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = tokio::fs::File::create(&tmp_path).await?;
    tmp.write_all(&json).await?;
    tmp.sync_all().await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serializes persistence requests through a single background task so
/// concurrent callers never race each other writing the same file.
pub struct AccountWriter {
    tx: mpsc::UnboundedSender<Vec<Account>>,
}

impl AccountWriter {
    pub fn spawn(path: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Account>>();
        tokio::spawn(async move {
            while let Some(accounts) = rx.recv().await {
                if let Err(err) = write_atomic(&path, &accounts).await {
                    tracing::error!(error = %err, "failed to persist account file");
                }
            }
        });
        Self { tx }
    }

    pub fn persist(&self, accounts: Vec<Account>) {
        // Best effort: a send failure only happens if the writer task
        // panicked, which we already logged when it occurred.
        let _ = self.tx.send(accounts);
    }
}

/// Short-TTL read-through cache over the account file, for admin listing
/// endpoints that would otherwise re-read the file on every poll.
pub struct FileReadCache {
    path: PathBuf,
    ttl: Duration,
    cached: Mutex<Option<(Instant, Vec<Account>)>>,
}

impl FileReadCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path, ttl: Duration::from_secs(1), cached: Mutex::new(None) }
    }

    pub async fn get(&self) -> anyhow::Result<Vec<Account>> {
        let mut guard = self.cached.lock().await;
        if let Some((at, accounts)) = guard.as_ref() {
            if at.elapsed() < self.ttl {
                return Ok(accounts.clone());
            }
        }
        let accounts = load(&self.path).await?;
        *guard = Some((Instant::now(), accounts.clone()));
        Ok(accounts)
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
