// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Config file search and load.
//!
//! Search order mirrors `sven-node`'s layered config discovery, adapted to
//! JSON and to a single merge step rather than a deep multi-layer merge: an
//! explicit `--config` path wins outright; otherwise `./chatgate.json` in
//! the working directory, then `~/.config/chatgate/config.json`. The first
//! one found is used as-is — sections not present in the file keep their
//! compiled-in defaults (see [`crate::model::FileConfig`]'s per-section
//! `Default` impls).

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::model::FileConfig;

pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("./chatgate.json")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("chatgate").join("config.json"));
    }
    paths
}

/// Loads the config file at `explicit_path` if given, else the first
/// existing path from [`search_paths`], else compiled-in defaults.
pub async fn load(explicit_path: Option<&Path>) -> anyhow::Result<FileConfig> {
    if let Some(path) = explicit_path {
        return load_file(path).await.with_context(|| format!("loading config from {}", path.display()));
    }
    for candidate in search_paths() {
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            tracing::info!(path = %candidate.display(), "loaded config file");
            return load_file(&candidate).await;
        }
    }
    tracing::info!("no config file found, using built-in defaults");
    Ok(FileConfig::default())
}

async fn load_file(path: &Path) -> anyhow::Result<FileConfig> {
    let bytes = tokio::fs::read(path).await.with_context(|| format!("reading {}", path.display()))?;
    let config: FileConfig =
        serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_explicit_path_errors() {
        let err = load(Some(Path::new("/nonexistent/chatgate.json"))).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn partial_file_keeps_other_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatgate.json");
        tokio::fs::write(&path, r#"{"server":{"port":9000}}"#).await.unwrap();
        let config = load(Some(&path)).await.unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.defaults.temperature, 0.7);
    }

    #[tokio::test]
    async fn no_path_and_no_file_returns_defaults() {
        let config = load(None).await.unwrap();
        assert_eq!(config.other.retry_times, 3);
    }
}
