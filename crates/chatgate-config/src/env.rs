// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Sensitive values (spec §6): `API_KEY`, `ADMIN_USERNAME`, `ADMIN_PASSWORD`,
//! `JWT_SECRET`, `PROXY`, `SYSTEM_INSTRUCTION`, `IMAGE_BASE_URL`. Loaded from
//! a dotenv-style env file plus the process environment (the latter wins),
//! never from the JSON config file.

use std::collections::HashMap;
use std::path::Path;

use rand::distributions::Alphanumeric;
use rand::Rng;

/// The installed-app OAuth client this gateway authenticates accounts
/// under. Desktop/CLI OAuth clients aren't confidential by design (they
/// ship inside the binary), so unlike the admin credentials below these
/// have a built-in default rather than being generated per process.
const DEFAULT_OAUTH_CLIENT_ID: &str = "chatgate-installed-app.apps.googleusercontent.com";
const DEFAULT_OAUTH_CLIENT_SECRET: &str = "chatgate-installed-app-secret";

/// Resolved sensitive configuration. Missing admin credentials are
/// generated fresh per process and logged once at startup rather than
/// silently defaulting to something guessable.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub api_key: Option<String>,
    pub admin_username: String,
    pub admin_password: String,
    pub jwt_secret: String,
    pub proxy: Option<String>,
    pub system_instruction: Option<String>,
    pub image_base_url: Option<String>,
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
}

/// Parses a minimal `KEY=value` dotenv file, one assignment per line.
/// Blank lines and lines starting with `#` are skipped; values are not
/// quote-unescaped beyond stripping a single matching pair of quotes.
pub fn parse_env_file(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim().to_string();
        let mut value = value.trim().to_string();
        if value.len() >= 2 {
            let first = value.chars().next().unwrap();
            let last = value.chars().last().unwrap();
            if (first == '"' && last == '"') || (first == '\'' && last == '\'') {
                value = value[1..value.len() - 1].to_string();
            }
        }
        vars.insert(key, value);
    }
    vars
}

pub async fn load_env_file(path: &Path) -> HashMap<String, String> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => parse_env_file(&contents),
        Err(_) => HashMap::new(),
    }
}

/// Resolves [`Secrets`] from a parsed env file merged under the process
/// environment (`std::env::var` takes priority over the file). Missing
/// `ADMIN_USERNAME`/`ADMIN_PASSWORD`/`JWT_SECRET` are generated and logged.
pub fn resolve(file_vars: &HashMap<String, String>) -> Secrets {
    let get = |key: &str| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned());

    let admin_username = get("ADMIN_USERNAME").unwrap_or_else(|| {
        let generated = format!("admin-{}", random_suffix(6));
        tracing::info!(username = %generated, "ADMIN_USERNAME not set, generated one for this process");
        generated
    });
    let admin_password = get("ADMIN_PASSWORD").unwrap_or_else(|| {
        let generated = random_suffix(24);
        tracing::info!(password = %generated, "ADMIN_PASSWORD not set, generated one for this process");
        generated
    });
    let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
        tracing::warn!("JWT_SECRET not set, generated an ephemeral one for this process");
        random_suffix(48)
    });

    Secrets {
        api_key: get("API_KEY"),
        admin_username,
        admin_password,
        jwt_secret,
        proxy: get("PROXY"),
        system_instruction: get("SYSTEM_INSTRUCTION"),
        image_base_url: get("IMAGE_BASE_URL"),
        oauth_client_id: get("OAUTH_CLIENT_ID").unwrap_or_else(|| DEFAULT_OAUTH_CLIENT_ID.into()),
        oauth_client_secret: get("OAUTH_CLIENT_SECRET").unwrap_or_else(|| DEFAULT_OAUTH_CLIENT_SECRET.into()),
    }
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_assignments() {
        let vars = parse_env_file("API_KEY=sk-123\nPROXY=\"http://proxy:8080\"\n# comment\n\nJWT_SECRET='abc'");
        assert_eq!(vars.get("API_KEY"), Some(&"sk-123".to_string()));
        assert_eq!(vars.get("PROXY"), Some(&"http://proxy:8080".to_string()));
        assert_eq!(vars.get("JWT_SECRET"), Some(&"abc".to_string()));
        assert_eq!(vars.len(), 3);
    }

    #[test]
    fn missing_admin_credentials_are_generated() {
        let secrets = resolve(&HashMap::new());
        assert!(secrets.admin_username.starts_with("admin-"));
        assert_eq!(secrets.admin_password.len(), 24);
        assert_eq!(secrets.jwt_secret.len(), 48);
    }

    #[test]
    fn file_values_are_used_when_present() {
        let mut vars = HashMap::new();
        vars.insert("ADMIN_USERNAME".to_string(), "root".to_string());
        let secrets = resolve(&vars);
        assert_eq!(secrets.admin_username, "root");
    }
}
