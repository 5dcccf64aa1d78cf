// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Admin control plane (spec §6): out of scope as a feature per spec §1, but
//! the HTTP surface still needs something real mounted at `/admin/*` so the
//! auth boundary is demonstrably correct. `AdminApi` is a minimal trait over
//! account CRUD + rotation-policy mutation + per-account quota lookup, with
//! `AppState` as its only (in-memory) implementation — login issues a
//! short-lived JWT the same way `sven-gateway`/`sven-node` mint their own
//! control-plane tokens, just swapping the bearer-hash check in
//! `sven-gateway/src/http/auth.rs` for a signed JWT.

use async_trait::async_trait;
use chatgate_proto::{Account, GatewayError, RotationPolicy};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::state::AppState;

const ADMIN_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

/// Admin credentials and the JWT signing key, split out of [`AppState`] so
/// the rest of the app doesn't need to know how admin auth is implemented.
pub struct AdminState {
    username: String,
    password: String,
    jwt_secret: String,
}

impl AdminState {
    pub fn new(secrets: &chatgate_config::Secrets) -> Self {
        Self {
            username: secrets.admin_username.clone(),
            password: secrets.admin_password.clone(),
            jwt_secret: secrets.jwt_secret.clone(),
        }
    }

    /// Constant-time comparison on both fields: a correct username but wrong
    /// password (or vice versa) must take the same time as both wrong.
    fn credentials_match(&self, username: &str, password: &str) -> bool {
        let user_ok: bool = self.username.as_bytes().ct_eq(username.as_bytes()).into();
        let pass_ok: bool = self.password.as_bytes().ct_eq(password.as_bytes()).into();
        user_ok & pass_ok
    }

    fn issue_token(&self) -> anyhow::Result<String> {
        let claims = Claims { sub: self.username.clone(), exp: chrono::Utc::now().timestamp() + ADMIN_TOKEN_TTL_SECS };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(self.jwt_secret.as_bytes()))?;
        Ok(token)
    }

    pub fn verify_token(&self, token: &str) -> bool {
        decode::<Claims>(token, &DecodingKey::from_secret(self.jwt_secret.as_bytes()), &Validation::default()).is_ok()
    }
}

/// The account-CRUD + rotation-policy surface mounted at `/admin/*`.
/// `AppState` is the only implementation; the trait exists so routes are
/// written against an interface rather than the concrete struct, matching
/// the ModelProvider-as-trait-boundary shape used throughout `sven-model`.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Option<String>;
    async fn list_accounts(&self) -> Vec<Account>;
    async fn add_account(&self, account: Account);
    async fn remove_account(&self, id: &str);
    async fn set_disabled(&self, id: &str, disabled: bool);
    async fn set_rotation_policy(&self, policy: RotationPolicy);
    async fn quota_for(&self, id: &str) -> Result<Value, GatewayError>;
}

#[async_trait]
impl AdminApi for AppState {
    async fn login(&self, username: &str, password: &str) -> Option<String> {
        if self.admin.credentials_match(username, password) {
            self.admin.issue_token().ok()
        } else {
            None
        }
    }

    async fn list_accounts(&self) -> Vec<Account> {
        self.accounts.snapshot().await
    }

    async fn add_account(&self, account: Account) {
        self.accounts.add(account).await;
    }

    async fn remove_account(&self, id: &str) {
        self.accounts.remove(id).await;
    }

    async fn set_disabled(&self, id: &str, disabled: bool) {
        self.accounts.set_disabled(id, disabled).await;
    }

    async fn set_rotation_policy(&self, policy: RotationPolicy) {
        self.accounts.set_policy(policy).await;
    }

    async fn quota_for(&self, id: &str) -> Result<Value, GatewayError> {
        let account = self
            .accounts
            .snapshot()
            .await
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| GatewayError::Validation(format!("unknown account id {id}")))?;
        self.transport.list_models(&self.config.api.models_url, &account.access_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_config::Secrets;

    fn secrets() -> Secrets {
        Secrets {
            api_key: None,
            admin_username: "admin".into(),
            admin_password: "hunter2".into(),
            jwt_secret: "test-secret".into(),
            proxy: None,
            system_instruction: None,
            image_base_url: None,
            oauth_client_id: "id".into(),
            oauth_client_secret: "secret".into(),
        }
    }

    #[test]
    fn correct_credentials_issue_a_verifiable_token() {
        let admin = AdminState::new(&secrets());
        assert!(admin.credentials_match("admin", "hunter2"));
        let token = admin.issue_token().unwrap();
        assert!(admin.verify_token(&token));
    }

    #[test]
    fn wrong_password_does_not_match() {
        let admin = AdminState::new(&secrets());
        assert!(!admin.credentials_match("admin", "wrong"));
    }

    #[test]
    fn wrong_username_does_not_match() {
        let admin = AdminState::new(&secrets());
        assert!(!admin.credentials_match("nobody", "hunter2"));
    }

    #[test]
    fn token_signed_with_a_different_secret_is_rejected() {
        let admin = AdminState::new(&secrets());
        let other = AdminState::new(&Secrets { jwt_secret: "other-secret".into(), ..secrets() });
        let token = other.issue_token().unwrap();
        assert!(!admin.verify_token(&token));
    }
}
