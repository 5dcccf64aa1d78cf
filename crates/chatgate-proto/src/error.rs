// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// The gateway's internal error taxonomy (spec §7). Outbound dialects each
/// render these into their own error envelope shape; nothing downstream of
/// the dispatcher should need to inspect upstream HTTP status codes again.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// The request exceeded the model's context window. Distinguished from
    /// [`GatewayError::Upstream`] because it is a client-correctable error,
    /// not a sign the serving account should be rotated out or disabled.
    #[error("context window exceeded: {0}")]
    ContextOverflow(String),

    #[error("upstream error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("rate limited, retry after {retry_after_ms:?}ms")]
    RateLimit { retry_after_ms: Option<u64> },

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// The HTTP status the owning dialect's error envelope should carry.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Validation(_) | GatewayError::ContextOverflow(_) => 400,
            GatewayError::Auth(_) => 401,
            GatewayError::RateLimit { .. } => 429,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::Cancelled => 499,
            GatewayError::Internal(_) => 500,
        }
    }
}
