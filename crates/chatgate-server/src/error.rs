// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Maps a [`GatewayError`] to the HTTP status this gateway's own surface
//! returns (spec §6). This is deliberately separate from
//! `GatewayError::status_code`, which is embedded as the `code` field
//! inside each dialect's JSON error envelope and mirrors the *upstream*
//! status rather than what the client sees here: a dispatcher-level
//! [`GatewayError::Auth`] always means "the account lost upstream
//! permission" (spec §7: "no usage permission"), which this gateway reports
//! as 403, not 401 — 401 is reserved for this gateway's own API-key check,
//! which never produces a `GatewayError` at all (rejected by
//! `crate::auth` before a request reaches the dispatcher).

use axum::http::StatusCode;
use chatgate_proto::GatewayError;

pub fn http_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Validation(_) | GatewayError::ContextOverflow(_) => StatusCode::BAD_REQUEST,
        GatewayError::Auth(_) => StatusCode::FORBIDDEN,
        GatewayError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
        GatewayError::Upstream { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        GatewayError::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatcher_auth_error_is_403_not_401() {
        assert_eq!(http_status(&GatewayError::Auth("no usage permission".into())), StatusCode::FORBIDDEN);
    }

    #[test]
    fn context_overflow_is_400() {
        assert_eq!(http_status(&GatewayError::ContextOverflow("too many tokens".into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limit_is_429() {
        assert_eq!(http_status(&GatewayError::RateLimit { retry_after_ms: None }), StatusCode::TOO_MANY_REQUESTS);
    }
}
