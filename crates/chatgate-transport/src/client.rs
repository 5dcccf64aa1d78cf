// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The upstream HTTP transport: unary (JSON-in/JSON-out) and streaming
//! (chunked byte reader) request forms against the Antigravity endpoint.
//!
//! Honors process-wide proxy configuration, prefers IPv4 with IPv6
//! fallback (`reqwest`'s default happy-eyeballs resolver already does this;
//! we only need to make sure we don't override it), and keeps connections
//! alive via `reqwest::Client`'s pooled connector.

use std::time::Duration;

use bytes::Bytes;
use chatgate_proto::{GatewayError, InternalRequest};
use futures::Stream;
use reqwest::Client;

/// A byte-chunk stream from the upstream, handed to the Stream Framer.
pub type ByteStream = std::pin::Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Thin wrapper over a configured `reqwest::Client`. One instance is shared
/// process-wide; `reqwest::Client` is already cheaply cloneable and pools
/// its own connections, so there's no separate connection-pool type here.
#[derive(Clone)]
pub struct Transport {
    http: Client,
    user_agent: String,
}

impl Transport {
    /// Builds a transport with keep-alive pooling and an optional
    /// process-wide proxy. `proxy_url` comes from the `PROXY` secret (spec
    /// §6); when absent, the client uses direct connections only.
    pub fn new(user_agent: String, proxy_url: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .gzip(true)
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(timeout);
        if let Some(proxy_url) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        Ok(Self { http: builder.build()?, user_agent })
    }

    /// `POST url` with the internal request body, returning the parsed JSON
    /// response. Used for the non-streaming call variants.
    pub async fn unary(
        &self,
        url: &str,
        access_token: &str,
        body: &InternalRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        let resp = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .header("content-type", "application/json")
            .header("user-agent", &self.user_agent)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream { status: status.as_u16(), body });
        }
        resp.json()
            .await
            .map_err(|e| GatewayError::Internal(format!("malformed upstream response: {e}")))
    }

    /// `POST modelsUrl`, returning the raw `{models: {...}}` body (spec §6).
    /// Used by the Model-List Service to refresh its cache and to surface
    /// per-model quota fractions to the admin surface.
    pub async fn list_models(&self, url: &str, access_token: &str) -> Result<serde_json::Value, GatewayError> {
        let resp = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .header("content-type", "application/json")
            .header("user-agent", &self.user_agent)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream { status: status.as_u16(), body });
        }
        resp.json()
            .await
            .map_err(|e| GatewayError::Internal(format!("malformed model list response: {e}")))
    }

    /// `POST url`, returning the raw status and a byte-chunk stream for the
    /// Stream Framer to consume. The response is not buffered: bytes arrive
    /// as `reqwest` reads them off the socket.
    pub async fn stream(
        &self,
        url: &str,
        access_token: &str,
        body: &InternalRequest,
    ) -> Result<(reqwest::StatusCode, ByteStream), GatewayError> {
        let resp = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .header("user-agent", &self.user_agent)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream { status: status.as_u16(), body: text });
        }
        Ok((status, Box::pin(resp.bytes_stream())))
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Upstream { status: 504, body: "upstream request timed out".into() }
    } else {
        GatewayError::Internal(format!("transport error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_proto::{GenerationConfig, RequestBody};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request() -> InternalRequest {
        InternalRequest {
            project: "proj".into(),
            request_id: "r1".into(),
            model: "gemini-2.5-flash".into(),
            user_agent: "antigravity".into(),
            request: RequestBody {
                contents: vec![],
                tools: vec![],
                tool_config: None,
                generation_config: GenerationConfig::default(),
                session_id: "s1".into(),
                system_instruction: None,
            },
        }
    }

    #[tokio::test]
    async fn unary_success_returns_parsed_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let transport = Transport::new("antigravity".into(), None, Duration::from_secs(5)).unwrap();
        let body = transport
            .unary(&format!("{}/generate", server.uri()), "token", &sample_request())
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn unary_non_2xx_surfaces_as_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let transport = Transport::new("antigravity".into(), None, Duration::from_secs(5)).unwrap();
        let err = transport
            .unary(&format!("{}/generate", server.uri()), "token", &sample_request())
            .await
            .unwrap_err();
        match err {
            GatewayError::Upstream { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "forbidden");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_returns_status_and_byte_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: {}\n\n"))
            .mount(&server)
            .await;

        let transport = Transport::new("antigravity".into(), None, Duration::from_secs(5)).unwrap();
        let (status, mut stream) = transport
            .stream(&format!("{}/stream", server.uri()), "token", &sample_request())
            .await
            .unwrap();
        assert!(status.is_success());
        use futures::StreamExt;
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"data: {}\n\n");
    }
}
