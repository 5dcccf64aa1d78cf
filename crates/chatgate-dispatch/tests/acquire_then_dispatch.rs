// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Exercises the acquire-then-dispatch split `chatgate-server`'s route
//! handlers rely on: acquiring an account up front (as translation needs
//! its `project_id`/`session_id`) and handing that same account into
//! `dispatch_unary_with` rather than letting the dispatcher acquire a
//! second, unrelated one.

use std::sync::Arc;
use std::time::Duration;

use chatgate_accounts::AccountPool;
use chatgate_cache::{AlwaysLow, ObjectPool, SignatureCache, ToolNameCache, LINE_BUFFER_CAPS};
use chatgate_dispatch::{ApiEndpoints, Dispatcher, RetryConfig};
use chatgate_proto::{Account, GenerationConfig, InternalRequest, RequestBody, RotationPolicy, StreamEvent};
use chatgate_transport::Transport;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn account(id: &str) -> Account {
    Account {
        id: id.into(),
        email: format!("{id}@example.com"),
        refresh_token: "rt".into(),
        access_token: "at".into(),
        expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        project_id: None,
        disabled: false,
        disabled_reason: None,
        session_id: String::new(),
    }
}

fn request(project: &str) -> InternalRequest {
    InternalRequest {
        project: project.into(),
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
async fn account_acquired_up_front_is_the_same_one_dispatch_uses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"projectId": "proj-resolved"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "hi"}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 1, "candidatesTokenCount": 1, "totalTokenCount": 2},
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pool = Arc::new(AccountPool::new(
        dir.path().join("accounts.json"),
        RotationPolicy::RoundRobin,
        "id".into(),
        "secret".into(),
    ));
    pool.add(account("a")).await;

    let dispatcher = Dispatcher::new(
        pool.clone(),
        Transport::new("antigravity".into(), None, Duration::from_secs(5)).unwrap(),
        RetryConfig { max_attempts: 2, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5) },
        ApiEndpoints { stream_url: format!("{}/stream", server.uri()), no_stream_url: format!("{}/generate", server.uri()) },
        Arc::new(ObjectPool::new(LINE_BUFFER_CAPS, Arc::new(AlwaysLow))),
        Arc::new(SignatureCache::new(Arc::new(AlwaysLow))),
        Arc::new(ToolNameCache::new(Arc::new(AlwaysLow))),
    );

    // Stand in for project-id resolution (`ensure_project_id` talks to the
    // real upstream, not this mock server) by acquiring and annotating the
    // account the way `acquire_account` would.
    let acquired = pool.acquire_ready().await.unwrap().expect("one account in the pool");
    assert_eq!(acquired.id, "a");

    let events = dispatcher
        .dispatch_unary_with(acquired.clone(), request(&acquired.project_id.clone().unwrap_or_default()))
        .await
        .unwrap();
    assert!(events.iter().any(|e| matches!(e, StreamEvent::Text { text } if text == "hi")));

    let snapshot = pool.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert!(!snapshot[0].disabled, "a successful dispatch must not disable the account it used");
}
