// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Drives `/v1/models` and `/v1beta/models` through the real router with no
//! accounts configured, confirming the Model-List Service's "serve the
//! default list unconditionally rather than fail" fallback (spec §4.6).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chatgate_config::{FileConfig, Secrets};
use tower::ServiceExt;

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

async fn router() -> axum::Router {
    let dir = tempfile::tempdir().unwrap();
    let state = chatgate_server::AppState::build(FileConfig::default(), secrets(), dir.path().join("accounts.json")).unwrap();
    chatgate_server::build_router(state)
}

#[tokio::test]
async fn openai_model_list_falls_back_to_defaults_with_no_accounts() {
    let app = router().await;
    let response = app.oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let ids: Vec<&str> = value["data"].as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&"claude-opus-4-5"));
}

#[tokio::test]
async fn gemini_model_list_falls_back_to_defaults_with_no_accounts() {
    let app = router().await;
    let response =
        app.oneshot(Request::builder().uri("/v1beta/models").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let names: Vec<&str> = value["models"].as_array().unwrap().iter().map(|m| m["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"models/gemini-2.5-pro"));
}
