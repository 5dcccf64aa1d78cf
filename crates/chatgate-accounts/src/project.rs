// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Lazy `project_id` resolution.
//!
//! Accounts are imported with their OAuth credentials only; the Google Cloud
//! project they're billed under is discovered on first use and cached on the
//! account afterward, rather than required up front at import time.

use chatgate_proto::GatewayError;
use serde::Deserialize;

const PROJECTS_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com/v1/projects";

#[derive(Debug, Deserialize)]
struct ProjectListResponse {
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct Project {
    #[serde(rename = "projectId")]
    project_id: String,
}

/// Returns the first project visible to `access_token`. Callers treat a
/// missing project list as an internal error rather than a validation
/// error: by the time a request reaches this point the account's OAuth
/// grant has already been accepted, so an empty list means something is
/// wrong with the account's cloud setup, not the client's request.
pub async fn fetch_project_id(http: &reqwest::Client, access_token: &str) -> Result<String, GatewayError> {
    let resp = http
        .get(PROJECTS_ENDPOINT)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| GatewayError::Internal(format!("project lookup failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(GatewayError::Upstream { status, body });
    }

    let parsed: ProjectListResponse = resp
        .json()
        .await
        .map_err(|e| GatewayError::Internal(format!("malformed project list: {e}")))?;

    parsed
        .projects
        .into_iter()
        .next()
        .map(|p| p.project_id)
        .ok_or_else(|| GatewayError::Internal("account has no visible project".into()))
}
