//! Client for the remote session gateway, the service that actually runs
//! agent work sessions. The gateway is opaque to us: spawn, list, send.
//!
//! There is deliberately no teardown call here — the gateway exposes none,
//! and sessions are spawned with `cleanup: "keep"` so they stay around for
//! review after their agent row is terminated.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ApiError;
use crate::config::GatewayConfig;

/// Ceiling passed to the gateway; enforced remotely, not observable here.
const RUN_TIMEOUT_SECONDS: u64 = 3600;

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Clone)]
pub struct SpawnedSession {
    pub session_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpawnRequest<'a> {
    label: String,
    task: String,
    // the gateway's own agent template, not ours
    agent_id: &'a str,
    run_timeout_seconds: u64,
    cleanup: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpawnResponse {
    session_key: String,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        }
    }

    /// Ask the gateway for a new working session running `task` under the
    /// given display name. Returns the session handle.
    pub async fn spawn_session(
        &self,
        name: &str,
        task: &str,
        agent_id: &str,
    ) -> Result<SpawnedSession, ApiError> {
        let briefing = format!(
            "You are {name}, an AI agent working on: {task}\n\n\
             Your mission:\n\
             1. Work on the assigned task\n\
             2. Report progress via POST to the dashboard API\n\
             3. Ask for help when stuck\n\n\
             Task: {task}"
        );
        let request = SpawnRequest {
            label: format!("agent-{agent_id}"),
            task: briefing,
            agent_id: "default",
            run_timeout_seconds: RUN_TIMEOUT_SECONDS,
            cleanup: "keep",
        };

        let resp = self
            .http
            .post(format!("{}/v1/sessions/spawn", self.base_url))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|err| ApiError::internal(format!("gateway request failed: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::internal(format!("gateway returned {status}: {body}")));
        }

        let body: SpawnResponse = resp
            .json()
            .await
            .map_err(|err| ApiError::internal(format!("failed to parse gateway response: {err}")))?;
        Ok(SpawnedSession { session_key: body.session_key })
    }

    /// Current sessions as the gateway reports them, passed through verbatim.
    pub async fn list_sessions(&self) -> Result<Value, ApiError> {
        let resp = self
            .http
            .get(format!("{}/v1/sessions", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| ApiError::internal(format!("gateway request failed: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::internal(format!("gateway returned {status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|err| ApiError::internal(format!("failed to parse gateway response: {err}")))
    }

    /// Relay a message into an existing session.
    pub async fn send_message(&self, session_key: &str, message: &str) -> Result<(), ApiError> {
        let resp = self
            .http
            .post(format!("{}/v1/sessions/{session_key}/send", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await
            .map_err(|err| ApiError::internal(format!("gateway request failed: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::internal(format!("gateway returned {status}: {body}")));
        }
        Ok(())
    }
}
