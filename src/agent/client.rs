//! HTTP RPC client for the agent's nested-container API.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::Client;

use super::protocol::{LaunchRequest, RemoveRequest, WaitRequest, WaitResponse};

/// An agent RPC call failed. Callers (the nested-command backend) decide
/// whether a given call's failure is transient or definitive per
/// `spec.md` §4.3 — this type carries only the message.
#[derive(Debug)]
pub struct AgentError(pub String);

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for AgentError {}

/// Thin RPC client over the agent's nested-container HTTP API.
///
/// Modeled on the teacher's direct, trait-free use of `reqwest::Client` for
/// external service calls — no dyn-object indirection; tests substitute a
/// real local HTTP server (`httpmock`) rather than a mock implementation.
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: Client,
    base_url: String,
    authorization: Option<String>,
}

impl AgentClient {
    /// Build a client pointed at the agent's base URL, optionally
    /// authenticating every call with a bearer token.
    #[must_use]
    pub fn new(base_url: impl Into<String>, authorization: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            authorization,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.authorization {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// `LAUNCH_NESTED_CONTAINER_SESSION`: start `command` inside a fresh
    /// nested container parented to `parent_container_id`, identified by
    /// the caller-supplied `container_id`.
    ///
    /// Returns the full response body, a `RecordIO`-framed stream of
    /// `ProcessIO` frames (`super::recordio`) — collected, not consumed
    /// live, per `spec.md` §4.3 step 4.
    ///
    /// Per §4.3 step 6, every non-2xx response here is reported the same
    /// way as a connection failure: the caller maps it to `Transient`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection failure or a non-2xx response.
    pub async fn launch_nested_container(
        &self,
        parent_container_id: &str,
        container_id: &str,
        command: Vec<String>,
        env: HashMap<String, String>,
    ) -> Result<Bytes, AgentError> {
        let body = LaunchRequest {
            parent_container_id: parent_container_id.to_owned(),
            container_id: container_id.to_owned(),
            command,
            env,
        };

        let response = self
            .request(reqwest::Method::POST, "/api/v1/nested-containers/launch")
            .header(reqwest::header::ACCEPT, "application/recordio")
            .json(&body)
            .send()
            .await
            .map_err(|err| AgentError(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError(format!(
                "launch returned {}",
                response.status()
            )));
        }

        response.bytes().await.map_err(|err| AgentError(err.to_string()))
    }

    /// `WAIT_NESTED_CONTAINER`: block until the nested container exits,
    /// returning its raw POSIX wait status (`None` if it was force-killed
    /// without ever reporting one).
    ///
    /// Never wrapped in a timeout by this client — per §4.3, once launch
    /// has been attempted the caller always waits out this call, even past
    /// the probe's own timeout, so the container reaches a terminal state
    /// before the next tick's GC step.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection failure or a non-2xx response.
    pub async fn wait_nested_container(&self, container_id: &str) -> Result<Option<i32>, AgentError> {
        let response = self
            .request(reqwest::Method::POST, "/api/v1/nested-containers/wait")
            .json(&WaitRequest {
                container_id: container_id.to_owned(),
            })
            .send()
            .await
            .map_err(|err| AgentError(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError(format!("wait returned {}", response.status())));
        }

        let wait: WaitResponse = response
            .json()
            .await
            .map_err(|err| AgentError(err.to_string()))?;
        Ok(wait.exit_status)
    }

    /// `REMOVE_NESTED_CONTAINER`: garbage-collect a container left over from
    /// a previous tick. A 404 (already gone) counts as success.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection failure or any other non-2xx
    /// response; per §4.3 step 1 the caller treats every failure here as
    /// `Transient` and retries GC at the next tick.
    pub async fn remove_nested_container(&self, container_id: &str) -> Result<(), AgentError> {
        let response = self
            .request(reqwest::Method::POST, "/api/v1/nested-containers/remove")
            .json(&RemoveRequest {
                container_id: container_id.to_owned(),
            })
            .send()
            .await
            .map_err(|err| AgentError(err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }
        Err(AgentError(format!("remove returned {}", response.status())))
    }
}
