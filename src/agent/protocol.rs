//! Request/response shapes for the agent's nested-container API.
//!
//! The original agent speaks `RecordIO`-framed protobuf over three call
//! types (`LAUNCH_NESTED_CONTAINER_SESSION`, `WAIT_NESTED_CONTAINER`,
//! `REMOVE_NESTED_CONTAINER`); this client speaks the same three calls over
//! plain JSON, which the agent's HTTP API accepts as an alternate content
//! type (see `DESIGN.md` for why JSON was chosen over protobuf here). The
//! launch call's *response* is still `RecordIO`-framed — see
//! [`super::recordio`] — since it streams a sequence of `ProcessIO` frames
//! rather than a single JSON document.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `LAUNCH_NESTED_CONTAINER_SESSION` request body.
///
/// The container id is generated by the caller (`check-<uuid>`, see
/// `super::super::check::backends::nested_command`), not assigned by the
/// agent, so that it can be remembered for GC even if the launch itself
/// never reaches the agent.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchRequest {
    /// Container id of the observed task, which the new container nests under.
    pub parent_container_id: String,
    /// Caller-generated id for the new nested container.
    pub container_id: String,
    /// Argv to execute inside the nested container.
    pub command: Vec<String>,
    /// Environment variable overrides.
    pub env: HashMap<String, String>,
}

/// `WAIT_NESTED_CONTAINER` request body.
#[derive(Debug, Clone, Serialize)]
pub struct WaitRequest {
    /// The container id to wait on.
    pub container_id: String,
}

/// `WAIT_NESTED_CONTAINER` response body.
///
/// `exit_status` is the raw POSIX wait status, not an already-decoded exit
/// code — see [`super::waitstatus`] for how it is interpreted. `None` means
/// the container was force-killed without ever reporting a status.
#[derive(Debug, Clone, Deserialize)]
pub struct WaitResponse {
    /// Raw wait status of the finished container, if it reported one.
    pub exit_status: Option<i32>,
}

/// `REMOVE_NESTED_CONTAINER` request body.
#[derive(Debug, Clone, Serialize)]
pub struct RemoveRequest {
    /// The container id to remove.
    pub container_id: String,
}

/// One frame of the launch call's `RecordIO`-framed response body.
///
/// Collected for logging only — the probe's actual exit status comes from a
/// separate `WAIT_NESTED_CONTAINER` call, never from this stream.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessIoFrame {
    /// Which stream this chunk of output came from.
    pub channel: ProcessIoChannel,
    /// Raw bytes of output, UTF-8 lossily decoded by the agent.
    #[serde(default)]
    pub data: String,
}

/// The stream a [`ProcessIoFrame`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcessIoChannel {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}
