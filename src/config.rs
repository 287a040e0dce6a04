//! Ambient configuration for the demonstration binary.
//!
//! Not part of the probe domain model (see [`crate::check::spec`] and
//! [`crate::check::context`] for that) — this is the file-level
//! configuration the `task-checker` binary loads to build one supervisor
//! and drive it, analogous to the teacher repo's `GlobalConfig::load_from_path`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{AppError, Result};

/// TOML-shaped mirror of [`crate::check::spec::CheckSpec`].
///
/// Kept separate from the domain type so that the domain type's
/// constructor remains the single place that validates invariants — this
/// struct is the untrusted wire shape read straight off disk.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CheckSpecToml {
    /// One of `"command"`, `"http"`, `"tcp"`.
    pub kind: String,
    /// Seconds to wait before the first probe.
    #[serde(default)]
    pub delay_secs: u64,
    /// Seconds between probes.
    pub interval_secs: u64,
    /// Seconds before a probe is timed out; `0` means no timeout.
    #[serde(default)]
    pub timeout_secs: u64,
    /// Use the IPv6 loopback (`[::1]`) instead of `127.0.0.1`.
    #[serde(default)]
    pub ipv6: bool,
    /// Shell string for `kind = "command"` (mutually exclusive with `argv`).
    #[serde(default)]
    pub shell: Option<String>,
    /// Argv for `kind = "command"` (mutually exclusive with `shell`).
    #[serde(default)]
    pub argv: Option<Vec<String>>,
    /// Environment overrides for `kind = "command"`.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Run the command probe inside a nested container via the agent.
    #[serde(default)]
    pub via_agent: bool,
    /// Port for `kind = "http"` or `kind = "tcp"`.
    #[serde(default)]
    pub port: Option<u16>,
    /// Path for `kind = "http"`; defaults to empty.
    #[serde(default)]
    pub path: Option<String>,
}

/// Top-level configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SupervisorConfig {
    /// Identifier of the observed task, used only for log lines.
    pub task_id: String,
    /// Human-readable probe name, e.g. `"health check"` or `"readiness check"`.
    pub name: String,
    /// Directory containing the `HTTP_PROBE_BIN`/`TCP_PROBE_BIN` helper binaries.
    pub launcher_dir: PathBuf,
    /// Name of the HTTP probe helper binary within `launcher_dir`.
    #[serde(default = "default_http_probe_bin")]
    pub http_probe_bin: String,
    /// Name of the TCP probe helper binary within `launcher_dir`.
    #[serde(default = "default_tcp_probe_bin")]
    pub tcp_probe_bin: String,
    /// Scheme used to build the probed HTTP URL.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Pid of the observed task. Required for a local command check that
    /// also sets `namespaces`.
    #[serde(default)]
    pub task_pid: Option<u32>,
    /// Namespace names a local command probe enters via `nsenter` before
    /// executing. Empty means the probe runs in the supervisor's own.
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Container id of the observed task, required when `check.via_agent`
    /// is set.
    #[serde(default)]
    pub task_container_id: Option<String>,
    /// Base URL of the agent API, required when the check runs via the agent.
    #[serde(default)]
    pub agent_base_url: Option<String>,
    /// Optional bearer token sent as the `Authorization` header to the agent.
    #[serde(default)]
    pub agent_authorization: Option<String>,
    /// The check specification itself, in TOML form.
    pub check: CheckSpecToml,
}

fn default_http_probe_bin() -> String {
    "curl".to_owned()
}

fn default_tcp_probe_bin() -> String {
    "tcp-connect".to_owned()
}

fn default_scheme() -> String {
    "http".to_owned()
}

impl SupervisorConfig {
    /// Load and parse configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the file cannot be read or contains
    /// invalid TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if parsing fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        Ok(config)
    }

    /// Path to the configured HTTP probe helper, joined with `launcher_dir`.
    #[must_use]
    pub fn http_probe_bin_path(&self) -> PathBuf {
        self.launcher_dir.join(&self.http_probe_bin)
    }

    /// Path to the configured TCP probe helper, joined with `launcher_dir`.
    #[must_use]
    pub fn tcp_probe_bin_path(&self) -> PathBuf {
        self.launcher_dir.join(&self.tcp_probe_bin)
    }
}
