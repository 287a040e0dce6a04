//! Runtime context a supervisor needs beyond the immutable [`super::spec::CheckSpec`]:
//! where the probe helper binaries live, whether command probes run locally
//! or via the agent, and what scheme/authorization the nested-container and
//! HTTP probes use.

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::AgentClient;

/// Where a command probe actually executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Fork/exec directly in the supervisor's own process tree.
    Local,
    /// Dispatch via the agent's nested-container RPC.
    ViaAgent,
}

/// Mutable-at-setup, immutable-thereafter context shared by every tick of a
/// single supervisor's lifetime. Distinct from [`super::spec::CheckSpec`]
/// because it carries operational concerns (binary paths, RPC client) that
/// have no bearing on what the check *is*, only on how it runs.
#[derive(Clone)]
pub struct SupervisorContext {
    /// Identifier of the observed task, used only for log lines.
    pub task_id: String,
    /// Human-readable probe name (e.g. `"health check"`, `"readiness check"`),
    /// used only for log lines.
    pub probe_name: String,
    /// Whether command probes run locally or via the agent.
    pub execution_mode: ExecutionMode,
    /// Pid of the observed task, entered via `namespaces` for local command
    /// probes. `None` means the probe runs without entering any namespace.
    pub task_pid: Option<u32>,
    /// Namespace names (`net`, `mnt`, `pid`, ...) a local command probe
    /// enters before executing, via the opaque namespace-entry facility
    /// (`spec.md` §1 "Out of scope"; modeled here as `nsenter` invocation —
    /// see [`super::backends::command`]).
    pub namespaces: Vec<String>,
    /// Container id of the observed task. Required when `execution_mode`
    /// is `ViaAgent`, since every nested container is parented to it.
    pub task_container_id: Option<String>,
    /// Directory containing the HTTP/TCP probe helper binaries.
    pub launcher_dir: PathBuf,
    /// Name of the HTTP probe helper binary within `launcher_dir`.
    pub http_probe_bin: String,
    /// Name of the TCP probe helper binary within `launcher_dir`.
    pub tcp_probe_bin: String,
    /// HTTP scheme used to build the probed URL (`"http"` or `"https"`).
    pub scheme: String,
    /// Agent RPC client, present whenever `execution_mode` is `ViaAgent`.
    pub agent_client: Option<Arc<AgentClient>>,
}

impl SupervisorContext {
    /// Path to the configured HTTP probe helper.
    #[must_use]
    pub fn http_probe_bin_path(&self) -> PathBuf {
        self.launcher_dir.join(&self.http_probe_bin)
    }

    /// Path to the configured TCP probe helper.
    #[must_use]
    pub fn tcp_probe_bin_path(&self) -> PathBuf {
        self.launcher_dir.join(&self.tcp_probe_bin)
    }

    /// Loopback address to probe for HTTP/TCP checks, honoring `ipv6`.
    #[must_use]
    pub fn loopback_host(ipv6: bool) -> &'static str {
        if ipv6 {
            "::1"
        } else {
            "127.0.0.1"
        }
    }
}

/// Coarse supervisor lifecycle state, reported to callers inspecting a
/// running supervisor (used by tests and future diagnostics, not by the
/// scheduler loop itself, which tracks pause/stop via its own handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Ticking on schedule.
    Running,
    /// Paused; ticks are suppressed until resumed.
    Paused,
    /// Permanently stopped.
    Stopped,
}
