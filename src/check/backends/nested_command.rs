//! Command probe executed inside a nested container of the observed task,
//! via the agent's RPC surface (`spec.md` §4.3).

use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::agent::waitstatus::{self, WaitStatus};
use crate::agent::AgentClient;
use crate::check::outcome::{CheckStatusInfo, ProbeOutcome};
use crate::check::spec::{CommandPayload, CommandSpec};
use crate::check::timeout::format_timeout;

/// Run one nested-container probe tick.
///
/// `previous_container_id` is the supervisor's remembered container id from
/// the prior tick (`SupervisorState::previousCheckContainerId`). It is
/// cleared only once the agent confirms removal, and is populated with the
/// new container's id as soon as launch is attempted — even if launch
/// itself then fails — so a half-launched container can still be GC'd on
/// the next tick.
pub async fn run(
    client: &AgentClient,
    task_container_id: &str,
    spec: &CommandSpec,
    timeout: Option<Duration>,
    previous_container_id: &mut Option<String>,
) -> ProbeOutcome {
    if let Some(prev) = previous_container_id.clone() {
        match client.remove_nested_container(&prev).await {
            Ok(()) => *previous_container_id = None,
            Err(err) => {
                debug!(container_id = %prev, %err, "nested container GC failed, retrying next tick");
                return ProbeOutcome::Transient;
            }
        }
    }

    let container_id = format!("check-{}", Uuid::new_v4());
    *previous_container_id = Some(container_id.clone());

    let launch = client.launch_nested_container(
        task_container_id,
        &container_id,
        argv(spec),
        spec.env.clone(),
    );

    match timeout {
        None => match launch.await {
            Ok(body) => {
                log_output(&body);
                finish(client, &container_id).await
            }
            Err(err) => {
                debug!(%err, "nested launch failed");
                ProbeOutcome::Transient
            }
        },
        Some(duration) => match tokio::time::timeout(duration, launch).await {
            Ok(Ok(body)) => {
                log_output(&body);
                finish(client, &container_id).await
            }
            Ok(Err(err)) => {
                debug!(%err, "nested launch failed");
                ProbeOutcome::Transient
            }
            Err(_elapsed) => {
                // The agent is expected to kill the nested container as a
                // consequence of this connection being dropped. Still wait
                // for it to reach a terminal state before handing control
                // back, so the next tick's GC never races a live container
                // (spec.md §4.3 "On timeout").
                let _ = client.wait_nested_container(&container_id).await;
                ProbeOutcome::DefinitiveError(format!(
                    "check timed out after {}",
                    format_timeout(duration)
                ))
            }
        },
    }
}

async fn finish(client: &AgentClient, container_id: &str) -> ProbeOutcome {
    match client.wait_nested_container(container_id).await {
        Err(err) => ProbeOutcome::DefinitiveError(err.to_string()),
        Ok(None) => ProbeOutcome::DefinitiveError(
            "nested container wait returned no exit status (force-killed)".into(),
        ),
        Ok(Some(raw_status)) => match waitstatus::decode(raw_status) {
            WaitStatus::Signaled(signal) if signal == sigkill_value() => {
                // The task likely finished while the probe was in flight —
                // not a verdict on the check itself.
                ProbeOutcome::Transient
            }
            WaitStatus::Signaled(signal) => {
                ProbeOutcome::DefinitiveError(format!("nested probe terminated by signal {signal}"))
            }
            WaitStatus::Exited(code) => ProbeOutcome::Result(CheckStatusInfo::Command { exit_code: code }),
        },
    }
}

/// `SIGKILL`'s numeric value, sourced from `nix` on unix (already a
/// dependency for process-tree killing) rather than pulling in `libc` just
/// for one constant; on other targets it is the POSIX-standard value `9`.
#[cfg(unix)]
fn sigkill_value() -> i32 {
    nix::sys::signal::Signal::SIGKILL as i32
}

#[cfg(not(unix))]
fn sigkill_value() -> i32 {
    9
}

fn argv(spec: &CommandSpec) -> Vec<String> {
    match &spec.command {
        CommandPayload::Shell(shell) => vec!["sh".into(), "-c".into(), shell.clone()],
        CommandPayload::Argv(argv) => argv.clone(),
    }
}

fn log_output(body: &bytes::Bytes) {
    match crate::agent::recordio::decode_all(body) {
        Ok(frames) => {
            for frame in frames {
                debug!(?frame, "nested probe output");
            }
        }
        Err(err) => debug!(%err, "failed to decode nested probe output"),
    }
}
