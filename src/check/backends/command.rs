//! Local command probe: fork/exec directly in the supervisor's own process
//! tree, isolated into its own process group so a timeout can kill the
//! whole subtree a shell probe might have spawned.

use std::time::Duration;

use tokio::process::Command;

use crate::check::context::SupervisorContext;
use crate::check::outcome::{CheckStatusInfo, ProbeOutcome};
use crate::check::spec::{CommandPayload, CommandSpec};
use crate::check::timeout::{format_timeout, kill_process_tree};

/// Run a command probe to completion, enforcing `timeout` if set.
///
/// If `ctx` names a task pid and at least one namespace, the command runs
/// inside that task's namespaces via `nsenter` rather than directly in the
/// supervisor's own — namespace entry is an opaque external facility
/// (`spec.md` §1 "Out of scope"), and `nsenter` is exactly that facility on
/// a Linux host; it keeps this crate free of the `unsafe` `pre_exec` hook a
/// hand-rolled clone-into-namespaces implementation would require.
pub async fn run(ctx: &SupervisorContext, spec: &CommandSpec, timeout: Option<Duration>) -> ProbeOutcome {
    let mut command = build_command(ctx, spec);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => return ProbeOutcome::DefinitiveError(format!("failed to spawn probe: {err}")),
    };

    let wait = async {
        match child.wait().await {
            Ok(status) => classify_exit_status(status),
            Err(err) => ProbeOutcome::DefinitiveError(format!("failed to wait on probe: {err}")),
        }
    };

    match timeout {
        None => wait.await,
        Some(duration) => match tokio::time::timeout(duration, wait).await {
            Ok(outcome) => outcome,
            Err(_) => {
                kill_process_tree(&mut child);
                ProbeOutcome::DefinitiveError(format!(
                    "check timed out after {}",
                    format_timeout(duration)
                ))
            }
        },
    }
}

fn build_command(ctx: &SupervisorContext, spec: &CommandSpec) -> Command {
    let mut command = match (ctx.task_pid, ctx.namespaces.is_empty()) {
        (Some(pid), false) => {
            let mut command = Command::new("nsenter");
            command.arg("--target").arg(pid.to_string());
            for namespace in &ctx.namespaces {
                command.arg(format!("--{namespace}"));
            }
            command.arg("--");
            append_payload(&mut command, &spec.command);
            command
        }
        _ => {
            let mut command = match &spec.command {
                CommandPayload::Shell(_) => Command::new("sh"),
                CommandPayload::Argv(argv) => Command::new(&argv[0]),
            };
            append_payload_args(&mut command, &spec.command);
            command
        }
    };

    for (key, value) in &spec.env {
        command.env(key, value);
    }

    command.process_group(0);
    command.kill_on_drop(true);
    command.stdin(std::process::Stdio::null());
    // Discarded by policy — only the exit code matters for a command probe.
    command.stdout(std::process::Stdio::null());
    // Inherited so operators see probe noise in the supervisor's own logs.
    command.stderr(std::process::Stdio::inherit());

    command
}

/// Append `sh -c <shell>` or the raw argv as the program name plus trailing
/// args — used when the command itself (not `nsenter`) is the program.
fn append_payload_args(command: &mut Command, payload: &CommandPayload) {
    match payload {
        CommandPayload::Shell(shell) => {
            command.arg("-c").arg(shell);
        }
        CommandPayload::Argv(argv) => {
            command.args(&argv[1..]);
        }
    }
}

/// Append the full command (program included) as trailing arguments —
/// used after `nsenter ... --`, where `nsenter` itself is the program.
fn append_payload(command: &mut Command, payload: &CommandPayload) {
    match payload {
        CommandPayload::Shell(shell) => {
            command.arg("sh").arg("-c").arg(shell);
        }
        CommandPayload::Argv(argv) => {
            command.args(argv);
        }
    }
}

#[cfg(unix)]
fn classify_exit_status(status: std::process::ExitStatus) -> ProbeOutcome {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    if let Some(signal) = status.signal() {
        if signal == Signal::SIGKILL as i32 {
            // An external actor (our own timeout path, or the supervisor
            // shutting down) killed this probe out from under the caller —
            // not a verdict on the check itself.
            return ProbeOutcome::Transient;
        }
        return ProbeOutcome::DefinitiveError(format!("probe terminated by signal {signal}"));
    }

    let code = status.code().unwrap_or(-1);
    ProbeOutcome::Result(CheckStatusInfo::Command { exit_code: code })
}

#[cfg(not(unix))]
fn classify_exit_status(status: std::process::ExitStatus) -> ProbeOutcome {
    let code = status.code().unwrap_or(-1);
    ProbeOutcome::Result(CheckStatusInfo::Command { exit_code: code })
}
