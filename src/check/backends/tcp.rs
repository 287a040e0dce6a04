//! TCP probe backend: shells out to the configured `TCP_PROBE_BIN` helper
//! to attempt a TCP handshake against a loopback port.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::check::context::SupervisorContext;
use crate::check::outcome::{CheckStatusInfo, ProbeOutcome};
use crate::check::spec::TcpSpec;
use crate::check::timeout::{format_timeout, kill_process_tree};

/// Run a TCP probe to completion, enforcing `timeout` if set.
///
/// Every non-zero helper exit collapses to `Result(succeeded = false)`, per
/// `spec.md` §4.5 — a TCP probe reports reachability, and "not reachable"
/// is a valid answer, never a `DefinitiveError`.
pub async fn run(ctx: &SupervisorContext, spec: &TcpSpec, ipv6: bool, timeout: Option<Duration>) -> ProbeOutcome {
    let bin_path = ctx.tcp_probe_bin_path();
    if !bin_path.exists() {
        return ProbeOutcome::DefinitiveError(format!(
            "tcp probe helper not found at {}",
            bin_path.display()
        ));
    }

    let host = SupervisorContext::loopback_host(ipv6);

    let mut command = Command::new(&bin_path);
    command
        .arg(format!("--ip={host}"))
        .arg(format!("--port={}", spec.port))
        .process_group(0)
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return ProbeOutcome::DefinitiveError(format!(
                "failed to spawn tcp probe helper: {err}"
            ))
        }
    };

    let wait = async {
        match child.wait().await {
            Ok(status) => ProbeOutcome::Result(CheckStatusInfo::Tcp {
                succeeded: status.success(),
            }),
            Err(err) => {
                ProbeOutcome::DefinitiveError(format!("failed to wait on tcp probe helper: {err}"))
            }
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

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn ctx_with_helper(dir: &std::path::Path, helper_name: &str) -> SupervisorContext {
        SupervisorContext {
            task_id: "task-1".into(),
            probe_name: "readiness check".into(),
            execution_mode: crate::check::context::ExecutionMode::Local,
            task_pid: None,
            namespaces: Vec::new(),
            task_container_id: None,
            launcher_dir: dir.to_path_buf(),
            http_probe_bin: "curl".into(),
            tcp_probe_bin: helper_name.into(),
            scheme: "http".into(),
            agent_client: None,
        }
    }

    fn write_helper_script(dir: &std::path::Path, name: &str, body: &str) {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).expect("create helper script");
        writeln!(file, "#!/bin/sh\n{body}").expect("write helper script");
        let mut perms = file.metadata().expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod helper script");
    }

    #[tokio::test]
    async fn helper_exit_zero_is_succeeded() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_helper_script(dir.path(), "fake-tcp-connect", "exit 0");
        let ctx = ctx_with_helper(dir.path(), "fake-tcp-connect");
        let outcome = run(&ctx, &TcpSpec { port: 1 }, false, None).await;
        assert_eq!(
            outcome,
            ProbeOutcome::Result(CheckStatusInfo::Tcp { succeeded: true })
        );
    }

    #[tokio::test]
    async fn helper_nonzero_exit_collapses_to_not_succeeded() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_helper_script(dir.path(), "fake-tcp-connect", "exit 1");
        let ctx = ctx_with_helper(dir.path(), "fake-tcp-connect");
        let outcome = run(&ctx, &TcpSpec { port: 1 }, false, None).await;
        assert_eq!(
            outcome,
            ProbeOutcome::Result(CheckStatusInfo::Tcp { succeeded: false })
        );
    }

    #[tokio::test]
    async fn missing_helper_is_definitive_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = ctx_with_helper(dir.path(), "does-not-exist");
        let outcome = run(&ctx, &TcpSpec { port: 1 }, false, None).await;
        assert!(matches!(outcome, ProbeOutcome::DefinitiveError(_)));
    }
}
