//! HTTP probe backend: shells out to the configured `HTTP_PROBE_BIN` helper
//! to fetch a loopback URL and report its HTTP status code.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::check::context::SupervisorContext;
use crate::check::outcome::{CheckStatusInfo, ProbeOutcome};
use crate::check::spec::HttpSpec;
use crate::check::timeout::{format_timeout, kill_process_tree};

/// Run an HTTP probe to completion, enforcing `timeout` if set.
///
/// Invokes the helper exactly as `spec.md` §6 documents:
/// `HTTP_PROBE_BIN -s -S -L -k -w %{http_code} -o <null> -g <url>`.
pub async fn run(ctx: &SupervisorContext, spec: &HttpSpec, ipv6: bool, timeout: Option<Duration>) -> ProbeOutcome {
    let url = build_url(ctx, spec, ipv6);

    let mut command = Command::new(ctx.http_probe_bin_path());
    command
        .arg("-s")
        .arg("-S")
        .arg("-L")
        .arg("-k")
        .arg("-w")
        .arg("%{http_code}")
        .arg("-o")
        .arg(null_device())
        .arg("-g")
        .arg(&url)
        .process_group(0)
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return ProbeOutcome::DefinitiveError(format!(
                "failed to spawn http probe helper: {err}"
            ))
        }
    };

    let (Some(mut stdout_pipe), Some(mut stderr_pipe)) = (child.stdout.take(), child.stderr.take())
    else {
        return ProbeOutcome::DefinitiveError("failed to capture http probe helper output".into());
    };

    let wait = async {
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let (status, _, _) = tokio::join!(
            child.wait(),
            stdout_pipe.read_to_end(&mut stdout_buf),
            stderr_pipe.read_to_end(&mut stderr_buf),
        );
        classify(status, &stdout_buf, &stderr_buf)
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

fn build_url(ctx: &SupervisorContext, spec: &HttpSpec, ipv6: bool) -> String {
    let host = SupervisorContext::loopback_host(ipv6);
    let host = if ipv6 {
        format!("[{host}]")
    } else {
        host.to_owned()
    };
    format!("{}://{}:{}/{}", ctx.scheme, host, spec.port, spec.path.trim_start_matches('/'))
}

fn classify(
    status: std::io::Result<std::process::ExitStatus>,
    stdout: &[u8],
    stderr: &[u8],
) -> ProbeOutcome {
    let status = match status {
        Ok(status) => status,
        Err(err) => {
            return ProbeOutcome::DefinitiveError(format!(
                "failed to wait on http probe helper: {err}"
            ))
        }
    };

    if !status.success() {
        let message = String::from_utf8_lossy(stderr).trim().to_owned();
        let message = if message.is_empty() {
            format!("http probe helper exited with {status}")
        } else {
            message
        };
        return ProbeOutcome::DefinitiveError(message);
    }

    let text = String::from_utf8_lossy(stdout);
    match text.trim().parse::<u32>() {
        Ok(status_code) => ProbeOutcome::Result(CheckStatusInfo::Http { status_code }),
        Err(_) => ProbeOutcome::DefinitiveError(format!(
            "http probe helper produced non-numeric output: {:?}",
            text.trim()
        )),
    }
}

#[cfg(unix)]
fn null_device() -> &'static str {
    "/dev/null"
}

#[cfg(not(unix))]
fn null_device() -> &'static str {
    "NUL"
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn ctx_with_helper(dir: &std::path::Path, helper_name: &str) -> SupervisorContext {
        SupervisorContext {
            task_id: "task-1".into(),
            probe_name: "health check".into(),
            execution_mode: crate::check::context::ExecutionMode::Local,
            task_pid: None,
            namespaces: Vec::new(),
            task_container_id: None,
            launcher_dir: dir.to_path_buf(),
            http_probe_bin: helper_name.into(),
            tcp_probe_bin: "tcp-connect".into(),
            scheme: "http".into(),
            agent_client: None,
        }
    }

    fn write_helper_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).expect("create helper script");
        writeln!(file, "#!/bin/sh\n{body}").expect("write helper script");
        let mut perms = file.metadata().expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod helper script");
        path
    }

    #[tokio::test]
    async fn exit_zero_with_numeric_stdout_is_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_helper_script(dir.path(), "fake-curl", "echo 200");
        let ctx = ctx_with_helper(dir.path(), "fake-curl");
        let spec = HttpSpec { port: 8080, path: String::new() };
        let outcome = run(&ctx, &spec, false, None).await;
        assert_eq!(
            outcome,
            ProbeOutcome::Result(CheckStatusInfo::Http { status_code: 200 })
        );
    }

    #[tokio::test]
    async fn non_numeric_stdout_is_definitive_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_helper_script(dir.path(), "fake-curl", "echo not-a-number");
        let ctx = ctx_with_helper(dir.path(), "fake-curl");
        let spec = HttpSpec { port: 8080, path: String::new() };
        let outcome = run(&ctx, &spec, false, None).await;
        assert!(matches!(outcome, ProbeOutcome::DefinitiveError(_)));
    }

    #[tokio::test]
    async fn nonzero_exit_is_definitive_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_helper_script(dir.path(), "fake-curl", "echo 'connection refused' >&2\nexit 7");
        let ctx = ctx_with_helper(dir.path(), "fake-curl");
        let spec = HttpSpec { port: 8080, path: String::new() };
        let outcome = run(&ctx, &spec, false, None).await;
        match outcome {
            ProbeOutcome::DefinitiveError(msg) => assert!(msg.contains("connection refused")),
            other => panic!("expected DefinitiveError, got {other:?}"),
        }
    }
}
