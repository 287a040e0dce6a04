#![forbid(unsafe_code)]

//! `task-checker` — stand-alone driver for a single health-check supervisor.
//!
//! Loads a [`SupervisorConfig`] from a TOML file, builds one
//! [`check::Supervisor`] from it, logs every dispatched outcome, and drives
//! the supervisor until `SIGINT`/`SIGTERM`. This binary is deliberately thin:
//! the supervisor itself does not decide what an unhealthy result means, and
//! neither does this driver — it exists to give the library a runnable shape
//! for manual testing and to demonstrate how a caller wires the pieces in
//! §2/§6 of the design together.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use task_checker::check::{CheckSpec, ExecutionMode, ObserverUpdate, Supervisor, SupervisorContext};
use task_checker::config::SupervisorConfig;
use task_checker::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "task-checker", about = "Per-task health-check supervisor driver", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file describing the check to run.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("task-checker bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = SupervisorConfig::load_from_path(&args.config).map_err(|err| {
        AppError::Config(format!(
            "cannot load config file '{}': {err}",
            args.config.display()
        ))
    })?;
    info!(path = %args.config.display(), "configuration loaded");

    let spec = CheckSpec::from_toml(&config.check)?;
    let ctx = build_context(&config)?;

    let observer: Arc<dyn task_checker::check::Observer> = Arc::new({
        let task_id = config.task_id.clone();
        let probe_name = config.name.clone();
        move |update: ObserverUpdate| match update {
            ObserverUpdate::Result(status) => {
                info!(task_id = %task_id, probe_name = %probe_name, ?status, "check result");
            }
            ObserverUpdate::Error(message) => {
                warn!(task_id = %task_id, probe_name = %probe_name, %message, "check failed definitively");
            }
        }
    });

    info!(
        task_id = %config.task_id,
        probe_name = %config.name,
        kind = ?spec.kind,
        "starting supervisor"
    );
    let handle = Supervisor::new(ctx, spec, observer).spawn();

    shutdown_signal().await;
    info!("shutdown signal received — stopping supervisor");
    handle.stop().await;
    info!("task-checker shut down");

    Ok(())
}

/// Build the runtime [`SupervisorContext`] from the loaded config,
/// constructing an agent client only when the check is configured to run
/// inside a nested container.
fn build_context(config: &SupervisorConfig) -> Result<SupervisorContext> {
    let execution_mode = if config.check.via_agent {
        ExecutionMode::ViaAgent
    } else {
        ExecutionMode::Local
    };

    let agent_client = if config.check.via_agent {
        let base_url = config.agent_base_url.clone().ok_or_else(|| {
            AppError::Config("check.via_agent is set but agent_base_url is missing".into())
        })?;
        if config.task_container_id.is_none() {
            return Err(AppError::Config(
                "check.via_agent is set but task_container_id is missing".into(),
            ));
        }
        Some(Arc::new(task_checker::agent::AgentClient::new(
            base_url,
            config.agent_authorization.clone(),
        )))
    } else {
        None
    };

    Ok(SupervisorContext {
        task_id: config.task_id.clone(),
        probe_name: config.name.clone(),
        execution_mode,
        task_pid: config.task_pid,
        namespaces: config.namespaces.clone(),
        task_container_id: config.task_container_id.clone(),
        launcher_dir: config.launcher_dir.clone(),
        http_probe_bin: config.http_probe_bin.clone(),
        tcp_probe_bin: config.tcp_probe_bin.clone(),
        scheme: config.scheme.clone(),
        agent_client,
    })
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
