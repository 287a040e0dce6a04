//! The immutable check specification (`CheckSpec`) and its kind-specific payloads.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::CheckSpecToml;
use crate::errors::AppError;

/// Either form a command probe can take: a shell string or an argv vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPayload {
    /// Run via the system shell, e.g. `sh -c "<value>"`.
    Shell(String),
    /// Run directly via `execve`-style argv, no shell involved.
    Argv(Vec<String>),
}

/// Payload for `kind = COMMAND`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The shell string or argv to execute.
    pub command: CommandPayload,
    /// Environment variable overrides layered on top of the inherited environment.
    pub env: HashMap<String, String>,
}

/// Payload for `kind = HTTP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSpec {
    /// Loopback port to probe.
    pub port: u16,
    /// Request path; defaults to empty (`""`), per §6 Defaults.
    pub path: String,
}

/// Payload for `kind = TCP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpSpec {
    /// Loopback port to probe.
    pub port: u16,
}

/// The tagged union of probe kinds and their payloads.
///
/// Dispatched by variant in [`crate::check::backends`], not by virtual call —
/// see `spec.md` §9 "Deep class trees".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckKind {
    /// Run a command (locally or, if the context requests it, inside a nested container).
    Command(CommandSpec),
    /// Fetch a URL via the HTTP probe helper and inspect the status code.
    Http(HttpSpec),
    /// Attempt a TCP handshake via the TCP probe helper.
    Tcp(TcpSpec),
}

/// Immutable check specification, supplied once at supervisor construction.
///
/// Construction validates every invariant in `spec.md` §3/§7; an invalid
/// spec never reaches the scheduler — it is rejected as an [`AppError`] at
/// setup time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSpec {
    /// Which probe kind and its kind-specific payload.
    pub kind: CheckKind,
    /// Delay before the first probe.
    pub delay: Duration,
    /// Interval between probes, measured from the end of the previous
    /// probe's processing, not its start.
    pub interval: Duration,
    /// Per-probe timeout. `None` means "no timeout" (the wire value `0`).
    pub timeout: Option<Duration>,
    /// Select the IPv6 loopback (`[::1]`) instead of `127.0.0.1` for HTTP/TCP.
    pub ipv6: bool,
}

impl CheckSpec {
    /// Construct and validate a `CheckSpec` from signed second counts, the
    /// same shape the wire protocol (and `checker_process.cpp`'s
    /// protobuf-derived `Duration::create`) uses.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidSpec`] if `delay_secs`, `interval_secs`, or
    /// `timeout_secs` is negative, or if `kind`'s payload is internally
    /// inconsistent (e.g. a command spec is neither shell nor argv).
    pub fn new(
        kind: CheckKind,
        delay_secs: i64,
        interval_secs: i64,
        timeout_secs: i64,
        ipv6: bool,
    ) -> Result<Self, AppError> {
        if delay_secs < 0 {
            return Err(AppError::InvalidSpec(format!(
                "delay must be non-negative, got {delay_secs}"
            )));
        }
        if interval_secs < 0 {
            return Err(AppError::InvalidSpec(format!(
                "interval must be non-negative, got {interval_secs}"
            )));
        }
        if timeout_secs < 0 {
            return Err(AppError::InvalidSpec(format!(
                "timeout must be non-negative, got {timeout_secs}"
            )));
        }

        match &kind {
            CheckKind::Command(cmd) => {
                if let CommandPayload::Argv(argv) = &cmd.command {
                    if argv.is_empty() {
                        return Err(AppError::InvalidSpec(
                            "command argv must not be empty".into(),
                        ));
                    }
                }
            }
            CheckKind::Http(http) => {
                if http.port == 0 {
                    return Err(AppError::InvalidSpec("http port must be nonzero".into()));
                }
            }
            CheckKind::Tcp(tcp) => {
                if tcp.port == 0 {
                    return Err(AppError::InvalidSpec("tcp port must be nonzero".into()));
                }
            }
        }

        let timeout = if timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(timeout_secs.unsigned_abs()))
        };

        Ok(Self {
            kind,
            delay: Duration::from_secs(delay_secs.unsigned_abs()),
            interval: Duration::from_secs(interval_secs.unsigned_abs()),
            timeout,
            ipv6,
        })
    }

    /// Build a `CheckSpec` from the TOML wire shape read off disk.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidSpec`] for an unknown `kind` string, a
    /// missing kind-specific field (e.g. `port` for `http`/`tcp`, or neither
    /// `shell` nor `argv` for `command`), or a failed [`CheckSpec::new`]
    /// validation.
    pub fn from_toml(toml: &CheckSpecToml) -> Result<Self, AppError> {
        let kind = match toml.kind.as_str() {
            "command" => {
                let command = match (&toml.shell, &toml.argv) {
                    (Some(shell), None) => CommandPayload::Shell(shell.clone()),
                    (None, Some(argv)) => CommandPayload::Argv(argv.clone()),
                    (None, None) => {
                        return Err(AppError::InvalidSpec(
                            "command check requires either `shell` or `argv`".into(),
                        ))
                    }
                    (Some(_), Some(_)) => {
                        return Err(AppError::InvalidSpec(
                            "command check must not set both `shell` and `argv`".into(),
                        ))
                    }
                };
                CheckKind::Command(CommandSpec {
                    command,
                    env: toml.env.clone(),
                })
            }
            "http" => {
                let port = toml
                    .port
                    .ok_or_else(|| AppError::InvalidSpec("http check requires `port`".into()))?;
                CheckKind::Http(HttpSpec {
                    port,
                    path: toml.path.clone().unwrap_or_default(),
                })
            }
            "tcp" => {
                let port = toml
                    .port
                    .ok_or_else(|| AppError::InvalidSpec("tcp check requires `port`".into()))?;
                CheckKind::Tcp(TcpSpec { port })
            }
            other => {
                return Err(AppError::InvalidSpec(format!(
                    "unknown check kind `{other}`"
                )))
            }
        };

        Self::new(
            kind,
            i64::try_from(toml.delay_secs).unwrap_or(i64::MAX),
            i64::try_from(toml.interval_secs).unwrap_or(i64::MAX),
            i64::try_from(toml.timeout_secs).unwrap_or(i64::MAX),
            toml.ipv6,
        )
    }
}
