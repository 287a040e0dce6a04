//! Application-level error types.
//!
//! This is the construction/configuration error taxonomy. It is disjoint
//! from [`crate::check::outcome::ProbeOutcome`]: a malformed
//! [`crate::check::spec::CheckSpec`] or an unreadable config file is an
//! [`AppError`], surfaced to the caller at setup time — it is never routed
//! through the probe-result observer callback.

use std::fmt::{Display, Formatter};

/// Application result alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering configuration and setup failures.
#[derive(Debug)]
pub enum AppError {
    /// Configuration file could not be read or parsed.
    Config(String),
    /// A `CheckSpec` failed validation at construction time (negative
    /// duration, unknown kind, missing kind-specific payload).
    InvalidSpec(String),
    /// An I/O failure unrelated to a specific probe (e.g. resolving a
    /// helper binary path).
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::InvalidSpec(msg) => write!(f, "invalid check spec: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
