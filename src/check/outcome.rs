//! Per-tick probe outcomes and the observer's view of them.

/// The value produced by a probe that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatusInfo {
    /// Normalised exit status of a command probe (the "low 8 bits" convention).
    Command {
        /// The probe process's exit code.
        exit_code: i32,
    },
    /// HTTP status code returned by the HTTP probe helper.
    Http {
        /// The numeric HTTP status code.
        status_code: u32,
    },
    /// Whether a TCP handshake succeeded.
    Tcp {
        /// `true` if the TCP probe helper connected successfully.
        succeeded: bool,
    },
}

/// A completed probe's classified outcome, produced once per tick.
///
/// This is ephemeral: it exists only between a backend's future resolving
/// and the classifier/dispatcher handing it (or not) to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The probe ran to completion and produced a value.
    Result(CheckStatusInfo),
    /// The probe could not complete for a reason attributable to probe
    /// setup (timeout, failed spawn, malformed helper output).
    DefinitiveError(String),
    /// The probe could not complete for a reason attributable to the
    /// surrounding system (agent unreachable, agent 5xx, probe child
    /// signal-killed by an external actor). Never surfaced to the observer.
    Transient,
}

/// What the observer callback receives: a completed result, or a
/// definitive error. `Transient` outcomes never reach this type — the
/// classifier filters them out before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverUpdate {
    /// A probe produced a value.
    Result(CheckStatusInfo),
    /// A probe failed definitively; the message is presented verbatim.
    Error(String),
}
