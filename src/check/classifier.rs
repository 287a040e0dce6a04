//! Result classifier and dispatcher (`spec.md` §4.7).
//!
//! The backends and the timeout wrapper have already done the hard
//! classification work of producing a [`ProbeOutcome`]; what remains here
//! is the dispatch rule every outcome must pass through: check the pause
//! gate at dispatch time (not at probe-start time), then route `Result` and
//! `DefinitiveError` to the observer while `Transient` is logged and
//! dropped.

use std::time::Duration;

use tracing::info;

use super::outcome::{ObserverUpdate, ProbeOutcome};

/// The observer callback contract (`spec.md` §6): invoked at most once per
/// probe, never while paused, fire-and-forget from the supervisor's point
/// of view.
pub trait Observer: Send + Sync {
    /// Handle one dispatched update.
    fn notify(&self, update: ObserverUpdate);
}

impl<F> Observer for F
where
    F: Fn(ObserverUpdate) + Send + Sync,
{
    fn notify(&self, update: ObserverUpdate) {
        self(update);
    }
}

/// Classify `outcome` and dispatch it to `observer`, unless `paused` is
/// true at this exact moment — which is the supervisor's pause gate,
/// checked at dispatch time per the invariant in `spec.md` §3 ("classifier
/// checks the gate at dispatch time").
pub fn dispatch(
    task_id: &str,
    probe_name: &str,
    elapsed: Duration,
    outcome: ProbeOutcome,
    paused: bool,
    observer: &dyn Observer,
) {
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    if paused {
        info!(
            task_id,
            probe_name,
            elapsed_ms,
            "probe outcome dropped: supervisor paused"
        );
        return;
    }

    match outcome {
        ProbeOutcome::Result(status) => {
            info!(
                task_id,
                probe_name,
                elapsed_ms,
                ?status,
                "probe completed"
            );
            observer.notify(ObserverUpdate::Result(status));
        }
        ProbeOutcome::DefinitiveError(message) => {
            info!(
                task_id,
                probe_name,
                elapsed_ms,
                %message,
                "probe failed definitively"
            );
            observer.notify(ObserverUpdate::Error(message));
        }
        ProbeOutcome::Transient => {
            info!(
                task_id,
                probe_name,
                elapsed_ms,
                "probe outcome transient, dropping"
            );
        }
    }
}
