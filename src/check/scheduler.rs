//! The supervisor's tick loop (`spec.md` §4.1): delay once, then probe,
//! classify/dispatch, sleep the interval, repeat — honoring pause and stop
//! at the boundaries the spec calls out.
//!
//! Modeled directly on the orchestrator's stall-detector timer: a
//! background task owns the loop, a cheap `Clone`-able handle controls it
//! through an `AtomicBool` pause flag, a `Notify` to wake a paused loop
//! promptly on resume, and a `CancellationToken` to stop it, cancelled
//! automatically when the handle is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use super::backends::{command, http, nested_command, tcp};
use super::classifier::{self, Observer};
use super::context::{ExecutionMode, SupervisorContext};
use super::outcome::ProbeOutcome;
use super::spec::{CheckKind, CheckSpec};

/// Owns a check's spec and context until [`spawn`](Self::spawn) hands the
/// tick loop to a background task.
pub struct Supervisor {
    ctx: SupervisorContext,
    spec: CheckSpec,
    observer: Arc<dyn Observer>,
}

impl Supervisor {
    /// Build a supervisor for one check. Does not start ticking — call
    /// [`spawn`](Self::spawn).
    #[must_use]
    pub fn new(ctx: SupervisorContext, spec: CheckSpec, observer: Arc<dyn Observer>) -> Self {
        Self { ctx, spec, observer }
    }

    /// Start the background tick loop and return a handle for controlling it.
    #[must_use]
    pub fn spawn(self) -> SupervisorHandle {
        let paused = Arc::new(AtomicBool::new(false));
        let resume_notify = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let task_id = self.ctx.task_id.clone();
        let probe_name = self.ctx.probe_name.clone();

        let join_handle = tokio::spawn(
            Self::run(
                self.ctx,
                self.spec,
                self.observer,
                Arc::clone(&paused),
                Arc::clone(&resume_notify),
                cancel.clone(),
            )
            .instrument(info_span!("supervisor", task_id = %task_id, probe_name = %probe_name)),
        );

        SupervisorHandle {
            paused,
            resume_notify,
            cancel,
            join_handle: Some(join_handle),
            task_id,
            probe_name,
        }
    }

    async fn run(
        ctx: SupervisorContext,
        spec: CheckSpec,
        observer: Arc<dyn Observer>,
        paused: Arc<AtomicBool>,
        resume_notify: Arc<Notify>,
        cancel: CancellationToken,
    ) {
        let mut previous_container_id: Option<String> = None;

        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(spec.delay) => {
                Self::tick_loop(
                    &ctx,
                    &spec,
                    observer.as_ref(),
                    &paused,
                    &resume_notify,
                    &cancel,
                    &mut previous_container_id,
                )
                .await;
            }
        }

        // Tear down: GC any nested container remembered from the last tick
        // rather than leaving it for an agent that will never probe again
        // (spec.md §3, §5 — released "by the next tick's GC step or at
        // teardown").
        gc_on_teardown(&ctx, previous_container_id).await;
    }

    async fn tick_loop(
        ctx: &SupervisorContext,
        spec: &CheckSpec,
        observer: &dyn Observer,
        paused: &AtomicBool,
        resume_notify: &Notify,
        cancel: &CancellationToken,
        previous_container_id: &mut Option<String>,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = Self::wait_while_paused(paused, resume_notify, cancel) => {}
            }
            if cancel.is_cancelled() {
                return;
            }

            let start = Instant::now();
            let outcome = tokio::select! {
                () = cancel.cancelled() => return,
                outcome = dispatch_backend(ctx, spec, previous_container_id) => outcome,
            };
            let elapsed = start.elapsed();

            // Re-check the gate right before dispatch — a pause requested
            // while the probe was in flight must still drop this result.
            classifier::dispatch(
                &ctx.task_id,
                &ctx.probe_name,
                elapsed,
                outcome,
                paused.load(Ordering::SeqCst),
                observer,
            );

            // Race the interval sleep against `resume_notify` too: a
            // `resume()` landing here — whether it reopens a gate closed
            // mid-probe or just fires while the loop is idle — must
            // schedule the next tick immediately rather than waiting out
            // the rest of the interval (spec.md §4.1, §8 property 2).
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(spec.interval) => {}
                () = resume_notify.notified() => {}
            }
        }
    }

    /// Block while `paused` is set, waking promptly on `resume_notify` or
    /// `cancel` rather than polling.
    async fn wait_while_paused(paused: &AtomicBool, resume_notify: &Notify, cancel: &CancellationToken) {
        while paused.load(Ordering::SeqCst) {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = resume_notify.notified() => {}
            }
        }
    }
}

/// GC a nested container remembered across ticks when the loop is torn
/// down, mirroring the per-tick GC step in
/// [`nested_command::run`](super::backends::nested_command::run).
async fn gc_on_teardown(ctx: &SupervisorContext, previous_container_id: Option<String>) {
    let Some(container_id) = previous_container_id else { return };
    let Some(client) = &ctx.agent_client else { return };
    match client.remove_nested_container(&container_id).await {
        Ok(()) => info!(
            task_id = %ctx.task_id,
            probe_name = %ctx.probe_name,
            container_id = %container_id,
            "nested container removed at teardown"
        ),
        Err(err) => warn!(
            task_id = %ctx.task_id,
            probe_name = %ctx.probe_name,
            container_id = %container_id,
            %err,
            "failed to remove nested container at teardown"
        ),
    }
}

/// Run exactly one probe tick, dispatching on `spec.kind` and
/// `ctx.execution_mode` (`spec.md` §9 — tagged union, not virtual dispatch).
async fn dispatch_backend(
    ctx: &SupervisorContext,
    spec: &CheckSpec,
    previous_container_id: &mut Option<String>,
) -> ProbeOutcome {
    match (&spec.kind, &ctx.execution_mode) {
        (CheckKind::Command(cmd), ExecutionMode::Local) => command::run(ctx, cmd, spec.timeout).await,
        (CheckKind::Command(cmd), ExecutionMode::ViaAgent) => {
            let (Some(client), Some(container_id)) = (&ctx.agent_client, &ctx.task_container_id) else {
                return ProbeOutcome::DefinitiveError(
                    "command check configured for agent dispatch but no agent client/container id is set".into(),
                );
            };
            nested_command::run(client, container_id, cmd, spec.timeout, previous_container_id).await
        }
        (CheckKind::Http(http_spec), _) => http::run(ctx, http_spec, spec.ipv6, spec.timeout).await,
        (CheckKind::Tcp(tcp_spec), _) => tcp::run(ctx, tcp_spec, spec.ipv6, spec.timeout).await,
    }
}

/// Handle returned from [`Supervisor::spawn`] for controlling the tick loop.
///
/// Dropping the handle stops the loop, same drop-cancels-the-task
/// convention the orchestrator's stall-detector handle uses — callers that
/// want a clean shutdown should call [`stop`](Self::stop) explicitly
/// instead of relying on drop, since drop cannot be awaited.
pub struct SupervisorHandle {
    paused: Arc<AtomicBool>,
    resume_notify: Arc<Notify>,
    cancel: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
    task_id: String,
    probe_name: String,
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl SupervisorHandle {
    /// Suppress dispatch of any probe outcome already in flight or started
    /// from this point on, until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!(task_id = %self.task_id, probe_name = %self.probe_name, "supervisor paused");
    }

    /// Clear the pause gate and wake a loop that is sleeping between ticks
    /// so the next probe fires promptly rather than waiting out the rest
    /// of the current interval.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resume_notify.notify_one();
        info!(task_id = %self.task_id, probe_name = %self.probe_name, "supervisor resumed");
    }

    /// Whether the supervisor is currently paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Stop the tick loop and wait for its background task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            if handle.await.is_err() {
                warn!(task_id = %self.task_id, probe_name = %self.probe_name, "supervisor task panicked");
            }
        }
    }
}
