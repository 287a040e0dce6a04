//! Process-tree reaping and timeout-message formatting shared by the
//! command, HTTP, and TCP backends.
//!
//! Each backend races its own probe future against `tokio::time::timeout`
//! inline rather than through a single shared generic wrapper: the cleanup
//! step needs `&mut Child` at the same moment the probe future has already
//! released its own borrow of that child (once `tokio::time::timeout` has
//! resolved), and expressing that shape through a helper that also accepts
//! a separate cleanup closure forces both closures to borrow the same
//! `&mut Child` at the call site. Binding the probe future to a local
//! before racing it — as every backend here does — sidesteps the problem
//! without reaching for `Pin<Box<dyn Future>>>`.

use std::time::Duration;

use tokio::process::Child;

/// Render a duration the way an operator reading a log line expects:
/// sub-second values as milliseconds, otherwise whole seconds.
#[must_use]
pub fn format_timeout(d: Duration) -> String {
    if d.as_secs() == 0 || d.subsec_millis() != 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{}s", d.as_secs())
    }
}

/// Kill a probe child and its entire process group.
///
/// The child is spawned with `process_group(0)`, putting it in its own
/// group; killing that group catches anything it forked (e.g. a shell
/// invoked through `sh -c`) the way `os::killtree` does in the original
/// supervisor, without requiring `unsafe` code to set it up.
#[cfg(unix)]
pub fn kill_process_tree(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(raw_pid) = child.id() {
        let pgid = Pid::from_raw(i32::try_from(raw_pid).unwrap_or(i32::MAX));
        // process_group(0) makes the child its own group leader, so its pgid
        // equals its pid.
        let _ = killpg(pgid, Signal::SIGKILL);
    }

    // Reap to avoid leaving a zombie if killpg raced the child's own exit.
    let _ = child.start_kill();
}

/// Non-unix fallback: kill only the direct child. There is no portable
/// process-group primitive here, so descendants of a shell probe can
/// survive; this is a known limitation, not a silent correctness gap (see
/// `spec.md` §9, "Open question — HTTP timeout child tree").
#[cfg(not(unix))]
pub fn kill_process_tree(child: &mut Child) {
    let _ = child.start_kill();
}
