//! systemd readiness notification and signal handling (spec §4.12, thin — daemonization and
//! PID-file handling stay fully out of scope per spec §1).

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use log::info;

/// Tell the service manager the daemon has finished initializing (registries constructed,
/// persisted state restored). A no-op under a supervisor that doesn't use the sd_notify
/// protocol — `sd_notify::notify` already degrades gracefully when `$NOTIFY_SOCKET` is unset.
pub fn notify_ready() -> Result<()> {
    sd_notify::notify(false, &[sd_notify::NotifyState::Ready]).context("sd_notify READY=1")?;
    info!("notified service manager: ready");
    Ok(())
}

/// Flipped by the signal handler; the (out-of-scope) main event loop polls this between
/// iterations to decide when to stop. The core itself never polls it. A process-wide static
/// rather than a handle threaded through the event loop, because the signal handler itself can
/// only touch process-wide state — it has no way to reach a particular `ShutdownRequested`
/// instance.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Handle onto the process-wide shutdown flag.
#[derive(Clone, Copy, Default)]
pub struct ShutdownRequested;

impl ShutdownRequested {
    pub fn new() -> Self {
        ShutdownRequested
    }

    pub fn get(&self) -> bool {
        SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
    }

    /// Exposed for tests; production code never sets this directly — only the signal handler
    /// does.
    fn set(&self) {
        SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
    }
}

/// Install a signal handler for `SIGTERM`/`SIGINT` that flips [`SHUTDOWN_REQUESTED`]. Uses
/// `nix`'s signal feature, already a teacher dependency.
///
/// # Safety contract
/// The handler body is a single atomic store — async-signal-safe by POSIX's own definition of
/// the term, so installing it is sound even though the call site is `unsafe`.
pub fn install_signal_handlers() -> Result<ShutdownRequested> {
    use nix::sys::signal::{self, SigHandler, Signal};

    unsafe {
        signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_shutdown_signal))
            .context("installing SIGTERM handler")?;
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_shutdown_signal))
            .context("installing SIGINT handler")?;
    }

    Ok(ShutdownRequested::new())
}

extern "C" fn handle_shutdown_signal(_signal: i32) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_flag_is_settable_and_shared_process_wide() {
        let flag = ShutdownRequested::new();
        flag.set();
        assert!(flag.get());
        // any handle observes the same process-wide flag
        assert!(ShutdownRequested::new().get());
        // reset for any other test running in this process
        SHUTDOWN_REQUESTED.store(false, Ordering::Relaxed);
    }
}
