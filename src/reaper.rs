//! Background reclamation of terminated children and the interpreter's signal
//! dispositions.
//!
//! The per-mode loops wait explicitly for the children they spawn. Anything that
//! slips past them is claimed here, from a `SIGCHLD` handler that non-blockingly
//! collects every terminated child. Because the handler may win the race against
//! an explicit wait, [`ProcessHandle::wait`](crate::launcher::ProcessHandle::wait)
//! treats `ECHILD` as "already completed".

use nix::errno::Errno;
use nix::libc::c_int;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction, signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;

/// Claim every child that has already terminated, without blocking.
///
/// Returns how many children were reclaimed. Async-signal-safe: it only calls
/// `waitpid` and does not allocate or log.
pub fn reap_terminated() -> usize {
    let mut reaped = 0;
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => return reaped,
            Ok(_) => reaped += 1,
        }
    }
}

extern "C" fn on_sigchld(_: c_int) {
    let saved = Errno::last_raw();
    reap_terminated();
    Errno::set_raw(saved);
}

/// Install the `SIGCHLD` reaper for the rest of the process's lifetime.
pub fn install() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_sigchld),
        SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
        SigSet::empty(),
    );
    // SAFETY: the handler only calls async-signal-safe functions.
    unsafe { sigaction(Signal::SIGCHLD, &action) }?;
    tracing::debug!("installed SIGCHLD reaper");
    Ok(())
}

/// Ignore the keyboard interrupt and suspend signals.
///
/// The disposition is "ignore" rather than a handler, so it survives `execvp`
/// and programs started by the shell ignore these signals as well.
pub fn ignore_keyboard_signals() -> nix::Result<()> {
    for sig in [Signal::SIGINT, Signal::SIGTSTP] {
        // SAFETY: installing SIG_IGN does not run any code in signal context.
        unsafe { signal(sig, SigHandler::SigIgn) }?;
    }
    Ok(())
}

/// Serializes tests that spawn and reap children, since reaping is process-wide.
#[cfg(test)]
pub(crate) fn lock_children() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_reap_terminated_claims_finished_child() {
        let _lock = lock_children();
        let mut child = Command::new("true").spawn().expect("spawn true");

        let mut reaped = 0;
        for _ in 0..100 {
            reaped += reap_terminated();
            if reaped > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }

        assert!(reaped >= 1);
        // The child is gone from the process table, so an explicit wait fails.
        assert!(child.try_wait().is_err());
    }
}
