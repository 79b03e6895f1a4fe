//! Process creation for parsed commands.
//!
//! [`launch`] forks one child per command, wires its standard streams according
//! to a [`Wiring`] and replaces the child's image with the target program. The
//! `cd` built-in is the exception: it runs in whichever process asked for it.

use crate::builtin::{self, Builtin, ExitCode};
use crate::error::{INCORRECT_COMMAND, ShellError};
use crate::parser::{ParsedCommand, Redirection};
use crate::state::ShellState;
use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, close, dup2, execvp, fork};
use std::ffi::CString;
use std::io::Write;
use std::os::fd::{IntoRawFd, OwnedFd, RawFd};
use std::process;

const STDIN_FILENO: RawFd = 0;
const STDOUT_FILENO: RawFd = 1;

/// Where built-ins run when they are encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// In the interpreter's own process; `cd` changes the shell's directory.
    Interpreter,
    /// In a freshly forked child that exits afterwards; a `cd` is lost to the shell.
    Child,
}

/// Destination of a child's standard output.
#[derive(Debug)]
pub enum Sink {
    Inherit,
    /// Write end of a pipe to the next pipeline stage.
    Pipe(OwnedFd),
    /// A file created or truncated with mode 0644.
    File(Redirection),
}

/// Stream wiring applied in the child before its image is replaced.
///
/// Descriptors owned by a `Wiring` are closed in the parent when the wiring is
/// dropped after the fork, and are duplicated then closed in the child.
#[derive(Debug)]
pub struct Wiring {
    stdin: Option<OwnedFd>,
    stdout: Sink,
    close_in_child: Vec<RawFd>,
}

impl Wiring {
    /// Inherit the interpreter's standard streams.
    pub fn inherit() -> Self {
        Self {
            stdin: None,
            stdout: Sink::Inherit,
            close_in_child: Vec::new(),
        }
    }

    /// Send standard output to the redirection target, if there is one.
    pub fn for_redirection(redirection: Option<&Redirection>) -> Self {
        let mut wiring = Self::inherit();
        if let Some(redirection) = redirection {
            wiring.stdout = Sink::File(redirection.clone());
        }
        wiring
    }

    /// Replace standard input with the read end of an upstream pipe.
    pub fn stdin_from(mut self, fd: OwnedFd) -> Self {
        self.stdin = Some(fd);
        self
    }

    /// Replace standard output with the write end of a downstream pipe.
    pub fn stdout_to_pipe(mut self, fd: OwnedFd) -> Self {
        self.stdout = Sink::Pipe(fd);
        self
    }

    /// Close a descriptor the parent keeps but the child must not hold.
    pub fn close_in_child(mut self, fd: RawFd) -> Self {
        self.close_in_child.push(fd);
        self
    }

    /// Rewire the current process. Only ever called in a freshly forked child.
    fn apply(self) -> Result<(), String> {
        for fd in self.close_in_child {
            let _ = close(fd);
        }
        if let Some(fd) = self.stdin {
            move_fd(fd.into_raw_fd(), STDIN_FILENO).map_err(|e| format!("dup2 failed: {e}"))?;
        }
        match self.stdout {
            Sink::Inherit => {}
            Sink::Pipe(fd) => {
                move_fd(fd.into_raw_fd(), STDOUT_FILENO)
                    .map_err(|e| format!("dup2 failed: {e}"))?;
            }
            Sink::File(Redirection { target: None }) => {
                return Err("open failed: missing redirection target".to_string());
            }
            Sink::File(Redirection {
                target: Some(path),
            }) => {
                let fd = open(
                    path.as_path(),
                    OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
                    Mode::from_bits_truncate(0o644),
                )
                .map_err(|e| format!("open failed: {}: {e}", path.display()))?;
                move_fd(fd, STDOUT_FILENO).map_err(|e| format!("dup2 failed: {e}"))?;
            }
        }
        Ok(())
    }
}

/// Duplicate `fd` onto `target` and close the original.
fn move_fd(fd: RawFd, target: RawFd) -> nix::Result<()> {
    if fd != target {
        dup2(fd, target)?;
        close(fd)?;
    }
    Ok(())
}

/// Identity of a spawned child, owned by the loop that spawned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle(Pid);

impl ProcessHandle {
    pub fn pid(self) -> Pid {
        self.0
    }

    /// Block until the child terminates and return its exit code.
    ///
    /// A child killed by a signal reports `128 + signal`. If the background
    /// reaper already reclaimed the child the wait fails with `ECHILD`; the
    /// command has simply completed and 0 is returned. Any other wait failure
    /// reports 1.
    pub fn wait(self) -> ExitCode {
        loop {
            match waitpid(self.0, None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    tracing::debug!(pid = %self.0, code, "child exited");
                    return code;
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    tracing::debug!(pid = %self.0, ?signal, "child killed by signal");
                    return 128 + signal as i32;
                }
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => {
                    tracing::debug!(pid = %self.0, "child already reclaimed");
                    return 0;
                }
                Err(e) => {
                    tracing::warn!(pid = %self.0, error = %e, "waitpid failed");
                    return 1;
                }
            }
        }
    }
}

/// What [`launch`] did with a command.
#[derive(Debug)]
pub enum Launch {
    /// The command had no program name; nothing ran.
    NoOp,
    /// A built-in ran in the interpreter's process with this status.
    Builtin(ExitCode),
    /// A child process was forked.
    Spawned(ProcessHandle),
}

/// Launch one parsed command.
///
/// With [`Placement::Interpreter`] a `cd` runs right here and mutates `state`.
/// Everything else forks: the child applies `wiring` and replaces its image, or
/// with [`Placement::Child`] runs the built-in and exits. The child never returns.
///
/// Fork failure is reported as the fatal [`ShellError::Fork`].
pub fn launch(
    command: &ParsedCommand,
    wiring: Wiring,
    placement: Placement,
    state: &mut ShellState,
) -> Result<Launch, ShellError> {
    if command.is_noop() {
        return Ok(Launch::NoOp);
    }

    if placement == Placement::Interpreter {
        match builtin::dispatch(command.argv(), state) {
            Builtin::NotBuiltin => {}
            Builtin::Ran(code) => return Ok(Launch::Builtin(code)),
            Builtin::Failed(e) => return Err(ShellError::Builtin(e)),
        }
    }

    let argv = command.exec_argv()?;

    // Anything still buffered would otherwise be written twice.
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    // SAFETY: the child only rewires descriptors, runs a built-in or calls execvp
    // before exiting; it never returns into the caller's control flow.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            if placement == Placement::Child {
                match builtin::dispatch(command.argv(), state) {
                    Builtin::NotBuiltin => {}
                    Builtin::Ran(code) => process::exit(code),
                    Builtin::Failed(e) => {
                        eprintln!("{e:#}");
                        process::exit(1);
                    }
                }
            }
            replace_image(&argv, wiring)
        }
        Ok(ForkResult::Parent { child }) => {
            drop(wiring);
            tracing::debug!(pid = %child, program = ?command.program(), "spawned child");
            Ok(Launch::Spawned(ProcessHandle(child)))
        }
        Err(e) => Err(ShellError::Fork(e)),
    }
}

fn replace_image(argv: &[CString], wiring: Wiring) -> ! {
    if let Err(message) = wiring.apply() {
        eprintln!("{message}");
        process::exit(1);
    }
    let Err(errno) = execvp(&argv[0], argv);
    tracing::debug!(program = ?argv[0], error = %errno, "execvp failed");
    eprintln!("{INCORRECT_COMMAND}");
    process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::reaper::{self, lock_children};
    use std::path::PathBuf;
    use std::process::Command;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_noop_command_does_not_fork() {
        let cmd = parser::parse("> out.txt", 50).unwrap();
        let mut state = ShellState::new();
        let launched = launch(&cmd, Wiring::inherit(), Placement::Interpreter, &mut state);
        assert!(matches!(launched, Ok(Launch::NoOp)));
    }

    #[test]
    fn test_nul_argument_is_rejected_before_fork() {
        let cmd = parser::parse("echo a\0b", 50).unwrap();
        let mut state = ShellState::new();
        let launched = launch(&cmd, Wiring::inherit(), Placement::Child, &mut state);
        assert!(matches!(launched, Err(ShellError::NulInArgument(_))));
    }

    #[test]
    fn test_wiring_for_redirection() {
        let wiring = Wiring::for_redirection(None);
        assert!(matches!(wiring.stdout, Sink::Inherit));

        let redirection = Redirection {
            target: Some(PathBuf::from("out.txt")),
        };
        let wiring = Wiring::for_redirection(Some(&redirection));
        match wiring.stdout {
            Sink::File(r) => assert_eq!(r, redirection),
            other => panic!("expected a file sink, got {:?}", other),
        }
    }

    #[test]
    fn test_wait_on_reclaimed_child_reports_completion() {
        let _lock = lock_children();
        let child = Command::new("true").spawn().expect("spawn true");
        let pid = Pid::from_raw(child.id() as i32);

        let mut reaped = 0;
        for _ in 0..100 {
            reaped += reaper::reap_terminated();
            if reaped > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(reaped >= 1);

        assert_eq!(ProcessHandle(pid).wait(), 0);
    }
}
