use std::env as stdenv;
use std::path::{Path, PathBuf};

/// Process-wide state of the interpreter.
///
/// The working directory is the only mutable shared resource. It is changed
/// solely by the `cd` built-in running in the interpreter's own process; a `cd`
/// executed inside a forked child never reaches this value.
#[derive(Debug, Clone)]
pub struct ShellState {
    /// The interpreter's current working directory, mirrored from the process.
    pub current_dir: PathBuf,
    /// Target of a bare `cd` or `cd ~`.
    pub home: Option<PathBuf>,
}

impl ShellState {
    /// Capture the working directory and `HOME` of the running process.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let home = stdenv::var_os("HOME").map(PathBuf::from);
        Self { current_dir, home }
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Prompt shown before each line: the working directory followed by `$`.
    pub fn prompt(&self) -> String {
        format!("{}$", self.current_dir.to_string_lossy())
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes tests that change the process working directory.
#[cfg(test)]
pub(crate) fn lock_current_dir() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}
