use nix::errno::Errno;
use thiserror::Error;

/// Fixed notice printed for any command the shell could not run.
pub const INCORRECT_COMMAND: &str = "Shell: Incorrect command";

/// Errors produced while interpreting one input line.
///
/// Most variants are local to one command and the interpreter keeps going after
/// reporting them. Only [`ShellError::Fork`] and [`ShellError::Pipe`] are fatal,
/// see [`ShellError::is_fatal`].
#[derive(Debug, Error)]
pub enum ShellError {
    /// The line ends with a pipe marker that has no command after it.
    #[error("{}", INCORRECT_COMMAND)]
    TrailingPipe,

    /// A pipeline stage between two pipe markers has no program to run.
    #[error("{}", INCORRECT_COMMAND)]
    EmptyPipelineStage,

    /// A single command has more arguments than the configured limit.
    #[error("too many arguments: {count} (limit is {limit})")]
    TooManyArguments { count: usize, limit: usize },

    /// A line splits into more commands than the configured limit.
    #[error("too many commands: {count} (limit is {limit})")]
    TooManyCommands { count: usize, limit: usize },

    /// An argument cannot be passed to `execvp` because it holds a NUL byte.
    #[error("argument contains a NUL byte: {0:?}")]
    NulInArgument(String),

    /// A built-in command failed in the interpreter's own process.
    #[error("{0:#}")]
    Builtin(anyhow::Error),

    /// `fork(2)` failed; the system is out of process slots or memory.
    #[error("fork failed: {0}")]
    Fork(Errno),

    /// `pipe(2)` failed; the system is out of descriptors.
    #[error("pipe failed: {0}")]
    Pipe(Errno),
}

impl ShellError {
    /// Whether the whole interpreter has to stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::Fork(_) | ShellError::Pipe(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_resource_errors_are_fatal() {
        assert!(ShellError::Fork(Errno::EAGAIN).is_fatal());
        assert!(ShellError::Pipe(Errno::EMFILE).is_fatal());
        assert!(!ShellError::TrailingPipe.is_fatal());
        assert!(!ShellError::TooManyArguments { count: 51, limit: 50 }.is_fatal());
        assert!(!ShellError::Builtin(anyhow::anyhow!("cd: nope")).is_fatal());
    }

    #[test]
    fn test_trailing_pipe_reads_as_incorrect_command() {
        assert_eq!(ShellError::TrailingPipe.to_string(), INCORRECT_COMMAND);
        assert_eq!(ShellError::EmptyPipelineStage.to_string(), INCORRECT_COMMAND);
    }
}
