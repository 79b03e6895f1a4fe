use argh::FromArgs;
use std::path::PathBuf;

/// Default upper bound on arguments in one command, program name included.
pub const DEFAULT_MAX_ARGUMENTS: usize = 50;

/// Default upper bound on commands produced from one line.
pub const DEFAULT_MAX_COMMANDS: usize = 50;

/// Size limits enforced while splitting lines and commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_arguments: usize,
    pub max_commands: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_arguments: DEFAULT_MAX_ARGUMENTS,
            max_commands: DEFAULT_MAX_COMMANDS,
        }
    }
}

#[derive(FromArgs, Debug)]
/// An interactive shell that runs commands in parallel (&&), in sequence (##),
/// with output redirection (>) or as a pipeline (|).
pub struct Options {
    #[argh(option, short = 'c')]
    /// run this line instead of reading from the terminal; may be repeated.
    pub command: Vec<String>,

    #[argh(option, default = "DEFAULT_MAX_ARGUMENTS")]
    /// maximum number of arguments in one command.
    pub max_arguments: usize,

    #[argh(option, default = "DEFAULT_MAX_COMMANDS")]
    /// maximum number of commands on one line.
    pub max_commands: usize,

    #[argh(option)]
    /// file to load the line history from and save it to on exit.
    pub history: Option<PathBuf>,

    #[argh(switch, short = 'v')]
    /// log process activity to stderr.
    pub verbose: bool,
}

impl Options {
    pub fn limits(&self) -> Limits {
        Limits {
            max_arguments: self.max_arguments,
            max_commands: self.max_commands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::from_args(&["forksh"], &[]).unwrap();
        assert!(options.command.is_empty());
        assert!(!options.verbose);
        assert_eq!(options.history, None);
        assert_eq!(options.limits(), Limits::default());
    }

    #[test]
    fn test_repeated_commands_and_limits() {
        let options = Options::from_args(
            &["forksh"],
            &["-c", "pwd", "-c", "ls | wc -l", "--max-arguments", "8", "-v"],
        )
        .unwrap();
        assert_eq!(options.command, vec!["pwd", "ls | wc -l"]);
        assert!(options.verbose);
        assert_eq!(
            options.limits(),
            Limits {
                max_arguments: 8,
                max_commands: DEFAULT_MAX_COMMANDS,
            }
        );
    }
}
