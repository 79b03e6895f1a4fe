//! Splitting one command segment into a program name, its arguments and an
//! optional output redirection.

use crate::error::ShellError;
use std::ffi::CString;
use std::path::PathBuf;

/// Output redirection marker.
pub const REDIRECT_MARKER: char = '>';

/// Where a command's standard output should go when it is redirected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    /// File to create or truncate. `None` when nothing followed the marker,
    /// which the launcher reports as an error in the child.
    pub target: Option<PathBuf>,
}

/// A command ready to be launched.
///
/// `argv[0]` is the program name. The argument list is fixed once built; an empty
/// list makes the command a no-op (a line that was only a redirection clause).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    argv: Vec<String>,
    redirection: Option<Redirection>,
}

impl ParsedCommand {
    /// The program name, if there is one.
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Full argument list including the program name.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    pub fn redirection(&self) -> Option<&Redirection> {
        self.redirection.as_ref()
    }

    pub fn is_noop(&self) -> bool {
        self.argv.is_empty()
    }

    /// Convert the argument list into the NUL-terminated strings `execvp` expects.
    ///
    /// This is done in the parent, before forking, so the child only has to
    /// wire descriptors and replace its image.
    pub fn exec_argv(&self) -> Result<Vec<CString>, ShellError> {
        self.argv
            .iter()
            .map(|arg| {
                CString::new(arg.as_str()).map_err(|_| ShellError::NulInArgument(arg.clone()))
            })
            .collect()
    }
}

/// Parse a command segment, honouring a trailing `> target` clause.
///
/// The segment is cut at the first redirection marker. Everything after it,
/// trimmed of spaces, is the target file.
pub fn parse(command: &str, max_arguments: usize) -> Result<ParsedCommand, ShellError> {
    let (command, redirection) = match command.split_once(REDIRECT_MARKER) {
        Some((left, right)) => {
            let target = right.trim_matches(' ');
            let target = (!target.is_empty()).then(|| PathBuf::from(target));
            (left, Some(Redirection { target }))
        }
        None => (command, None),
    };

    let argv = split_arguments(command, max_arguments)?;
    let parsed = ParsedCommand { argv, redirection };
    tracing::trace!(?parsed, "parsed command");
    Ok(parsed)
}

/// Parse a command segment as plain whitespace-separated arguments.
///
/// Used by the parallel and piped modes, where a `>` is an ordinary argument.
pub fn parse_plain(command: &str, max_arguments: usize) -> Result<ParsedCommand, ShellError> {
    let argv = split_arguments(command, max_arguments)?;
    Ok(ParsedCommand {
        argv,
        redirection: None,
    })
}

fn split_arguments(command: &str, max_arguments: usize) -> Result<Vec<String>, ShellError> {
    let argv: Vec<String> = command.split_whitespace().map(str::to_owned).collect();
    if argv.len() > max_arguments {
        return Err(ShellError::TooManyArguments {
            count: argv.len(),
            limit: max_arguments,
        });
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 50;

    #[test]
    fn test_plain_command() {
        let cmd = parse("ls  -l   /tmp ", LIMIT).unwrap();
        assert_eq!(cmd.argv(), ["ls", "-l", "/tmp"]);
        assert_eq!(cmd.program(), Some("ls"));
        assert_eq!(cmd.args(), ["-l", "/tmp"]);
        assert!(cmd.redirection().is_none());
        assert!(!cmd.is_noop());
    }

    #[test]
    fn test_redirection_target_is_trimmed() {
        let cmd = parse("echo hi >   out.txt  ", LIMIT).unwrap();
        assert_eq!(cmd.argv(), ["echo", "hi"]);
        assert_eq!(
            cmd.redirection(),
            Some(&Redirection {
                target: Some(PathBuf::from("out.txt"))
            })
        );
    }

    #[test]
    fn test_redirection_splits_at_first_marker() {
        let cmd = parse("echo a>b>c", LIMIT).unwrap();
        assert_eq!(cmd.argv(), ["echo", "a"]);
        assert_eq!(
            cmd.redirection().and_then(|r| r.target.clone()),
            Some(PathBuf::from("b>c"))
        );
    }

    #[test]
    fn test_redirection_without_target() {
        let cmd = parse("echo hi >   ", LIMIT).unwrap();
        assert_eq!(cmd.argv(), ["echo", "hi"]);
        assert_eq!(cmd.redirection(), Some(&Redirection { target: None }));
    }

    #[test]
    fn test_only_redirection_is_noop() {
        let cmd = parse("> out.txt", LIMIT).unwrap();
        assert!(cmd.is_noop());
        assert_eq!(cmd.program(), None);
        assert!(cmd.args().is_empty());
    }

    #[test]
    fn test_plain_parse_keeps_marker_as_argument() {
        let cmd = parse_plain("echo a > b", LIMIT).unwrap();
        assert_eq!(cmd.argv(), ["echo", "a", ">", "b"]);
        assert!(cmd.redirection().is_none());
    }

    #[test]
    fn test_argument_limit() {
        let line = vec!["x"; 4].join(" ");
        assert!(parse(&line, 4).is_ok());
        match parse(&format!("{line} y"), 4) {
            Err(ShellError::TooManyArguments { count, limit }) => {
                assert_eq!(count, 5);
                assert_eq!(limit, 4);
            }
            other => panic!("expected TooManyArguments, got {:?}", other),
        }
    }

    #[test]
    fn test_exec_argv_rejects_nul() {
        let cmd = parse("echo a\0b", LIMIT).unwrap();
        assert!(matches!(cmd.exec_argv(), Err(ShellError::NulInArgument(_))));

        let cmd = parse("echo ok", LIMIT).unwrap();
        let argv = cmd.exec_argv().unwrap();
        assert_eq!(argv[0].as_bytes(), b"echo");
        assert_eq!(argv[1].as_bytes(), b"ok");
    }
}
