use crate::state::ShellState;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Conventional process exit code: 0 for success, non-zero for failure.
pub type ExitCode = i32;

/// Name of the directory-change built-in.
pub const CD: &str = "cd";

/// Argument that `cd` treats as the home directory.
pub const HOME_ALIAS: &str = "~";

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed with [`argh`] and run without replacing any process image.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Run the command against the shell state of the calling process.
    fn execute(self, state: &mut ShellState) -> Result<ExitCode>;
}

/// Result of checking a command against the built-ins.
#[derive(Debug)]
pub enum Builtin {
    /// The command is not a built-in and must be launched as a program.
    NotBuiltin,
    /// The built-in ran and finished with this status.
    Ran(ExitCode),
    /// The built-in ran and failed; the interpreter reports this and continues.
    Failed(anyhow::Error),
}

/// Run `argv` as a built-in if its name matches one.
pub fn dispatch(argv: &[String], state: &mut ShellState) -> Builtin {
    match argv.split_first() {
        Some((name, args)) if name.as_str() == Cd::name() => run::<Cd>(name, args, state),
        _ => Builtin::NotBuiltin,
    }
}

fn run<T: BuiltinCommand>(name: &str, args: &[String], state: &mut ShellState) -> Builtin {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::from_args(&[name], &args) {
        Ok(cmd) => match cmd.execute(state) {
            Ok(code) => Builtin::Ran(code),
            Err(e) => Builtin::Failed(e),
        },
        Err(EarlyExit { output, status }) => {
            if status.is_err() {
                eprint!("{}", output);
                Builtin::Ran(1)
            } else {
                print!("{}", output);
                Builtin::Ran(0)
            }
        }
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// Without a target, or with `~`, changes to the directory named by HOME.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        CD
    }

    fn execute(self, state: &mut ShellState) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() && t.as_str() != HOME_ALIAS => PathBuf::from(t),
            _ => match state.home() {
                Some(home) => home.to_path_buf(),
                None => return Err(anyhow::anyhow!("cd: no target and HOME not set")),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            state.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: {}", canonical.display()))?;
        tracing::debug!(dir = %canonical.display(), "changed directory");
        state.current_dir = canonical;
        Ok(0)
    }
}
