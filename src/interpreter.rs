use crate::builtin::ExitCode;
use crate::config::Limits;
use crate::error::ShellError;
use crate::launcher::{self, Launch, Placement, Wiring};
use crate::parser::{self, ParsedCommand, REDIRECT_MARKER};
use crate::state::ShellState;
use crate::tokenizer::{self, Delimiter};
use nix::unistd::pipe;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::Path;

/// Line that ends the interpreter.
pub const EXIT_TOKEN: &str = "exit";

/// Notice printed when the interpreter ends.
pub const FAREWELL: &str = "Exiting shell...";

/// How the commands of one line are run. Selected once per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One command, optionally with its output redirected to a file.
    Single,
    /// Commands run one after another, each waited for before the next starts.
    Sequential,
    /// Commands all spawned first, then waited for in spawn order.
    Parallel,
    /// Commands connected stdout-to-stdin through pipes.
    Piped,
}

/// Pick the execution mode for a line.
///
/// Markers are checked in priority order and the first one present wins, even
/// when a lower-priority marker would have made more sense for the line:
/// `&&`, then `##`, then `>`, then `|`.
pub fn select_mode(line: &str) -> ExecutionMode {
    if line.contains(Delimiter::Parallel.marker()) {
        ExecutionMode::Parallel
    } else if line.contains(Delimiter::Sequential.marker()) {
        ExecutionMode::Sequential
    } else if line.contains(REDIRECT_MARKER) {
        ExecutionMode::Single
    } else if line.contains(Delimiter::Pipe.marker()) {
        ExecutionMode::Piped
    } else {
        ExecutionMode::Single
    }
}

/// Whether the driver should keep reading lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// The command interpreter: owns the shell state and runs lines to completion.
///
/// Example
/// ```no_run
/// use forksh::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.execute_line("echo hello ## echo world").unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    state: ShellState,
    limits: Limits,
}

impl Interpreter {
    pub fn new(limits: Limits) -> Self {
        Self {
            state: ShellState::new(),
            limits,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    /// Read lines from the terminal until the exit token or end of input.
    ///
    /// Only a fatal error ends the loop early.
    pub fn repl(&mut self, history: Option<&Path>) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;
        if let Some(path) = history {
            if let Err(err) = rl.load_history(path) {
                tracing::debug!(path = %path.display(), error = %err, "no history loaded");
            }
        }

        loop {
            match rl.readline(&self.state.prompt()) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if self.step(&line)? == Flow::Exit {
                        break;
                    }
                }
                // The interrupt key is ignored by the shell; drop the line and go on.
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    println!("{FAREWELL}");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(path) = history {
            if let Err(err) = rl.save_history(path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to save history");
            }
        }
        Ok(())
    }

    /// Run a fixed list of lines, as if they had been typed one by one.
    pub fn run_lines<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<(), ShellError> {
        for line in lines {
            if self.step(line.as_ref())? == Flow::Exit {
                break;
            }
        }
        Ok(())
    }

    /// Handle one raw input line on behalf of the driver.
    ///
    /// Recoverable errors are reported here and the driver continues; only
    /// fatal errors are returned.
    pub fn step(&mut self, raw: &str) -> Result<Flow, ShellError> {
        let line = raw.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        if line == EXIT_TOKEN {
            println!("{FAREWELL}");
            return Ok(Flow::Exit);
        }

        match self.execute_line(line) {
            Ok(_) => Ok(Flow::Continue),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                report(&err);
                Ok(Flow::Continue)
            }
        }
    }

    /// Run one trimmed line in the mode it selects and wait for everything it
    /// spawned. Returns the exit code of the last command waited for.
    pub fn execute_line(&mut self, line: &str) -> Result<ExitCode, ShellError> {
        let mode = select_mode(line);
        tracing::debug!(?mode, line, "executing line");
        match mode {
            ExecutionMode::Single => self.run_single(line),
            ExecutionMode::Sequential => {
                let commands = self.split(line, Delimiter::Sequential)?;
                self.run_sequential(&commands)
            }
            ExecutionMode::Parallel => {
                let commands = self.split(line, Delimiter::Parallel)?;
                self.run_parallel(&commands)
            }
            ExecutionMode::Piped => self.run_piped(line),
        }
    }

    fn split(&self, line: &str, delimiter: Delimiter) -> Result<Vec<String>, ShellError> {
        let commands = tokenizer::split(line, delimiter);
        if commands.len() > self.limits.max_commands {
            return Err(ShellError::TooManyCommands {
                count: commands.len(),
                limit: self.limits.max_commands,
            });
        }
        Ok(commands)
    }

    /// Launch one command in the foreground and wait for it.
    ///
    /// A `> target` clause redirects the command's output; `cd` runs in-process.
    fn run_single(&mut self, command: &str) -> Result<ExitCode, ShellError> {
        let parsed = parser::parse(command, self.limits.max_arguments)?;
        let wiring = Wiring::for_redirection(parsed.redirection());
        match launcher::launch(&parsed, wiring, Placement::Interpreter, &mut self.state)? {
            Launch::NoOp => Ok(0),
            Launch::Builtin(code) => Ok(code),
            Launch::Spawned(handle) => Ok(handle.wait()),
        }
    }

    /// Run each command to completion before starting the next one.
    ///
    /// A failing command does not stop the ones after it.
    fn run_sequential(&mut self, commands: &[String]) -> Result<ExitCode, ShellError> {
        let mut last = 0;
        for command in commands {
            last = match self.run_single(command) {
                Ok(code) => code,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    report(&err);
                    1
                }
            };
        }
        Ok(last)
    }

    /// Spawn every command without waiting, then wait for all of them in spawn order.
    ///
    /// Each command runs in its own child, including `cd`, whose effect is
    /// therefore lost to the interpreter.
    fn run_parallel(&mut self, commands: &[String]) -> Result<ExitCode, ShellError> {
        let mut handles = Vec::with_capacity(commands.len());
        for command in commands {
            let launched = parser::parse_plain(command, self.limits.max_arguments).and_then(
                |parsed| launcher::launch(&parsed, Wiring::inherit(), Placement::Child, &mut self.state),
            );
            match launched {
                Ok(Launch::Spawned(handle)) => handles.push(handle),
                Ok(Launch::NoOp | Launch::Builtin(_)) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => report(&err),
            }
        }

        tracing::debug!(count = handles.len(), "all parallel commands spawned");
        let mut last = 0;
        for handle in handles {
            last = handle.wait();
        }
        Ok(last)
    }

    /// Run the stages of a pipeline, each reading the previous stage's output.
    ///
    /// Every stage is waited for before the next one is forked. A stage that
    /// writes more than the pipe can buffer therefore blocks forever, since its
    /// reader does not exist yet.
    fn run_piped(&mut self, line: &str) -> Result<ExitCode, ShellError> {
        if line.ends_with(Delimiter::Pipe.marker()) {
            return Err(ShellError::TrailingPipe);
        }

        let commands = self.split(line, Delimiter::Pipe)?;
        let stages = commands
            .iter()
            .map(|command| -> Result<ParsedCommand, ShellError> {
                let parsed = parser::parse_plain(command, self.limits.max_arguments)?;
                if parsed.is_noop() {
                    tracing::debug!(stage = command.as_str(), "empty pipeline stage");
                    return Err(ShellError::EmptyPipelineStage);
                }
                parsed.exec_argv()?;
                Ok(parsed)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let last_stage = stages.len().saturating_sub(1);
        let mut upstream: Option<OwnedFd> = None;
        let mut last = 0;
        for (i, stage) in stages.iter().enumerate() {
            let (read_end, write_end) = pipe().map_err(ShellError::Pipe)?;

            let mut wiring = Wiring::inherit().close_in_child(read_end.as_raw_fd());
            if let Some(fd) = upstream.take() {
                wiring = wiring.stdin_from(fd);
            }
            if i < last_stage {
                wiring = wiring.stdout_to_pipe(write_end);
            } else {
                drop(write_end);
            }

            // The parent's copies of the write end and the previous read end
            // are closed when `launch` drops the wiring.
            if let Launch::Spawned(handle) =
                launcher::launch(stage, wiring, Placement::Child, &mut self.state)?
            {
                last = handle.wait();
            }
            upstream = Some(read_end);
        }
        drop(upstream);
        Ok(last)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

fn report(err: &ShellError) {
    tracing::debug!(error = %err, "command failed");
    eprintln!("{err}");
}
