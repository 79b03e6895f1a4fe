//! A small fork/exec command interpreter.
//!
//! One input line is interpreted in exactly one execution mode, chosen by the
//! highest-priority marker it contains:
//!
//! - `&&` runs the commands concurrently and waits for all of them,
//! - `##` runs them one after another,
//! - `>` redirects a single command's output to a file,
//! - `|` chains the commands through pipes,
//! - anything else is a single command.
//!
//! The main entry point is [`Interpreter`]. Lines are split by [`tokenizer`],
//! commands by [`parser`], and processes are created by [`launcher`]. The
//! [`reaper`] module reclaims children nobody waited for.

mod builtin;
pub mod config;
pub mod error;
mod interpreter;
pub mod launcher;
pub mod parser;
pub mod reaper;
pub mod state;
pub mod tokenizer;

pub use builtin::ExitCode;
pub use config::{Limits, Options};
pub use error::ShellError;
/// Just a convenient re-export of the command interpreter.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;
pub use interpreter::{EXIT_TOKEN, ExecutionMode, FAREWELL, Flow, select_mode};
pub use state::ShellState;
