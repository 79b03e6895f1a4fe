use anyhow::Context;
use forksh::{Interpreter, Options, reaper};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let options: Options = argh::from_env();
    init_logging(options.verbose);

    reaper::ignore_keyboard_signals().context("failed to ignore keyboard signals")?;
    reaper::install().context("failed to install the child reaper")?;

    let mut sh = Interpreter::new(options.limits());
    if options.command.is_empty() {
        sh.repl(options.history.as_deref())
    } else {
        sh.run_lines(&options.command)?;
        Ok(())
    }
}

/// Log to stderr, filtered by `FORKSH_LOG` (default `warn`, or `debug` with `--verbose`).
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("FORKSH_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
