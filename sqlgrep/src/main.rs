//! sqlgrep command-line entry point.
//!
//! Results go to stdout; logs go to stderr. The exit code is 0 on success,
//! 2 for authentication failures, 3 for unexpected failures and 1 otherwise.

use clap::Parser;
use sqlgrep::Cli;
use sqlgrep::console::Console;
use sqlgrep_core::init_logging;
use std::io::IsTerminal;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let stdout = std::io::stdout();
    let ansi = stdout.is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let mut console = Console::new(stdout.lock(), ansi);

    ExitCode::from(sqlgrep::run(&cli, &mut console).await)
}
