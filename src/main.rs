//! `wintoolchain` - Windows toolchain discovery from the command line.
//!
//! JSON results go to stdout, diagnostics to stderr. Exits with status 1 when
//! detection fails.

mod cli;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use wintoolchain_discovery::DetectError;

use cli::Cli;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            if let Some(detect) = e.downcast_ref::<DetectError>() {
                eprintln!("hint: {}", detect.hint());
            }
            ExitCode::FAILURE
        }
    }
}
