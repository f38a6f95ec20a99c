//! mdflow CLI entry point.
//!
//! Parses the outer command line, runs the agent, and exits with the
//! relayed code: the driver's own exit status on a completed run, 2 for
//! configuration errors, 130/143 after signals, 127 for a missing driver
//! binary.

use clap::Parser;
use mdflow::cli::Cli;
use mdflow::core::{user_friendly_error, MdflowError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    match cli.execute().await {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            // Dry runs and other early exits are control flow, not failures.
            if matches!(error.downcast_ref::<MdflowError>(), Some(MdflowError::EarlyExitRequest)) {
                std::process::exit(0);
            }
            let ctx = user_friendly_error(error);
            ctx.display();
            std::process::exit(ctx.exit_code);
        }
    }
}

/// Wire `tracing` to stderr; `DEBUG`/`MA_DEBUG` raise the default level,
/// `RUST_LOG` wins when set.
fn init_tracing() {
    let debug_requested = std::env::var("DEBUG").is_ok_and(|v| !v.is_empty())
        || std::env::var("MA_DEBUG").is_ok_and(|v| !v.is_empty());
    let default_filter = if debug_requested { "mdflow=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
