//! wheelwright CLI - resolve Python source packages and order their builds
//!
//! ## Architecture
//!
//! ```text
//! CLI → Bootstrapper → Resolver + DependencyGraph → TopologicalSorter → build batches
//! ```

mod cli;
mod commands;
mod utils;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use utils::terminal::print_error;

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wheelwright=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = cli.execute() {
        match err.downcast_ref::<wheelwright::Error>() {
            Some(e) => e.display_with_hints(),
            None => print_error(&format!("{err:#}")),
        }
        std::process::exit(1);
    }
}
