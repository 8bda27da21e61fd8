//! CLI argument parsing using clap derive macros

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use wheelwright::config::{validate_settings, Settings};

use crate::commands::{
    bootstrap::BootstrapCommand, build_order::BuildOrderCommand, resolve::ResolveCommand,
};

/// wheelwright - resolve and order Python source package builds
///
/// Resolves requirements against a package index, records the resolved
/// dependency graph and computes a parallel build order from it.
#[derive(Parser, Debug)]
#[command(name = "wheelwright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file (default: nearest wheelwright.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Local package index JSON
    #[arg(long, global = true, value_name = "FILE")]
    pub index: Option<PathBuf>,

    /// Target interpreter version for requires-python checks
    #[arg(
        long,
        global = true,
        env = "WHEELWRIGHT_PYTHON_VERSION",
        value_name = "VERSION"
    )]
    pub python_version: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a single requirement against the index
    Resolve(ResolveCommand),

    /// Resolve requirements recursively and write the dependency graph
    Bootstrap(BootstrapCommand),

    /// Print the build batches of a dependency graph
    BuildOrder(BuildOrderCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        if self.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }

        let settings = self.load_settings()?;
        debug!(?settings, "effective settings");

        match self.command {
            Commands::Resolve(cmd) => cmd.execute(&settings, self.verbose),
            Commands::Bootstrap(cmd) => cmd.execute(&settings, self.verbose),
            Commands::BuildOrder(cmd) => cmd.execute(&settings, self.verbose),
        }
    }

    /// Config file values with command-line overrides applied
    fn load_settings(&self) -> Result<Settings> {
        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => {
                let cwd = std::env::current_dir().context("Failed to get current directory")?;
                Settings::find_config(&cwd)
            }
        };

        let mut settings = match config_path {
            Some(path) => {
                debug!(path = %path.display(), "loading configuration");
                Settings::load_from(&path)?
            }
            None => Settings::default(),
        };

        if let Some(index) = &self.index {
            settings.index = Some(index.clone());
        }
        if let Some(python_version) = &self.python_version {
            settings.python_version = python_version.clone();
        }
        validate_settings(&settings).context("Invalid command-line override")?;
        Ok(settings)
    }
}
