//! Resolve command - pick a version for one requirement
//!
//! Usage:
//!   wheelwright --index index.json resolve "packaging>=24.0"
//!   wheelwright resolve numpy --constraint "numpy<2"

use anyhow::{Context, Result};
use clap::Args;

use wheelwright::config::Settings;
use wheelwright::{Requirement, Resolver};

use super::load_index;

/// Resolve a single requirement
#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Requirement to resolve, e.g. "packaging>=24.0"
    pub requirement: String,

    /// Extra constraint applied on top of the configured ones
    #[arg(long, short = 'c', value_name = "SPEC")]
    pub constraint: Vec<String>,
}

impl ResolveCommand {
    pub fn execute(self, settings: &Settings, _verbose: bool) -> Result<()> {
        let req = Requirement::parse(&self.requirement)?;
        let index = load_index(settings)?;

        let mut constraints = settings.load_constraints()?;
        for spec in &self.constraint {
            constraints
                .add_constraint(spec)
                .with_context(|| format!("Invalid --constraint '{}'", spec))?;
        }

        let resolver = Resolver::new(settings.python_version()?)
            .with_allow_prereleases(settings.allow_prereleases);
        let (include_sdists, include_wheels) = settings.include_flags(req.canonical_name());
        let (locator, version) =
            resolver.resolve(&req, &index, &constraints, include_sdists, include_wheels)?;

        println!("{}=={} {}", req.canonical_name(), version, locator);
        Ok(())
    }
}
