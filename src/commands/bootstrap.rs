//! Bootstrap command - resolve a requirement tree into a dependency graph
//!
//! Usage:
//!   wheelwright bootstrap "app>=1.0" "tool"
//!   wheelwright bootstrap -r requirements.txt -o build/graph.json
//!   wheelwright bootstrap -r requirements.txt --prev-graph build/graph.json

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use wheelwright::config::Settings;
use wheelwright::{parse_requirements_file, Bootstrapper, DependencyGraph, Requirement, Resolver};

use super::load_index;
use crate::utils::terminal::{create_spinner, print_success, print_warning};

/// Resolve requirements recursively
#[derive(Args, Debug)]
pub struct BootstrapCommand {
    /// Top-level requirements
    pub requirements: Vec<String>,

    /// Read top-level requirements from a file
    #[arg(long, short = 'r', value_name = "FILE")]
    pub requirements_file: Vec<PathBuf>,

    /// Where to write the resolved graph
    #[arg(long, short = 'o', default_value = "graph.json")]
    pub output: PathBuf,

    /// Build everything from source unless configured as pre-built
    #[arg(long)]
    pub sdist_only: bool,

    /// Number of resolution workers
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Graph from a previous run; its versions are preferred
    #[arg(long, value_name = "FILE")]
    pub prev_graph: Option<PathBuf>,
}

impl BootstrapCommand {
    pub fn execute(self, settings: &Settings, verbose: bool) -> Result<()> {
        let requirements = self.collect_requirements()?;
        if requirements.is_empty() {
            bail!("No requirements given; pass them as arguments or with -r FILE");
        }

        let index = Arc::new(load_index(settings)?);
        let resolver = Resolver::new(settings.python_version()?)
            .with_allow_prereleases(settings.allow_prereleases);

        let mut bootstrapper = Bootstrapper::new(resolver, index.clone(), index)
            .with_constraints(settings.load_constraints()?)
            .with_sdist_only(self.sdist_only || settings.sdist_only)
            .with_pre_built(&settings.pre_built)
            .with_jobs(self.jobs.unwrap_or(settings.jobs));

        if let Some(path) = self.prev_graph.as_ref().or(settings.prev_graph.as_ref()) {
            let prev = DependencyGraph::from_file(path)
                .with_context(|| format!("Failed to load previous graph {}", path.display()))?;
            bootstrapper = bootstrapper.with_prev_graph(prev);
        }

        let spinner = (!verbose).then(|| create_spinner("Resolving"));
        if let Some(pb) = &spinner {
            bootstrapper = bootstrapper.with_progress(pb.clone());
        }

        let report = bootstrapper.bootstrap(&requirements)?;
        if let Some(pb) = &spinner {
            pb.finish_and_clear();
        }

        let graph = bootstrapper.graph();
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        graph.write_to_file(&self.output)?;

        print_success(&format!(
            "Resolved {} packages in {} rounds, graph written to {}",
            graph.len(),
            report.rounds,
            self.output.display()
        ));

        for failure in &report.failures {
            let parent = failure
                .parent
                .as_ref()
                .map_or_else(|| "top level".to_string(), |k| k.to_string());
            print_warning(&format!(
                "{} ({} of {}): {}",
                failure.requirement, failure.req_type, parent, failure.error
            ));
        }

        let failed = report.top_level_failures().count();
        if failed > 0 {
            bail!("{} top-level requirement(s) could not be resolved", failed);
        }
        Ok(())
    }

    fn collect_requirements(&self) -> Result<Vec<Requirement>> {
        let mut requirements = Vec::new();
        for text in &self.requirements {
            requirements.push(Requirement::parse(text)?);
        }
        for path in &self.requirements_file {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read requirements file {}", path.display()))?;
            requirements.extend(
                parse_requirements_file(&content)
                    .with_context(|| format!("Invalid requirements file {}", path.display()))?,
            );
        }
        Ok(requirements)
    }
}
