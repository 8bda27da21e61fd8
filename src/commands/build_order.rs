//! Build-order command - print parallel build batches
//!
//! Usage:
//!   wheelwright build-order --graph graph.json
//!   wheelwright build-order --graph graph.json --format json

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};

use wheelwright::config::Settings;
use wheelwright::{DependencyGraph, TopologicalSorter};

/// Output format for build-order command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// One numbered line per batch (default)
    #[default]
    Text,
    /// JSON array of batches
    Json,
}

/// Print the build batches of a graph
#[derive(Args, Debug)]
pub struct BuildOrderCommand {
    /// Graph written by `wheelwright bootstrap`
    #[arg(long, short = 'g', default_value = "graph.json")]
    pub graph: PathBuf,

    /// Output format: text, json
    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl BuildOrderCommand {
    pub fn execute(self, _settings: &Settings, _verbose: bool) -> Result<()> {
        let graph = DependencyGraph::from_file(&self.graph)?;
        let batches: Vec<Vec<String>> = TopologicalSorter::from_graph(&graph)?
            .static_batches()?
            .map(|batch| batch.iter().map(ToString::to_string).collect())
            .collect();

        match self.format {
            OutputFormat::Text => {
                for (i, batch) in batches.iter().enumerate() {
                    println!("{}: {}", i + 1, batch.join(" "));
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&batches)?);
            }
        }
        Ok(())
    }
}
