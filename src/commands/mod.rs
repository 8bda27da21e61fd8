//! Command implementations
//!
//! Each command module provides a clap-derived struct and execute method.

pub mod bootstrap;
pub mod build_order;
pub mod resolve;

use anyhow::{Context, Result};

use wheelwright::config::Settings;
use wheelwright::LocalIndex;

/// Load the configured package index
fn load_index(settings: &Settings) -> Result<LocalIndex> {
    let path = settings
        .index
        .as_ref()
        .context("No package index configured; pass --index FILE or set `index` in wheelwright.toml")?;
    LocalIndex::load(path)
}
