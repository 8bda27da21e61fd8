//! wheelwright.toml configuration parsing
//!
//! ```toml
//! python_version = "3.11"
//! sdist_only = true
//! allow_prereleases = false
//! jobs = 8
//! constraints = ["numpy<2", "setuptools>=68"]
//! constraints_file = "constraints.txt"
//! pre_built = ["torch"]
//! index = "index.json"
//! prev_graph = "build/graph.json"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::validation::validate_settings;
use crate::constraints::Constraints;
use crate::requirements::canonicalize_name;
use crate::version::Version;

/// Configuration file name searched for by [`Settings::find_config`]
pub const CONFIG_FILE: &str = "wheelwright.toml";

/// Interpreter version targeted when none is configured
pub const DEFAULT_PYTHON_VERSION: &str = "3.12";

/// Bootstrap settings from wheelwright.toml
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Interpreter version used for requires-python checks
    #[serde(default = "default_python_version")]
    pub python_version: String,

    /// Build everything from source unless listed in `pre_built`
    #[serde(default)]
    pub sdist_only: bool,

    /// Accept pre-releases for every package
    #[serde(default)]
    pub allow_prereleases: bool,

    /// Parallel resolution and build workers
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Inline constraints, requirement syntax
    #[serde(default)]
    pub constraints: Vec<String>,

    /// Requirements-style constraints file
    pub constraints_file: Option<PathBuf>,

    /// Packages that must come from binary artifacts
    #[serde(default)]
    pub pre_built: Vec<String>,

    /// Local package index JSON
    pub index: Option<PathBuf>,

    /// Graph written by a previous run, used to keep versions stable
    pub prev_graph: Option<PathBuf>,
}

fn default_python_version() -> String {
    DEFAULT_PYTHON_VERSION.to_string()
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            python_version: default_python_version(),
            sdist_only: false,
            allow_prereleases: false,
            jobs: default_jobs(),
            constraints: Vec::new(),
            constraints_file: None,
            pre_built: Vec::new(),
            index: None,
            prev_graph: None,
        }
    }
}

impl Settings {
    /// Load settings from a file, resolving relative paths against its directory
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let mut settings = Self::parse(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        if let Some(base) = path.parent() {
            settings.resolve_paths(base);
        }
        Ok(settings)
    }

    /// Parse and validate settings from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(content).context("Failed to parse wheelwright.toml")?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Find wheelwright.toml by searching up from `start`
    pub fn find_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.constraints_file,
            &mut self.index,
            &mut self.prev_graph,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Parsed interpreter version
    pub fn python_version(&self) -> Result<Version> {
        Version::parse(&self.python_version)
            .with_context(|| format!("Invalid python_version '{}'", self.python_version))
    }

    /// `(include_sdists, include_wheels)` for a package
    pub fn include_flags(&self, name: &str) -> (bool, bool) {
        let name = canonicalize_name(name);
        if self.pre_built.iter().any(|p| canonicalize_name(p) == name) {
            (false, true)
        } else if self.sdist_only {
            (true, false)
        } else {
            (true, true)
        }
    }

    /// Inline constraints plus the constraints file, if any
    pub fn load_constraints(&self) -> Result<Constraints> {
        let mut constraints = Constraints::new();
        for spec in &self.constraints {
            constraints
                .add_constraint(spec)
                .with_context(|| format!("Invalid constraint '{}'", spec))?;
        }
        if let Some(path) = &self.constraints_file {
            constraints.load_constraints_file(path).with_context(|| {
                format!("Failed to load constraints file {}", path.display())
            })?;
        }
        Ok(constraints)
    }
}
