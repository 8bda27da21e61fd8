//! Per-package version constraints
//!
//! Constraints restrict which versions may be chosen for a package without
//! themselves requesting that the package be installed. Absence of a
//! constraint is permissive. Adding a second constraint for the same package
//! intersects with the first; clauses are never replaced.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::requirements::{canonicalize_name, parse_requirements_file, Requirement};
use crate::specifier::SpecifierSet;
use crate::version::Version;

/// A set of version constraints keyed by canonical package name
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    constraints: BTreeMap<String, SpecifierSet>,
}

impl Constraints {
    /// Create an empty constraint set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and register a constraint like `numpy>=1.20,<2.0`
    pub fn add_constraint(&mut self, spec: &str) -> Result<()> {
        let req = Requirement::parse(spec)?;
        self.add_requirement(&req)
    }

    /// Register an already parsed requirement as a constraint
    pub fn add_requirement(&mut self, req: &Requirement) -> Result<()> {
        if !req.extras().is_empty() {
            return Err(Error::parse(
                req.to_string(),
                "constraints cannot specify extras",
            ));
        }

        debug!(package = req.canonical_name(), specifier = %req.specifier(), "adding constraint");

        self.constraints
            .entry(req.canonical_name().to_string())
            .or_default()
            .intersect(req.specifier());
        Ok(())
    }

    /// Load constraints from a requirements-style file
    pub fn load_constraints_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        for req in parse_requirements_file(&content)? {
            self.add_requirement(&req)?;
        }
        Ok(())
    }

    /// True if no constraint is registered for `name` or `version` satisfies it
    pub fn is_satisfied_by(&self, name: &str, version: &Version) -> bool {
        match self.constraints.get(&canonicalize_name(name)) {
            Some(spec) => spec.contains(version),
            None => true,
        }
    }

    /// Get the accumulated specifier for a package
    pub fn get_constraint(&self, name: &str) -> Option<&SpecifierSet> {
        self.constraints.get(&canonicalize_name(name))
    }

    /// True if the package's constraint explicitly names a pre-release
    pub fn allow_prerelease(&self, name: &str) -> bool {
        self.get_constraint(name)
            .is_some_and(SpecifierSet::allows_prereleases)
    }

    /// Iterate constraints in canonical name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SpecifierSet)> {
        self.constraints.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}
