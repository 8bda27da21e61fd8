//! JSON-backed package index
//!
//! # Index Structure
//!
//! ```json
//! {
//!   "packages": {
//!     "packaging": {
//!       "releases": [
//!         {
//!           "version": "24.2",
//!           "requires_python": ">=3.8",
//!           "artifacts": [
//!             { "kind": "binary", "url": "https://files.example/packaging-24.2-py3-none-any.whl" },
//!             { "kind": "source", "url": "https://files.example/packaging-24.2.tar.gz" }
//!           ],
//!           "dependencies": [
//!             { "kind": "build", "requirement": "flit_core>=3.3" }
//!           ]
//!         }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Package names are canonicalized on load, so `PyYAML` and `pyyaml` refer to
//! the same entry.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::{ArtifactKind, Candidate, IndexLookup, MetadataLookup};
use crate::requirements::{canonicalize_name, Requirement, RequirementType};
use crate::version::Version;

/// A single downloadable file of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub kind: ArtifactKind,

    /// Download URL
    pub url: String,

    /// Overrides the release's `requires_python` for this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_python: Option<String>,
}

/// A requirement declared by a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub kind: RequirementType,
    pub requirement: String,
}

/// Version entry for a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    /// Version string (e.g., "24.2")
    pub version: String,

    /// Whether this version is yanked
    #[serde(default)]
    pub yanked: bool,

    /// Yanked reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yanked_reason: Option<String>,

    /// Interpreter compatibility for every artifact of the release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_python: Option<String>,

    #[serde(default)]
    pub artifacts: Vec<ArtifactEntry>,

    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

/// Package entry in the index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    #[serde(default)]
    pub releases: Vec<ReleaseEntry>,
}

/// In-memory package index loaded from JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIndex {
    #[serde(default)]
    packages: BTreeMap<String, PackageEntry>,
}

impl LocalIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse index JSON
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: LocalIndex = serde_json::from_str(text).context("Failed to parse index JSON")?;
        let mut index = LocalIndex::new();
        for (name, entry) in raw.packages {
            for release in &entry.releases {
                Version::parse(&release.version).with_context(|| {
                    format!("Invalid version '{}' for package '{}'", release.version, name)
                })?;
            }
            index
                .packages
                .entry(canonicalize_name(&name))
                .or_default()
                .releases
                .extend(entry.releases);
        }
        Ok(index)
    }

    /// Load an index file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read index file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to load index file: {}", path.display()))
    }

    /// Serialize the index as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize index")
    }

    /// Write the index to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write index file: {}", path.display()))
    }

    /// Names of all packages, canonical and sorted
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn package(&self, name: &str) -> Option<&PackageEntry> {
        self.packages.get(&canonicalize_name(name))
    }

    fn release_mut(&mut self, name: &str, version: &str) -> Result<&mut ReleaseEntry> {
        let wanted = Version::parse(version)
            .with_context(|| format!("Invalid version '{}' for package '{}'", version, name))?;
        let releases = &mut self
            .packages
            .entry(canonicalize_name(name))
            .or_default()
            .releases;

        let pos = releases
            .iter()
            .position(|r| Version::parse(&r.version).is_ok_and(|v| v == wanted));
        let pos = match pos {
            Some(pos) => pos,
            None => {
                releases.push(ReleaseEntry {
                    version: version.to_string(),
                    yanked: false,
                    yanked_reason: None,
                    requires_python: None,
                    artifacts: Vec::new(),
                    dependencies: Vec::new(),
                });
                releases.len() - 1
            }
        };
        Ok(&mut releases[pos])
    }

    fn release(&self, name: &str, version: &Version) -> Option<&ReleaseEntry> {
        self.package(name)?
            .releases
            .iter()
            .find(|r| Version::parse(&r.version).is_ok_and(|v| &v == version))
    }

    /// Add an artifact, creating the release if needed
    pub fn add_artifact(
        &mut self,
        name: &str,
        version: &str,
        kind: ArtifactKind,
        url: &str,
    ) -> Result<&mut Self> {
        self.release_mut(name, version)?.artifacts.push(ArtifactEntry {
            kind,
            url: url.to_string(),
            requires_python: None,
        });
        Ok(self)
    }

    /// Set the interpreter requirement of a release
    pub fn set_requires_python(&mut self, name: &str, version: &str, spec: &str) -> Result<&mut Self> {
        self.release_mut(name, version)?.requires_python = Some(spec.to_string());
        Ok(self)
    }

    /// Mark a release as yanked
    pub fn yank(&mut self, name: &str, version: &str, reason: Option<&str>) -> Result<&mut Self> {
        let release = self.release_mut(name, version)?;
        release.yanked = true;
        release.yanked_reason = reason.map(str::to_string);
        Ok(self)
    }

    /// Declare a dependency of a release
    pub fn add_dependency(
        &mut self,
        name: &str,
        version: &str,
        kind: RequirementType,
        requirement: &str,
    ) -> Result<&mut Self> {
        if kind == RequirementType::TopLevel {
            bail!("Release dependencies cannot be tagged '{}'", kind);
        }
        Requirement::parse(requirement)
            .with_context(|| format!("Invalid dependency of {}=={}", name, version))?;
        self.release_mut(name, version)?
            .dependencies
            .push(DependencyEntry {
                kind,
                requirement: requirement.to_string(),
            });
        Ok(self)
    }
}

impl IndexLookup for LocalIndex {
    fn candidates(&self, name: &str) -> Result<Vec<Candidate>> {
        let Some(entry) = self.package(name) else {
            return Ok(Vec::new());
        };

        let mut candidates = Vec::new();
        for release in &entry.releases {
            let version = Version::parse(&release.version).with_context(|| {
                format!("Invalid version '{}' for package '{}'", release.version, name)
            })?;
            for artifact in &release.artifacts {
                candidates.push(Candidate {
                    version: version.clone(),
                    kind: artifact.kind,
                    locator: artifact.url.clone(),
                    requires_python: artifact
                        .requires_python
                        .clone()
                        .or_else(|| release.requires_python.clone()),
                    yanked: release.yanked,
                });
            }
        }
        Ok(candidates)
    }
}

impl MetadataLookup for LocalIndex {
    fn dependencies(
        &self,
        name: &str,
        version: &Version,
    ) -> Result<Vec<(RequirementType, Requirement)>> {
        let Some(release) = self.release(name, version) else {
            bail!("No metadata for {}=={} in the index", name, version);
        };

        release
            .dependencies
            .iter()
            .map(|dep| {
                if dep.kind == RequirementType::TopLevel {
                    bail!(
                        "Dependency '{}' of {}=={} cannot be tagged '{}'",
                        dep.requirement,
                        name,
                        version,
                        dep.kind
                    );
                }
                let req = Requirement::parse(&dep.requirement).with_context(|| {
                    format!("Invalid dependency of {}=={}", name, version)
                })?;
                Ok((dep.kind, req))
            })
            .collect()
    }
}
