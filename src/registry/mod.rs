//! Package index collaborators
//!
//! The resolution core never talks to a package index directly. It asks two
//! collaborators:
//!
//! 1. [`IndexLookup`] - which artifacts exist for a package name
//! 2. [`MetadataLookup`] - which requirements a resolved release declares
//!
//! Transport concerns (HTTP, retries, authentication) belong to the
//! implementations. A collaborator error is final: the core reports it as a
//! resolution failure for the requirement being resolved and does not retry.
//!
//! [`LocalIndex`] implements both from a JSON document and backs the CLI and
//! the tests.

mod index;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::requirements::{Requirement, RequirementType};
use crate::version::Version;

pub use index::{ArtifactEntry, DependencyEntry, LocalIndex, PackageEntry, ReleaseEntry};

/// Distribution form of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Needs a build step (sdist)
    Source,
    /// Directly installable (wheel)
    Binary,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Source => write!(f, "source"),
            ArtifactKind::Binary => write!(f, "binary"),
        }
    }
}

/// One downloadable artifact offered by the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub version: Version,
    pub kind: ArtifactKind,
    /// Where the artifact can be fetched from
    pub locator: String,
    /// Interpreter compatibility specifier, e.g. `>=3.8`
    pub requires_python: Option<String>,
    pub yanked: bool,
}

/// Lists the artifacts available for a package
pub trait IndexLookup: Send + Sync {
    /// All artifacts for `name` in index order; an unknown package yields none
    fn candidates(&self, name: &str) -> anyhow::Result<Vec<Candidate>>;
}

/// Reports the requirements declared by a resolved release
pub trait MetadataLookup: Send + Sync {
    /// Declared dependencies of `name` at `version`, tagged by kind
    fn dependencies(
        &self,
        name: &str,
        version: &Version,
    ) -> anyhow::Result<Vec<(RequirementType, Requirement)>>;
}

impl<T: IndexLookup + ?Sized> IndexLookup for Arc<T> {
    fn candidates(&self, name: &str) -> anyhow::Result<Vec<Candidate>> {
        (**self).candidates(name)
    }
}

impl<T: MetadataLookup + ?Sized> MetadataLookup for Arc<T> {
    fn dependencies(
        &self,
        name: &str,
        version: &Version,
    ) -> anyhow::Result<Vec<(RequirementType, Requirement)>> {
        (**self).dependencies(name, version)
    }
}
