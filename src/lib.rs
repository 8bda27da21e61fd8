//! wheelwright - dependency resolution and build ordering for Python source packages
//!
//! The library resolves requirements against a package index into a shared
//! [`DependencyGraph`], then orders the graph's nodes into batches that can be
//! built in parallel.
//!
//! ```text
//! Requirement → Resolver (+ Constraints, IndexLookup) → DependencyGraph
//!             → TopologicalSorter → static batches / BuildScheduler
//! ```
//!
//! [`Bootstrapper`] drives the whole walk: it resolves the top-level
//! requirements, follows every resolved release's declared dependencies and
//! records each step as a graph edge.

pub mod bootstrapper;
pub mod config;
pub mod constraints;
pub mod dependency;
pub mod error;
pub mod registry;
pub mod requirements;
pub mod resolver;
pub mod specifier;
pub mod version;

pub use bootstrapper::{BootstrapFailure, BootstrapReport, Bootstrapper};
pub use constraints::Constraints;
pub use dependency::{
    BuildReport, BuildScheduler, DependencyGraph, Edge, Node, NodeKey, SerializedGraph,
    StaticBatches, TopologicalSorter,
};
pub use error::{Error, RejectReason, RejectionSummary, Result};
pub use registry::{ArtifactKind, Candidate, IndexLookup, LocalIndex, MetadataLookup};
pub use requirements::{canonicalize_name, parse_requirements_file, Requirement, RequirementType};
pub use resolver::{CacheInfo, PythonVersionMatcher, Resolver};
pub use specifier::{Specifier, SpecifierSet};
pub use version::Version;
