//! Recursive resolution of a requirement tree into a dependency graph
//!
//! The bootstrapper resolves top-level requirements, records them under the
//! graph root, then walks each resolved release's declared dependencies
//! breadth-first until no unresolved requirement remains. Every round
//! resolves its whole frontier in parallel; a failed requirement only stops
//! its own branch.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use indicatif::ProgressBar;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::constraints::Constraints;
use crate::dependency::{DependencyGraph, NodeKey};
use crate::error::{Error, Result};
use crate::registry::{ArtifactKind, Candidate, IndexLookup, MetadataLookup};
use crate::requirements::{canonicalize_name, Requirement, RequirementType};
use crate::resolver::Resolver;
use crate::version::Version;

/// A requirement that could not be resolved or expanded
#[derive(Debug)]
pub struct BootstrapFailure {
    /// Package that declared the requirement; `None` for top-level input
    pub parent: Option<NodeKey>,
    pub req_type: RequirementType,
    pub requirement: Requirement,
    pub error: Error,
}

/// Aggregate outcome of [`Bootstrapper::bootstrap`]
#[derive(Debug, Default)]
pub struct BootstrapReport {
    /// Number of breadth-first rounds run
    pub rounds: usize,
    /// Number of requirements resolved and recorded in the graph
    pub resolved: usize,
    /// Failures sorted by parent then requirement text
    pub failures: Vec<BootstrapFailure>,
}

impl BootstrapReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures of requirements supplied by the caller
    pub fn top_level_failures(&self) -> impl Iterator<Item = &BootstrapFailure> {
        self.failures.iter().filter(|f| f.parent.is_none())
    }
}

#[derive(Debug, Clone)]
struct WorkItem {
    parent: Option<NodeKey>,
    req_type: RequirementType,
    req: Requirement,
}

/// Drives the resolver and the graph for one bootstrap session
pub struct Bootstrapper {
    resolver: Resolver,
    index: Arc<dyn IndexLookup>,
    metadata: Arc<dyn MetadataLookup>,
    constraints: Constraints,
    graph: DependencyGraph,
    prev_graph: Option<DependencyGraph>,
    sdist_only: bool,
    pre_built: HashSet<String>,
    jobs: usize,
    progress: Option<ProgressBar>,
    resolved: RwLock<HashMap<String, Candidate>>,
    expanded: Mutex<HashSet<NodeKey>>,
}

impl Bootstrapper {
    pub fn new(
        resolver: Resolver,
        index: Arc<dyn IndexLookup>,
        metadata: Arc<dyn MetadataLookup>,
    ) -> Self {
        Self {
            resolver,
            index,
            metadata,
            constraints: Constraints::new(),
            graph: DependencyGraph::new(),
            prev_graph: None,
            sdist_only: false,
            pre_built: HashSet::new(),
            jobs: 1,
            progress: None,
            resolved: RwLock::new(HashMap::new()),
            expanded: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Prefer versions recorded by a previous run
    pub fn with_prev_graph(mut self, prev_graph: DependencyGraph) -> Self {
        self.prev_graph = Some(prev_graph);
        self
    }

    /// Only use source artifacts unless a package is listed as pre-built
    pub fn with_sdist_only(mut self, sdist_only: bool) -> Self {
        self.sdist_only = sdist_only;
        self
    }

    /// Packages that must come from binary artifacts
    pub fn with_pre_built<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.pre_built = names
            .into_iter()
            .map(|n| canonicalize_name(n.as_ref()))
            .collect();
        self
    }

    /// Number of resolution workers per round
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn into_graph(self) -> DependencyGraph {
        self.graph
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// `(include_sdists, include_wheels)` for a package
    pub fn include_flags(&self, name: &str) -> (bool, bool) {
        if self.pre_built.contains(&canonicalize_name(name)) {
            (false, true)
        } else if self.sdist_only {
            (true, false)
        } else {
            (true, true)
        }
    }

    /// Resolve a top-level requirement and record it under the root
    ///
    /// Equivalent requirements reuse the same node; a different requirement
    /// text resolving to the same version adds a second top-level edge.
    pub fn resolve_and_add_top_level(&self, req: &Requirement) -> Result<(String, Version)> {
        let candidate = self.resolve_cached(req)?;
        self.graph.add_dependency(
            None,
            RequirementType::TopLevel,
            req,
            &candidate.version,
            &candidate.locator,
            candidate.kind == ArtifactKind::Binary,
        )?;
        Ok((candidate.locator, candidate.version))
    }

    /// Resolve `requirements` and everything they depend on
    pub fn bootstrap(&self, requirements: &[Requirement]) -> Result<BootstrapReport> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("wheelwright-resolve-{i}"))
            .build()
            .map_err(|e| Error::scheduling(format!("failed to start resolver pool: {e}")))?;

        let mut report = BootstrapReport::default();
        let mut frontier: Vec<WorkItem> = requirements
            .iter()
            .map(|req| WorkItem {
                parent: None,
                req_type: RequirementType::TopLevel,
                req: req.clone(),
            })
            .collect();

        while !frontier.is_empty() {
            report.rounds += 1;
            info!(round = report.rounds, requirements = frontier.len(), "resolving round");
            if let Some(pb) = &self.progress {
                pb.set_message(format!(
                    "round {}: {} requirements",
                    report.rounds,
                    frontier.len()
                ));
            }

            let outcomes: Vec<(WorkItem, Result<Vec<WorkItem>>)> = pool.install(|| {
                frontier
                    .into_par_iter()
                    .map(|item| {
                        let outcome = self.process(&item);
                        (item, outcome)
                    })
                    .collect()
            });

            let mut next = Vec::new();
            for (item, outcome) in outcomes {
                match outcome {
                    Ok(children) => {
                        report.resolved += 1;
                        next.extend(children);
                    }
                    Err(error) => {
                        warn!(
                            parent = %item.parent.as_ref().map_or_else(String::new, NodeKey::to_string),
                            req = %item.req,
                            error = %error,
                            "requirement failed"
                        );
                        report.failures.push(BootstrapFailure {
                            parent: item.parent,
                            req_type: item.req_type,
                            requirement: item.req,
                            error,
                        });
                    }
                }
            }
            frontier = next;
        }

        report.failures.sort_by(|a, b| {
            a.parent
                .cmp(&b.parent)
                .then_with(|| a.requirement.to_string().cmp(&b.requirement.to_string()))
        });

        info!(
            rounds = report.rounds,
            nodes = self.graph.len(),
            failures = report.failures.len(),
            "bootstrap finished"
        );
        Ok(report)
    }

    /// Resolve one work item, record its edge and return its new dependencies
    fn process(&self, item: &WorkItem) -> Result<Vec<WorkItem>> {
        let candidate = self.resolve_cached(&item.req)?;
        let pre_built = candidate.kind == ArtifactKind::Binary;
        let node = self.graph.add_dependency(
            item.parent.as_ref(),
            item.req_type,
            &item.req,
            &candidate.version,
            &candidate.locator,
            pre_built,
        )?;
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }

        let Some(key) = node.key else {
            return Ok(Vec::new());
        };
        let first_visit = self
            .expanded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        if !first_visit {
            return Ok(Vec::new());
        }

        let declared = self
            .metadata
            .dependencies(key.name(), key.version())
            .map_err(|e| {
                Error::collaborator_failed(key.to_string(), "metadata lookup failed", e)
            })?;

        // A pre-built artifact is installed as is, so it needs no build tools.
        Ok(declared
            .into_iter()
            .filter(|(kind, _)| !(node.pre_built && !kind.is_install()))
            .map(|(req_type, req)| WorkItem {
                parent: Some(key.clone()),
                req_type,
                req,
            })
            .collect())
    }

    /// Resolve with the per-run cache, the previous graph, then the index
    fn resolve_cached(&self, req: &Requirement) -> Result<Candidate> {
        let cache_key = req.to_string();
        let cached = self
            .resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key)
            .cloned();
        if let Some(candidate) = cached {
            debug!(req = %req, version = %candidate.version, "resolution cache hit");
            return Ok(candidate);
        }

        let (include_sdists, include_wheels) = self.include_flags(req.canonical_name());
        let candidate = match self.from_prev_graph(req, include_sdists, include_wheels) {
            Some(candidate) => candidate,
            None => self.resolver.resolve_candidate(
                req,
                self.index.as_ref(),
                &self.constraints,
                include_sdists,
                include_wheels,
            )?,
        };

        self.resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key, candidate.clone());
        Ok(candidate)
    }

    /// Highest version from the previous graph that still fits
    fn from_prev_graph(
        &self,
        req: &Requirement,
        include_sdists: bool,
        include_wheels: bool,
    ) -> Option<Candidate> {
        let prev = self.prev_graph.as_ref()?;
        let allow_pre = self.resolver.allows_prereleases(req, &self.constraints);
        let best = prev
            .get_nodes_by_name(req.canonical_name())
            .into_iter()
            .filter(|node| {
                if node.pre_built {
                    include_wheels
                } else {
                    include_sdists
                }
            })
            .filter_map(|node| {
                let key = node.key?;
                let fits = (allow_pre || !key.version().is_prerelease())
                    && req.matches(key.version())
                    && self
                        .constraints
                        .is_satisfied_by(key.name(), key.version());
                fits.then(|| (key, node.download_url, node.pre_built))
            })
            .max_by(|a, b| a.0.version().cmp(b.0.version()))?;

        let (key, locator, pre_built) = best;
        debug!(req = %req, node = %key, "reusing version from previous graph");
        Some(Candidate {
            version: key.version().clone(),
            kind: if pre_built {
                ArtifactKind::Binary
            } else {
                ArtifactKind::Source
            },
            locator,
            requires_python: None,
            yanked: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::TopologicalSorter;
    use crate::registry::LocalIndex;

    fn req(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    fn key(s: &str) -> NodeKey {
        NodeKey::parse(s).unwrap()
    }

    fn bootstrapper(index: LocalIndex) -> Bootstrapper {
        let index = Arc::new(index);
        Bootstrapper::new(
            Resolver::new(Version::parse("3.12").unwrap()),
            index.clone(),
            index,
        )
    }

    fn sample_index() -> LocalIndex {
        let mut index = LocalIndex::new();
        index
            .add_artifact("app", "1.0", ArtifactKind::Source, "app-1.0.tar.gz")
            .unwrap()
            .add_dependency("app", "1.0", RequirementType::Install, "lib>=2")
            .unwrap()
            .add_dependency("app", "1.0", RequirementType::Build, "setuptools")
            .unwrap()
            .add_artifact("lib", "2.5", ArtifactKind::Source, "lib-2.5.tar.gz")
            .unwrap()
            .add_artifact("lib", "2.5", ArtifactKind::Binary, "lib-2.5.whl")
            .unwrap()
            .add_dependency("lib", "2.5", RequirementType::Build, "setuptools>=60")
            .unwrap()
            .add_artifact("setuptools", "70.0", ArtifactKind::Source, "setuptools-70.0.tar.gz")
            .unwrap()
            .add_artifact("setuptools", "59.0", ArtifactKind::Source, "setuptools-59.0.tar.gz")
            .unwrap();
        index
    }

    #[test]
    fn test_resolve_and_add_top_level_is_idempotent() {
        let boot = bootstrapper(sample_index());
        let (url, version) = boot.resolve_and_add_top_level(&req("lib>=2")).unwrap();
        assert_eq!(url, "lib-2.5.whl");
        assert_eq!(version, Version::parse("2.5").unwrap());

        boot.resolve_and_add_top_level(&req("lib>=2")).unwrap();
        assert_eq!(boot.graph().len(), 1);
        assert_eq!(boot.graph().edge_count(), 1);

        boot.resolve_and_add_top_level(&req("lib<3")).unwrap();
        assert_eq!(boot.graph().len(), 1);
        assert_eq!(boot.graph().edge_count(), 2);
    }

    #[test]
    fn test_bootstrap_walks_dependencies() {
        let boot = bootstrapper(sample_index()).with_jobs(4).with_sdist_only(true);
        let report = boot.bootstrap(&[req("app")]).unwrap();
        assert!(report.is_success());
        assert_eq!(report.rounds, 3);

        let graph = boot.graph();
        assert_eq!(graph.len(), 3);
        let lib = graph.get_node(&key("lib==2.5")).unwrap();
        assert!(!lib.pre_built);
        assert_eq!(lib.download_url, "lib-2.5.tar.gz");
        let setuptools = graph.get_node(&key("setuptools==70.0")).unwrap();
        assert_eq!(setuptools.parents.len(), 2);

        let batches: Vec<_> = TopologicalSorter::from_graph(graph)
            .unwrap()
            .static_batches()
            .unwrap()
            .collect();
        let names: Vec<Vec<&str>> = batches
            .iter()
            .map(|b| b.iter().map(NodeKey::name).collect())
            .collect();
        assert_eq!(names, vec![vec!["setuptools"], vec!["lib"], vec!["app"]]);
    }

    #[test]
    fn test_pre_built_skips_build_dependencies() {
        let boot = bootstrapper(sample_index()).with_pre_built(["LIB"]);
        assert_eq!(boot.include_flags("lib"), (false, true));
        assert_eq!(boot.include_flags("app"), (true, true));

        let report = boot.bootstrap(&[req("lib")]).unwrap();
        assert!(report.is_success());
        assert_eq!(boot.graph().len(), 1);
        assert!(boot.graph().get_node(&key("lib==2.5")).unwrap().pre_built);
    }

    #[test]
    fn test_failures_do_not_stop_siblings() {
        let mut index = sample_index();
        index
            .add_artifact("broken", "1.0", ArtifactKind::Source, "broken-1.0.tar.gz")
            .unwrap()
            .add_dependency("broken", "1.0", RequirementType::Install, "ghost>=1")
            .unwrap();
        let boot = bootstrapper(index).with_jobs(2);

        let report = boot
            .bootstrap(&[req("app"), req("broken"), req("nothere")])
            .unwrap();
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.top_level_failures().count(), 1);

        let ghost = &report.failures[1];
        assert_eq!(ghost.parent, Some(key("broken==1.0")));
        assert_eq!(ghost.requirement.to_string(), "ghost>=1");
        assert!(matches!(ghost.error, Error::Resolution { .. }));

        assert!(boot.graph().get_node(&key("app==1.0")).is_some());
        assert!(boot.graph().get_node(&key("broken==1.0")).is_some());
    }

    #[test]
    fn test_prev_graph_seeds_versions() {
        let prev = DependencyGraph::new();
        prev.add_dependency(
            None,
            RequirementType::TopLevel,
            &req("setuptools"),
            &Version::parse("59.0").unwrap(),
            "setuptools-59.0.tar.gz",
            false,
        )
        .unwrap();

        let boot = bootstrapper(sample_index()).with_prev_graph(prev);
        let (url, version) = boot.resolve_and_add_top_level(&req("setuptools")).unwrap();
        assert_eq!(version, Version::parse("59.0").unwrap());
        assert_eq!(url, "setuptools-59.0.tar.gz");

        // the previous version no longer fits, so the index decides
        let (_, version) = boot
            .resolve_and_add_top_level(&req("setuptools>=60"))
            .unwrap();
        assert_eq!(version, Version::parse("70.0").unwrap());
    }

    #[test]
    fn test_prev_graph_pre_release_needs_opt_in() {
        let prev = DependencyGraph::new();
        prev.add_dependency(
            None,
            RequirementType::TopLevel,
            &req("setuptools"),
            &Version::parse("71.0rc1").unwrap(),
            "setuptools-71.0rc1.tar.gz",
            false,
        )
        .unwrap();
        let prev = DependencyGraph::from_json(&prev.to_json().unwrap()).unwrap();

        let boot = bootstrapper(sample_index()).with_prev_graph(prev);
        let (_, version) = boot.resolve_and_add_top_level(&req("setuptools")).unwrap();
        assert_eq!(version, Version::parse("70.0").unwrap());

        // naming a pre-release in the requirement opts in
        let (url, version) = boot
            .resolve_and_add_top_level(&req("setuptools>=71.0rc1"))
            .unwrap();
        assert_eq!(version, Version::parse("71.0rc1").unwrap());
        assert_eq!(url, "setuptools-71.0rc1.tar.gz");
    }

    #[test]
    fn test_prev_graph_pre_release_with_resolver_opt_in() {
        let prev = DependencyGraph::new();
        prev.add_dependency(
            None,
            RequirementType::TopLevel,
            &req("setuptools"),
            &Version::parse("71.0rc1").unwrap(),
            "setuptools-71.0rc1.tar.gz",
            false,
        )
        .unwrap();

        let index = Arc::new(sample_index());
        let boot = Bootstrapper::new(
            Resolver::new(Version::parse("3.12").unwrap()).with_allow_prereleases(true),
            index.clone(),
            index,
        )
        .with_prev_graph(prev);
        let (_, version) = boot.resolve_and_add_top_level(&req("setuptools")).unwrap();
        assert_eq!(version, Version::parse("71.0rc1").unwrap());
    }

    #[test]
    fn test_constraints_apply_during_bootstrap() {
        let mut constraints = Constraints::new();
        constraints.add_constraint("setuptools<60").unwrap();
        let boot = bootstrapper(sample_index())
            .with_constraints(constraints)
            .with_sdist_only(true);

        let report = boot.bootstrap(&[req("app")]).unwrap();
        // app's own setuptools requirement fits 59.0, lib's needs >=60
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].parent, Some(key("lib==2.5")));
        assert!(boot.graph().get_node(&key("setuptools==59.0")).is_some());
    }
}
