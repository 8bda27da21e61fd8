//! Requirement resolution
//!
//! Turns a requirement into one concrete artifact: the highest version offered
//! by the index that survives every filter.
//!
//! Filters, applied in order to each candidate artifact:
//! 1. artifact kind enabled (`include_sdists` / `include_wheels`)
//! 2. version satisfies the requirement's specifier
//! 3. version satisfies the registered constraint
//! 4. release not yanked, unless the requirement pins it with `==`
//! 5. binary artifacts only: `requires_python` accepts the target interpreter
//! 6. pre-releases only when allowed, or when nothing else is left
//!
//! Among equal versions a binary artifact wins over a source artifact;
//! otherwise the first artifact in index order is kept.

mod python;

pub use python::{CacheInfo, PythonVersionMatcher};

use tracing::debug;

use crate::constraints::Constraints;
use crate::error::{Error, RejectReason, RejectionSummary, Result};
use crate::registry::{ArtifactKind, Candidate, IndexLookup};
use crate::requirements::Requirement;
use crate::version::Version;

/// Picks a version and download location for requirements
#[derive(Debug)]
pub struct Resolver {
    matcher: PythonVersionMatcher,
    allow_prereleases: bool,
}

impl Resolver {
    /// Create a resolver targeting the given interpreter version
    pub fn new(python_version: Version) -> Self {
        Self {
            matcher: PythonVersionMatcher::new(python_version),
            allow_prereleases: false,
        }
    }

    /// Accept pre-releases for every package
    pub fn with_allow_prereleases(mut self, allow: bool) -> Self {
        self.allow_prereleases = allow;
        self
    }

    /// Whether pre-releases may be picked for `req` without falling back
    pub fn allows_prereleases(&self, req: &Requirement, constraints: &Constraints) -> bool {
        self.allow_prereleases
            || req.specifier().allows_prereleases()
            || constraints.allow_prerelease(req.canonical_name())
    }

    pub fn python_version(&self) -> &Version {
        self.matcher.python_version()
    }

    /// Memoized interpreter compatibility check
    pub fn match_py_req(&self, spec: &str) -> Result<bool> {
        self.matcher.match_py_req(spec)
    }

    /// Drop the interpreter compatibility cache
    pub fn cache_clear(&self) {
        self.matcher.cache_clear()
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.matcher.cache_info()
    }

    /// Resolve `req` to `(locator, version)`
    pub fn resolve(
        &self,
        req: &Requirement,
        index: &dyn IndexLookup,
        constraints: &Constraints,
        include_sdists: bool,
        include_wheels: bool,
    ) -> Result<(String, Version)> {
        let candidate =
            self.resolve_candidate(req, index, constraints, include_sdists, include_wheels)?;
        Ok((candidate.locator, candidate.version))
    }

    /// Resolve `req` to the chosen index artifact
    pub fn resolve_candidate(
        &self,
        req: &Requirement,
        index: &dyn IndexLookup,
        constraints: &Constraints,
        include_sdists: bool,
        include_wheels: bool,
    ) -> Result<Candidate> {
        let candidates = index.candidates(req.canonical_name()).map_err(|e| {
            Error::collaborator_failed(req.to_string(), "package index lookup failed", e)
        })?;

        let allow_pre = self.allows_prereleases(req, constraints);

        let mut summary = RejectionSummary {
            considered: candidates.len(),
            ..Default::default()
        };
        let mut finals = Vec::new();
        let mut pres = Vec::new();

        for candidate in candidates {
            if let Some(reason) =
                self.reject_reason(req, constraints, &candidate, include_sdists, include_wheels)
            {
                summary.record(reason);
                continue;
            }
            if candidate.version.is_prerelease() {
                pres.push(candidate);
            } else {
                finals.push(candidate);
            }
        }

        let pool = if allow_pre {
            finals.extend(pres);
            finals
        } else if finals.is_empty() && !pres.is_empty() {
            debug!(req = %req, "only pre-releases match, accepting them");
            pres
        } else {
            for _ in &pres {
                summary.record(RejectReason::PreRelease);
            }
            finals
        };

        let Some(chosen) = pick_best(pool) else {
            debug!(req = %req, %summary, "no candidate survived");
            return Err(Error::no_candidate(req.to_string(), summary));
        };

        debug!(
            req = %req,
            version = %chosen.version,
            kind = %chosen.kind,
            %summary,
            "resolved"
        );
        Ok(chosen)
    }

    fn reject_reason(
        &self,
        req: &Requirement,
        constraints: &Constraints,
        candidate: &Candidate,
        include_sdists: bool,
        include_wheels: bool,
    ) -> Option<RejectReason> {
        let enabled = match candidate.kind {
            ArtifactKind::Source => include_sdists,
            ArtifactKind::Binary => include_wheels,
        };
        if !enabled {
            return Some(RejectReason::KindDisabled);
        }
        if !req.matches(&candidate.version) {
            return Some(RejectReason::VersionMismatch);
        }
        if !constraints.is_satisfied_by(req.canonical_name(), &candidate.version) {
            return Some(RejectReason::ConstraintMismatch);
        }
        if candidate.yanked && !req.specifier().is_pinned() {
            return Some(RejectReason::Yanked);
        }
        if candidate.kind == ArtifactKind::Binary {
            if let Some(spec) = candidate.requires_python.as_deref() {
                match self.matcher.match_py_req(spec) {
                    Ok(true) => {}
                    Ok(false) => return Some(RejectReason::InterpreterIncompatible),
                    Err(e) => {
                        debug!(locator = %candidate.locator, error = %e, "unreadable requires-python");
                        return Some(RejectReason::InterpreterIncompatible);
                    }
                }
            }
        }
        None
    }
}

/// Highest version wins; binary beats source at the same version
fn pick_best(pool: Vec<Candidate>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for candidate in pool {
        let replace = match &best {
            None => true,
            Some(current) => {
                candidate.version > current.version
                    || (candidate.version == current.version
                        && candidate.kind == ArtifactKind::Binary
                        && current.kind == ArtifactKind::Source)
            }
        };
        if replace {
            best = Some(candidate);
        }
    }
    best
}
