//! Error types and helpers for user-friendly error messages
//!
//! Every failure the resolution core can produce is a variant of [`Error`].
//! Variants carry the structured context needed to diagnose the failure and an
//! optional hint that the CLI prints underneath the error.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the resolution core
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a candidate artifact was rejected during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Artifact kind disabled by `include_sdists` / `include_wheels`
    KindDisabled,
    /// Version does not satisfy the requirement's specifier
    VersionMismatch,
    /// Version does not satisfy the registered constraint
    ConstraintMismatch,
    /// Pre-release not allowed for this requirement
    PreRelease,
    /// Release was yanked from the index
    Yanked,
    /// Binary artifact incompatible with the target interpreter
    InterpreterIncompatible,
}

impl RejectReason {
    fn label(self) -> &'static str {
        match self {
            RejectReason::KindDisabled => "artifact kind disabled",
            RejectReason::VersionMismatch => "version mismatch",
            RejectReason::ConstraintMismatch => "constraint mismatch",
            RejectReason::PreRelease => "pre-release",
            RejectReason::Yanked => "yanked",
            RejectReason::InterpreterIncompatible => "interpreter incompatible",
        }
    }
}

/// Per-reason counts of rejected candidates for one resolution attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionSummary {
    /// Number of candidates returned by the index
    pub considered: usize,
    pub kind_disabled: usize,
    pub version_mismatch: usize,
    pub constraint_mismatch: usize,
    pub prerelease: usize,
    pub yanked: usize,
    pub interpreter_incompatible: usize,
}

impl RejectionSummary {
    /// Record one rejection
    pub fn record(&mut self, reason: RejectReason) {
        let slot = match reason {
            RejectReason::KindDisabled => &mut self.kind_disabled,
            RejectReason::VersionMismatch => &mut self.version_mismatch,
            RejectReason::ConstraintMismatch => &mut self.constraint_mismatch,
            RejectReason::PreRelease => &mut self.prerelease,
            RejectReason::Yanked => &mut self.yanked,
            RejectReason::InterpreterIncompatible => &mut self.interpreter_incompatible,
        };
        *slot += 1;
    }

    /// Total number of rejected candidates
    pub fn rejected(&self) -> usize {
        self.kind_disabled
            + self.version_mismatch
            + self.constraint_mismatch
            + self.prerelease
            + self.yanked
            + self.interpreter_incompatible
    }

    fn counts(&self) -> [(RejectReason, usize); 6] {
        [
            (RejectReason::KindDisabled, self.kind_disabled),
            (RejectReason::VersionMismatch, self.version_mismatch),
            (RejectReason::ConstraintMismatch, self.constraint_mismatch),
            (RejectReason::PreRelease, self.prerelease),
            (RejectReason::Yanked, self.yanked),
            (RejectReason::InterpreterIncompatible, self.interpreter_incompatible),
        ]
    }
}

impl fmt::Display for RejectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.considered == 0 {
            return write!(f, "no candidates available");
        }
        write!(f, "{} candidates considered", self.considered)?;
        for (reason, count) in self.counts() {
            if count > 0 {
                write!(f, ", {} {}", count, reason.label())?;
            }
        }
        Ok(())
    }
}

/// Errors produced by the resolution core
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed requirement, constraint, specifier or version text
    #[error("Parse error in '{input}': {message}")]
    Parse {
        input: String,
        message: String,
        hint: Option<String>,
    },

    /// No candidate survived the filters, or the index collaborator failed
    #[error("Could not resolve '{requirement}': {message}")]
    Resolution {
        requirement: String,
        message: String,
        summary: RejectionSummary,
        #[source]
        source: Option<anyhow::Error>,
        hint: Option<String>,
    },

    /// Dependency edges form at least one cycle
    #[error("Dependency cycle detected between: {}", members.join(", "))]
    Cycle { members: Vec<String> },

    /// Lookup against a node key that is not in the graph
    #[error("Node '{key}' not found in dependency graph")]
    NotFound { key: String },

    /// Misuse of the online sorter or worker pool
    #[error("Scheduling error: {message}")]
    Scheduling { message: String },

    /// Reading or writing persisted state failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted state is not valid JSON for the expected shape
    #[error("Invalid serialized data: {source}")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Create a parse error
    pub fn parse(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Create a parse error with hint
    pub fn parse_with_hint(
        input: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::Parse {
            input: input.into(),
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Create a resolution error carrying the rejection summary
    pub fn no_candidate(requirement: impl Into<String>, summary: RejectionSummary) -> Self {
        Self::Resolution {
            requirement: requirement.into(),
            message: format!("no matching version ({})", summary),
            summary,
            source: None,
            hint: Some(hints::resolution().to_string()),
        }
    }

    /// Create a resolution error for a collaborator failure
    pub fn collaborator_failed(
        requirement: impl Into<String>,
        message: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Self::Resolution {
            requirement: requirement.into(),
            message: message.into(),
            summary: RejectionSummary::default(),
            source: Some(source),
            hint: None,
        }
    }

    /// Create a cycle error; members are sorted for stable reporting
    pub fn cycle(mut members: Vec<String>) -> Self {
        members.sort();
        members.dedup();
        Self::Cycle { members }
    }

    /// Create a not-found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a scheduling error
    pub fn scheduling(message: impl Into<String>) -> Self {
        Self::Scheduling {
            message: message.into(),
        }
    }

    /// Create an I/O error for a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Hint attached to this error, if any
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::Parse { hint, .. } | Error::Resolution { hint, .. } => hint.as_deref(),
            Error::Cycle { .. } => Some(hints::cycle()),
            Error::NotFound { .. } => Some(hints::graph_integrity()),
            Error::Scheduling { .. } | Error::Io { .. } | Error::Serialization { .. } => None,
        }
    }

    /// Display error with formatting and hints
    pub fn display_with_hints(&self) {
        use console::style;

        eprintln!("\n{} {}", style("ERROR:").red().bold(), self);

        if let Some(h) = self.hint() {
            eprintln!("\n{} {}", style("HINT:").yellow().bold(), h);
        }

        if let Error::Cycle { members } = self {
            eprintln!("\n{}", style("CYCLE MEMBERS:").cyan().bold());
            for member in members {
                eprintln!("  • {}", member);
            }
        }

        eprintln!();
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Serialization { source }
    }
}

/// Common error hints
pub mod hints {
    /// Get hint for resolution failures
    pub fn resolution() -> &'static str {
        "No release satisfied every filter. Try:\n\
         • Loosening the requirement or the matching constraint\n\
         • Enabling source or binary artifacts (sdist_only / pre_built)\n\
         • Checking python_version against the package's requires-python"
    }

    /// Get hint for cycle errors
    pub fn cycle() -> &'static str {
        "The packages above depend on each other and cannot be ordered.\n\
         Break the cycle by removing or pre-building one of its members."
    }

    /// Get hint for graph integrity failures
    pub fn graph_integrity() -> &'static str {
        "Edges must name a parent that already exists in the graph.\n\
         If this came from a persisted graph, regenerate it with `wheelwright bootstrap`."
    }

    /// Get hint for bad version text
    pub fn version_syntax() -> &'static str {
        "Versions follow PEP 440, e.g. '1.2.3', '2.0rc1', '1.0.post2', '1!2.0'"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display_lists_only_nonzero_reasons() {
        let mut summary = RejectionSummary {
            considered: 4,
            ..Default::default()
        };
        summary.record(RejectReason::VersionMismatch);
        summary.record(RejectReason::VersionMismatch);
        summary.record(RejectReason::ConstraintMismatch);

        let text = summary.to_string();
        assert_eq!(
            text,
            "4 candidates considered, 2 version mismatch, 1 constraint mismatch"
        );
        assert_eq!(summary.rejected(), 3);
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(RejectionSummary::default().to_string(), "no candidates available");
    }

    #[test]
    fn test_cycle_members_sorted() {
        let err = Error::cycle(vec!["b==1.0".into(), "a==1.0".into(), "b==1.0".into()]);
        match &err {
            Error::Cycle { members } => assert_eq!(members, &["a==1.0", "b==1.0"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("a==1.0, b==1.0"));
    }

    #[test]
    fn test_resolution_error_mentions_summary() {
        let summary = RejectionSummary {
            considered: 1,
            yanked: 1,
            ..Default::default()
        };
        let err = Error::no_candidate("foo>=1", summary);
        let text = err.to_string();
        assert!(text.contains("foo>=1"));
        assert!(text.contains("1 yanked"));
        assert!(err.hint().is_some());
    }
}
