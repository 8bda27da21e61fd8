//! Memoized interpreter compatibility checks
//!
//! Binary artifacts declare which interpreters they support with a
//! `requires_python` specifier such as `>=3.8,<4`. The answer depends only on
//! the specifier text and the target interpreter version, which is fixed for a
//! matcher, so results are cached for the matcher's lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::trace;

use crate::error::Result;
use crate::specifier::SpecifierSet;
use crate::version::Version;

/// Cache statistics, reset by [`PythonVersionMatcher::cache_clear`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheInfo {
    pub hits: u64,
    pub misses: u64,
    /// Number of cached specifiers
    pub size: usize,
}

/// Thread-safe, memoized `requires_python` predicate for one interpreter version
#[derive(Debug)]
pub struct PythonVersionMatcher {
    python_version: Version,
    cache: RwLock<HashMap<String, bool>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PythonVersionMatcher {
    pub fn new(python_version: Version) -> Self {
        Self {
            python_version,
            cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Interpreter version the matcher answers for
    pub fn python_version(&self) -> &Version {
        &self.python_version
    }

    /// True if the interpreter satisfies `spec`
    ///
    /// Malformed specifiers are not cached and fail with a parse error.
    pub fn match_py_req(&self, spec: &str) -> Result<bool> {
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(spec)
            .copied();
        if let Some(matched) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(spec, matched, "requires-python cache hit");
            return Ok(matched);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let matched = SpecifierSet::parse(spec)?.contains(&self.python_version);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(spec.to_string(), matched);
        Ok(matched)
    }

    /// Drop every cached answer and reset the statistics
    pub fn cache_clear(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn cache_info(&self) -> CacheInfo {
        CacheInfo {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.cache.read().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }
}
