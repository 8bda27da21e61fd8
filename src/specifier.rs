//! Version specifier parsing and matching
//!
//! A specifier set is a comma-separated list of clauses that must all hold:
//! - Ordered: ">=1.0", "<2.0", "<=1.5", ">1.0"
//! - Exact: "==1.2.3", "!=1.2.3"
//! - Prefix: "==1.2.*", "!=1.*"
//! - Compatible release: "~=1.4.2" (>=1.4.2, ==1.4.*)
//! - Arbitrary equality: "===1.0-custom"

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::version::Version;

fn clause_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(~=|===|==|!=|<=|>=|<|>)\s*([^\s,;]+)\s*$")
            .unwrap_or_else(|e| panic!("invalid specifier regex: {e}"))
    })
}

/// Comparison operator of a single clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Compatible,  // ~=
    Equal,       // ==
    NotEqual,    // !=
    LessEq,      // <=
    GreaterEq,   // >=
    Less,        // <
    Greater,     // >
    Arbitrary,   // ===
}

impl Operator {
    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "~=" => Operator::Compatible,
            "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            "<=" => Operator::LessEq,
            ">=" => Operator::GreaterEq,
            "<" => Operator::Less,
            ">" => Operator::Greater,
            "===" => Operator::Arbitrary,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Compatible => "~=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessEq => "<=",
            Operator::GreaterEq => ">=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::Arbitrary => "===",
        }
    }
}

/// A single version clause, e.g. ">=1.20"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specifier {
    op: Operator,
    /// Version text as written (including any ".*" suffix)
    text: String,
    /// Parsed version; `None` only for `===` against non-PEP 440 text
    version: Option<Version>,
    wildcard: bool,
}

impl Specifier {
    /// Parse a single clause (no commas)
    pub fn parse(s: &str) -> Result<Self> {
        let caps = clause_regex()
            .captures(s)
            .ok_or_else(|| Error::parse(s, "expected an operator followed by a version"))?;

        let op = Operator::from_symbol(&caps[1])
            .ok_or_else(|| Error::parse(s, format!("unknown operator '{}'", &caps[1])))?;
        let text = caps[2].to_string();

        if op == Operator::Arbitrary {
            return Ok(Specifier {
                op,
                version: Version::parse(&text).ok(),
                text,
                wildcard: false,
            });
        }

        let (version_text, wildcard) = match text.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (text.as_str(), false),
        };

        if wildcard && !matches!(op, Operator::Equal | Operator::NotEqual) {
            return Err(Error::parse(s, "'.*' is only allowed with == and !="));
        }

        let version = Version::parse(version_text)?;

        if wildcard
            && (version.pre().is_some() || version.post().is_some() || version.dev().is_some())
        {
            return Err(Error::parse(s, "prefix match must name a plain release"));
        }

        let ordered = !matches!(op, Operator::Equal | Operator::NotEqual);
        if ordered && !version.local().is_empty() {
            return Err(Error::parse(
                s,
                "local versions are only allowed with == and !=",
            ));
        }

        if op == Operator::Compatible && version.release().len() < 2 {
            return Err(Error::parse(
                s,
                "~= requires at least two release segments",
            ));
        }

        Ok(Specifier {
            op,
            text,
            version: Some(version),
            wildcard,
        })
    }

    pub fn operator(&self) -> Operator {
        self.op
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// True if this clause explicitly names a pre-release
    pub fn allows_prereleases(&self) -> bool {
        self.op != Operator::NotEqual
            && self.version.as_ref().is_some_and(Version::is_prerelease)
    }

    /// Check if a version satisfies this clause
    pub fn contains(&self, candidate: &Version) -> bool {
        let Some(spec) = self.version.as_ref() else {
            return self.matches_arbitrary(candidate);
        };

        match self.op {
            Operator::Equal if self.wildcard => matches_prefix(candidate, spec),
            Operator::Equal => matches_exact(candidate, spec),
            Operator::NotEqual if self.wildcard => !matches_prefix(candidate, spec),
            Operator::NotEqual => !matches_exact(candidate, spec),
            Operator::LessEq => candidate.public() <= *spec,
            Operator::GreaterEq => candidate.public() >= *spec,
            Operator::Less => matches_less(candidate, spec),
            Operator::Greater => matches_greater(candidate, spec),
            Operator::Compatible => matches_compatible(candidate, spec),
            Operator::Arbitrary => self.matches_arbitrary(candidate),
        }
    }

    fn matches_arbitrary(&self, candidate: &Version) -> bool {
        candidate.to_string().eq_ignore_ascii_case(&self.text)
    }
}

/// ==V: local labels on the candidate are ignored unless V has one
fn matches_exact(candidate: &Version, spec: &Version) -> bool {
    if spec.local().is_empty() {
        candidate.public() == *spec
    } else {
        candidate == spec
    }
}

/// ==V.*: epoch must match and the zero-padded release must start with V
fn matches_prefix(candidate: &Version, spec: &Version) -> bool {
    release_starts_with(candidate, spec.epoch(), spec.release())
}

fn release_starts_with(candidate: &Version, epoch: u64, prefix: &[u64]) -> bool {
    if candidate.epoch() != epoch {
        return false;
    }
    let release = candidate.release();
    prefix
        .iter()
        .enumerate()
        .all(|(i, &n)| release.get(i).copied().unwrap_or(0) == n)
}

/// <V excludes pre-releases of V's own release unless V is itself a pre-release
fn matches_less(candidate: &Version, spec: &Version) -> bool {
    if candidate.public().cmp(spec) != Ordering::Less {
        return false;
    }
    if !spec.is_prerelease()
        && candidate.is_prerelease()
        && candidate.base_version() == spec.base_version()
    {
        return false;
    }
    true
}

/// >V excludes post-releases and local variants of V's own release
fn matches_greater(candidate: &Version, spec: &Version) -> bool {
    if candidate.public().cmp(spec) != Ordering::Greater {
        return false;
    }
    let same_base = candidate.base_version() == spec.base_version();
    if !spec.is_postrelease() && candidate.is_postrelease() && same_base {
        return false;
    }
    if !candidate.local().is_empty() && same_base {
        return false;
    }
    true
}

/// ~=V.N is >=V.N together with ==V.*
fn matches_compatible(candidate: &Version, spec: &Version) -> bool {
    let release = spec.release();
    let prefix = &release[..release.len() - 1];
    candidate.public() >= *spec && release_starts_with(candidate, spec.epoch(), prefix)
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.text)
    }
}

impl FromStr for Specifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Specifier::parse(s)
    }
}

/// A set of clauses that must all be satisfied (AND logic)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SpecifierSet {
    specifiers: Vec<Specifier>,
}

impl SpecifierSet {
    /// Parse a comma-separated specifier string; empty text matches everything
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::default());
        }

        let specifiers = s
            .split(',')
            .map(|part| {
                if part.trim().is_empty() {
                    Err(Error::parse(s, "empty clause in specifier list"))
                } else {
                    Specifier::parse(part)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SpecifierSet { specifiers })
    }

    /// Check if a version satisfies every clause
    pub fn contains(&self, version: &Version) -> bool {
        self.specifiers.iter().all(|s| s.contains(version))
    }

    /// Add the clauses of `other` that are not already present
    pub fn intersect(&mut self, other: &SpecifierSet) {
        for spec in &other.specifiers {
            if !self.specifiers.contains(spec) {
                self.specifiers.push(spec.clone());
            }
        }
    }

    /// True if any clause explicitly names a pre-release
    pub fn allows_prereleases(&self) -> bool {
        self.specifiers.iter().any(Specifier::allows_prereleases)
    }

    /// True if some clause pins an exact version with `==` or `===`
    pub fn is_pinned(&self) -> bool {
        self.specifiers.iter().any(|s| {
            (s.op == Operator::Equal && !s.wildcard) || s.op == Operator::Arbitrary
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Specifier> {
        self.specifiers.iter()
    }

    pub fn len(&self) -> usize {
        self.specifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }
}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.specifiers.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for SpecifierSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SpecifierSet::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn set(s: &str) -> SpecifierSet {
        SpecifierSet::parse(s).unwrap()
    }

    #[test]
    fn test_range_specifier() {
        let req = set(">=1.20,<2.0");
        assert!(req.contains(&v("1.25.0")));
        assert!(req.contains(&v("1.20")));
        assert!(!req.contains(&v("2.0.0")));
        assert!(!req.contains(&v("1.19.9")));
        assert_eq!(req.to_string(), ">=1.20,<2.0");
    }

    #[test]
    fn test_exact_and_not_equal() {
        assert!(set("==1.2").contains(&v("1.2.0")));
        assert!(set("==1.2").contains(&v("1.2+local")));
        assert!(!set("==1.2+a").contains(&v("1.2+b")));
        assert!(!set("!=1.2").contains(&v("1.2.0")));
        assert!(set("!=1.2").contains(&v("1.2.1")));
    }

    #[test]
    fn test_wildcard() {
        let req = set("==1.2.*");
        assert!(req.contains(&v("1.2")));
        assert!(req.contains(&v("1.2.99")));
        assert!(req.contains(&v("1.2rc1")));
        assert!(!req.contains(&v("1.3.0")));

        let req = set("!=1.*");
        assert!(!req.contains(&v("1.9")));
        assert!(req.contains(&v("2.0")));
    }

    #[test]
    fn test_compatible_release() {
        let req = set("~=1.4.2");
        assert!(req.contains(&v("1.4.2")));
        assert!(req.contains(&v("1.4.9")));
        assert!(!req.contains(&v("1.5.0")));
        assert!(!req.contains(&v("1.4.1")));

        let req = set("~=2.2");
        assert!(req.contains(&v("2.9")));
        assert!(!req.contains(&v("3.0")));
    }

    #[test]
    fn test_exclusive_ordering_rules() {
        assert!(!set("<2.0").contains(&v("2.0rc1")));
        assert!(set("<2.0rc2").contains(&v("2.0rc1")));
        assert!(set("<2.0").contains(&v("1.9rc1")));

        assert!(!set(">1.0").contains(&v("1.0.post1")));
        assert!(set(">1.0.post1").contains(&v("1.0.post2")));
        assert!(!set(">1.0").contains(&v("1.0+local")));
        assert!(set(">1.0").contains(&v("1.0.1")));
    }

    #[test]
    fn test_arbitrary_equality() {
        let req = set("===1.0-custom");
        assert!(!req.contains(&v("1.0")));
        assert!(set("===1.0").contains(&v("1.0")));
    }

    #[test]
    fn test_empty_set_matches_everything() {
        let req = set("");
        assert!(req.is_empty());
        assert!(req.contains(&v("0.0.1")));
        assert!(req.contains(&v("99.0a1")));
    }

    #[test]
    fn test_parse_errors() {
        for bad in [">=", "1.0", ">=1.0,", "=>1.0", "~=1", ">=1.*", "<1.0+local", "==1.0a1.*"] {
            assert!(
                matches!(SpecifierSet::parse(bad), Err(Error::Parse { .. })),
                "{bad} should fail"
            );
        }
    }

    #[test]
    fn test_intersect_accumulates() {
        let mut req = set(">=1.0");
        req.intersect(&set("<2.0,>=1.0"));
        assert_eq!(req.len(), 2);
        assert!(req.contains(&v("1.5")));
        assert!(!req.contains(&v("2.5")));
    }

    #[test]
    fn test_prerelease_detection() {
        assert!(set(">=2.0b1").allows_prereleases());
        assert!(!set(">=2.0").allows_prereleases());
        assert!(!set("!=2.0b1").allows_prereleases());
        assert!(set("==1.0").is_pinned());
        assert!(!set("==1.*").is_pinned());
    }
}
