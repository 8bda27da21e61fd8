//! Requirement parsing and package name normalization
//!
//! A requirement names a package plus the versions acceptable for it:
//!
//! ```text
//! numpy>=1.20,<2.0
//! requests[socks] (>=2.25)
//! tomli>=1.1 ; python_version < "3.11"
//! ```
//!
//! Environment markers are kept verbatim but never evaluated here; the
//! embedding tool decides which requirements apply to the target environment.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::specifier::SpecifierSet;
use crate::version::Version;

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:[a-z0-9][a-z0-9._-]*[a-z0-9]|[a-z0-9])")
            .unwrap_or_else(|e| panic!("invalid name regex: {e}"))
    })
}

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[-_.]+").unwrap_or_else(|e| panic!("invalid separator regex: {e}"))
    })
}

/// Normalize a package name: lowercase, runs of `-`, `_`, `.` become one `-`
///
/// `Foo.Bar__baz` and `foo-bar-baz` name the same package.
pub fn canonicalize_name(name: &str) -> String {
    separator_regex()
        .replace_all(name.trim(), "-")
        .to_ascii_lowercase()
}

/// Why a requirement was added to the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementType {
    /// Supplied directly by the caller
    #[serde(rename = "toplevel")]
    TopLevel,
    /// Runtime dependency of the parent
    Install,
    /// Needed to build the parent from source
    Build,
    /// Needed on the build host (tools run during the build)
    Host,
}

impl RequirementType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequirementType::TopLevel => "toplevel",
            RequirementType::Install => "install",
            RequirementType::Build => "build",
            RequirementType::Host => "host",
        }
    }

    /// Whether the dependency is needed at install time of the parent
    pub fn is_install(self) -> bool {
        matches!(self, RequirementType::TopLevel | RequirementType::Install)
    }
}

impl fmt::Display for RequirementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "toplevel" | "top-level" => Ok(RequirementType::TopLevel),
            "install" => Ok(RequirementType::Install),
            "build" => Ok(RequirementType::Build),
            "host" => Ok(RequirementType::Host),
            _ => Err(Error::parse(s, "unknown requirement type")),
        }
    }
}

/// A parsed requirement, immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    name: String,
    canonical_name: String,
    extras: Vec<String>,
    specifier: SpecifierSet,
    marker: Option<String>,
}

impl Requirement {
    /// Parse a requirement line like `name[extra]>=1.0 ; marker`
    pub fn parse(s: &str) -> Result<Self> {
        let (body, marker) = match s.split_once(';') {
            Some((body, marker)) => {
                let marker = marker.trim();
                if marker.is_empty() {
                    return Err(Error::parse(s, "empty environment marker after ';'"));
                }
                (body.trim(), Some(marker.to_string()))
            }
            None => (s.trim(), None),
        };

        let name = name_regex()
            .find(body)
            .ok_or_else(|| Error::parse(s, "requirement must start with a package name"))?
            .as_str()
            .to_string();
        let mut rest = body[name.len()..].trim_start();

        let mut extras = Vec::new();
        if let Some(after) = rest.strip_prefix('[') {
            let (inner, tail) = after
                .split_once(']')
                .ok_or_else(|| Error::parse(s, "unclosed '[' in extras"))?;
            for extra in inner.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                if !name_regex().find(extra).is_some_and(|m| m.len() == extra.len()) {
                    return Err(Error::parse(s, format!("invalid extra '{}'", extra)));
                }
                extras.push(canonicalize_name(extra));
            }
            extras.sort();
            extras.dedup();
            rest = tail.trim_start();
        }

        if rest.starts_with('@') {
            return Err(Error::parse_with_hint(
                s,
                "direct URL references are not supported",
                "Publish the artifact to the package index and require it by version",
            ));
        }

        let spec_text = match rest.strip_prefix('(') {
            Some(inner) => inner
                .strip_suffix(')')
                .ok_or_else(|| Error::parse(s, "unclosed '(' around specifier"))?,
            None => rest,
        };
        let specifier = SpecifierSet::parse(spec_text).map_err(|e| match e {
            Error::Parse { message, .. } => Error::parse(s, message),
            other => other,
        })?;

        Ok(Requirement {
            canonical_name: canonicalize_name(&name),
            name,
            extras,
            specifier,
            marker,
        })
    }

    /// Name as written
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized name used for identity
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn extras(&self) -> &[String] {
        &self.extras
    }

    pub fn specifier(&self) -> &SpecifierSet {
        &self.specifier
    }

    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// Check if a version satisfies the requirement's specifier
    pub fn matches(&self, version: &Version) -> bool {
        self.specifier.contains(version)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        write!(f, "{}", self.specifier)?;
        if let Some(marker) = &self.marker {
            write!(f, "; {}", marker)?;
        }
        Ok(())
    }
}

impl FromStr for Requirement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Requirement::parse(s)
    }
}

/// Parse requirements-file text: one requirement per line, `#` starts a comment
pub fn parse_requirements_file(content: &str) -> Result<Vec<Requirement>> {
    let mut requirements = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        let req = Requirement::parse(line).map_err(|e| match e {
            Error::Parse { input, message, hint } => Error::Parse {
                input,
                message: format!("line {}: {}", index + 1, message),
                hint,
            },
            other => other,
        })?;
        requirements.push(req);
    }
    Ok(requirements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_name() {
        assert_eq!(canonicalize_name("Foo.Bar__baz"), "foo-bar-baz");
        assert_eq!(canonicalize_name("typing_extensions"), "typing-extensions");
        assert_eq!(canonicalize_name("PyYAML"), "pyyaml");
        assert_eq!(canonicalize_name("a-_-b"), "a-b");
    }

    #[test]
    fn test_parse_simple() {
        let req = Requirement::parse("numpy>=1.20,<2.0").unwrap();
        assert_eq!(req.name(), "numpy");
        assert_eq!(req.specifier().len(), 2);
        assert!(req.matches(&Version::parse("1.25.0").unwrap()));
        assert!(!req.matches(&Version::parse("2.0.0").unwrap()));
        assert_eq!(req.to_string(), "numpy>=1.20,<2.0");
    }

    #[test]
    fn test_parse_extras_parens_and_marker() {
        let req = Requirement::parse("Requests[socks, Security] (>=2.25) ; python_version < \"3.11\"")
            .unwrap();
        assert_eq!(req.name(), "Requests");
        assert_eq!(req.canonical_name(), "requests");
        assert_eq!(req.extras(), &["security", "socks"]);
        assert_eq!(req.marker(), Some("python_version < \"3.11\""));
        assert_eq!(
            req.to_string(),
            "Requests[security,socks]>=2.25; python_version < \"3.11\""
        );
    }

    #[test]
    fn test_display_reparses_identically() {
        for text in ["pkg0>=1.0", "a.b_c[x]==1.*", "tomli; python_version < \"3.11\"", "z"] {
            let req = Requirement::parse(text).unwrap();
            let again = Requirement::parse(&req.to_string()).unwrap();
            assert_eq!(req, again);
            assert_eq!(req.to_string(), again.to_string());
        }
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", ">=1.0", "foo>=", "foo[bar", "foo @ https://x/y.whl", "foo;", "foo (>=1"] {
            assert!(
                matches!(Requirement::parse(bad), Err(Error::Parse { .. })),
                "{bad:?} should fail"
            );
        }
    }

    #[test]
    fn test_requirement_type_roundtrip() {
        for kind in [
            RequirementType::TopLevel,
            RequirementType::Install,
            RequirementType::Build,
            RequirementType::Host,
        ] {
            assert_eq!(kind.as_str().parse::<RequirementType>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("runtime".parse::<RequirementType>().is_err());
    }

    #[test]
    fn test_requirements_file() {
        let content = "# pinned\nnumpy>=1.20\n\n  packaging>=24.0  # comment\n";
        let reqs = parse_requirements_file(content).unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].canonical_name(), "packaging");

        let err = parse_requirements_file("ok\n>=bad\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
