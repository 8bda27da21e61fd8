//! Configuration validation with helpful error messages

use anyhow::{bail, Context, Result};

use super::Settings;
use crate::error::hints;
use crate::requirements::Requirement;
use crate::version::Version;

/// Validate every field of the settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_python_version(&settings.python_version)?;

    if settings.jobs == 0 {
        bail!("jobs must be at least 1");
    }

    for spec in &settings.constraints {
        Requirement::parse(spec)
            .with_context(|| format!("Invalid entry in constraints: '{}'", spec))?;
    }

    for name in &settings.pre_built {
        validate_package_name(name)
            .with_context(|| format!("Invalid entry in pre_built: '{}'", name))?;
    }

    Ok(())
}

fn validate_python_version(version: &str) -> Result<()> {
    Version::parse(version).with_context(|| {
        format!(
            "Invalid python_version '{}'\n{}",
            version,
            hints::version_syntax()
        )
    })?;
    Ok(())
}

/// A bare package name: no specifier, extras or marker
fn validate_package_name(name: &str) -> Result<()> {
    let req = Requirement::parse(name)?;
    if req.name() != name.trim()
        || !req.specifier().is_empty()
        || !req.extras().is_empty()
        || req.marker().is_some()
    {
        bail!("expected a bare package name like 'torch' or 'PyYAML'");
    }
    Ok(())
}
