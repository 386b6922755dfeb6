//! Suite registry loaded from `testsuites.toml`.
//!
//! The registry is a list of `[[section]]` tables. See [`Section`] for fields.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use crate::core::record::SEPARATOR;
use crate::core::suite::{CASE_PLACEHOLDER, Section, Suite};

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Registry {
    #[serde(default, rename = "section")]
    pub sections: Vec<Section>,
}

impl Registry {
    /// Load and validate a registry. Section workdirs are resolved against
    /// the registry file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read registry {}", path.display()))?;
        let mut registry = Self::parse_str(&contents)
            .with_context(|| format!("load registry {}", path.display()))?;
        if let Some(base) = path.parent() {
            for section in &mut registry.sections {
                if let Some(workdir) = &section.workdir
                    && workdir.is_relative()
                {
                    section.workdir = Some(base.join(workdir));
                }
            }
        }
        debug!(sections = registry.sections.len(), "registry loaded");
        Ok(registry)
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        let registry: Registry = toml::from_str(contents).context("parse registry")?;
        registry.validate()?;
        Ok(registry)
    }

    fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for (index, section) in self.sections.iter().enumerate() {
            validate_section(section).with_context(|| format!("section[{}] invalid", index))?;
            if !names.insert(section.name.as_str()) {
                bail!("duplicate section name {}", section.name);
            }
        }
        Ok(())
    }
}

fn validate_section(section: &Section) -> Result<()> {
    validate_fragment("name", &section.name)?;
    if section.name.contains('/') {
        bail!("name must not contain '/'");
    }
    if section.suite == Suite::Unittests {
        bail!("suite must be one of builtin, regular, cron, custom");
    }
    if section.command.is_empty() || section.command[0].trim().is_empty() {
        bail!("command must be a non-empty array");
    }
    if section.cases.is_empty() {
        return Ok(());
    }
    if !section
        .command
        .iter()
        .any(|arg| arg.contains(CASE_PLACEHOLDER))
    {
        bail!("command must use {} when cases are listed", CASE_PLACEHOLDER);
    }
    for case in &section.cases {
        validate_fragment("case", case)?;
    }
    Ok(())
}

/// Names end up in record keys, so they may not break the line format.
fn validate_fragment(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{} must be non-empty", label);
    }
    if value.trim() != value {
        bail!("{} {:?} must not have surrounding whitespace", label, value);
    }
    if value.contains(SEPARATOR) {
        bail!("{} {:?} must not contain {:?}", label, value, SEPARATOR);
    }
    if value.contains('\n') || value.contains('\r') {
        bail!("{} {:?} must be a single line", label, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_registry() {
        let input = r#"
[[section]]
name = "indent"
suite = "builtin"
command = ["fmt", "--stdout", "{case}"]
cases = ["a.f90", "b.f90"]

[[section]]
name = "nightly"
suite = "cron"
command = ["./nightly.sh"]
workdir = "scripts"
"#;
        let registry = Registry::parse_str(input).expect("registry parses");
        assert_eq!(registry.sections.len(), 2);
        assert_eq!(registry.sections[0].suite, Suite::Builtin);
        assert_eq!(registry.sections[1].cases, Vec::<String>::new());
    }

    #[test]
    fn empty_registry_is_valid() {
        let registry = Registry::parse_str("").expect("empty registry");
        assert!(registry.sections.is_empty());
    }

    #[test]
    fn rejects_duplicate_names() {
        let input = r#"
[[section]]
name = "a"
suite = "builtin"
command = ["true"]

[[section]]
name = "a"
suite = "regular"
command = ["true"]
"#;
        let err = Registry::parse_str(input).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate section name a"));
    }

    #[test]
    fn rejects_separator_in_case() {
        let input = r#"
[[section]]
name = "a"
suite = "builtin"
command = ["cat", "{case}"]
cases = ["x : y"]
"#;
        let err = Registry::parse_str(input).expect_err("separator");
        assert!(format!("{err:#}").contains("must not contain"));
    }

    #[test]
    fn rejects_cases_without_placeholder() {
        let input = r#"
[[section]]
name = "a"
suite = "custom"
command = ["true"]
cases = ["one"]
"#;
        let err = Registry::parse_str(input).expect_err("placeholder");
        assert!(format!("{err:#}").contains("{case}"));
    }

    #[test]
    fn rejects_unittests_section() {
        let input = r#"
[[section]]
name = "a"
suite = "unittests"
command = ["true"]
"#;
        let _err = Registry::parse_str(input).expect_err("unittests section");
    }

    #[test]
    fn load_resolves_workdir_against_registry_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("testsuites.toml");
        fs::write(
            &path,
            "[[section]]\nname = \"a\"\nsuite = \"builtin\"\ncommand = [\"true\"]\nworkdir = \"w\"\n",
        )
        .expect("write");
        let registry = Registry::load(&path).expect("load");
        assert_eq!(registry.sections[0].workdir, Some(temp.path().join("w")));
    }
}
