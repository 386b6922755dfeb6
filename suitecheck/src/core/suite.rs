//! Suite categories, registry sections, and case planning.
//!
//! Planning is deterministic: the same selection over the same registry
//! always yields the same cases in the same order.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::ValueEnum;
use serde::Deserialize;

/// Placeholder substituted with the case name in a section's command.
pub const CASE_PLACEHOLDER: &str = "{case}";

/// Suite category selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    /// The project's own unit tests, judged by exit status only.
    Unittests,
    Builtin,
    Regular,
    Cron,
    Custom,
}

impl Suite {
    pub fn as_str(self) -> &'static str {
        match self {
            Suite::Unittests => "unittests",
            Suite::Builtin => "builtin",
            Suite::Regular => "regular",
            Suite::Cron => "cron",
            Suite::Custom => "custom",
        }
    }

    /// Default selection when no suites are given.
    pub fn defaults() -> Vec<Suite> {
        vec![Suite::Unittests, Suite::Builtin]
    }
}

/// One registry section (`[[section]]` in `testsuites.toml`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Section {
    pub name: String,
    pub suite: Suite,
    pub command: Vec<String>,
    #[serde(default)]
    pub cases: Vec<String>,
    /// Working directory for the command. Resolved by the registry loader.
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

/// How a case's observation is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseKind {
    /// Pass/fail by exit status.
    ExitStatus,
    /// Compared against the baseline record with the same key.
    Baseline,
}

/// A concrete, runnable test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Record key; unique within one run.
    pub key: String,
    pub command: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub kind: CaseKind,
}

/// Which cases a run should execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A single registry section by name.
    Named(String),
    /// Every case of the given categories.
    Suites(Vec<Suite>),
}

impl Selection {
    /// Whether planning needs the registry file at all.
    pub fn needs_registry(&self) -> bool {
        match self {
            Selection::Named(_) => true,
            Selection::Suites(suites) => suites.iter().any(|suite| *suite != Suite::Unittests),
        }
    }
}

/// Expand a section into its cases.
pub fn section_cases(section: &Section) -> Vec<TestCase> {
    if section.cases.is_empty() {
        return vec![TestCase {
            key: section.name.clone(),
            command: section.command.clone(),
            workdir: section.workdir.clone(),
            kind: CaseKind::Baseline,
        }];
    }
    section
        .cases
        .iter()
        .map(|case| TestCase {
            key: format!("{}/{}", section.name, case),
            command: section
                .command
                .iter()
                .map(|arg| arg.replace(CASE_PLACEHOLDER, case))
                .collect(),
            workdir: section.workdir.clone(),
            kind: CaseKind::Baseline,
        })
        .collect()
}

/// Resolve a selection into concrete cases.
///
/// `unittests_command` backs the `unittests` category. Unknown section names
/// are configuration errors.
pub fn plan_cases(
    selection: &Selection,
    sections: &[Section],
    unittests_command: &[String],
) -> Result<Vec<TestCase>> {
    match selection {
        Selection::Named(name) => {
            let Some(section) = sections.iter().find(|section| &section.name == name) else {
                bail!("section {} not found in registry", name);
            };
            Ok(section_cases(section))
        }
        Selection::Suites(suites) => {
            let mut seen = BTreeSet::new();
            let mut cases = Vec::new();
            for suite in suites {
                if !seen.insert(*suite) {
                    continue;
                }
                if *suite == Suite::Unittests {
                    cases.push(TestCase {
                        key: Suite::Unittests.as_str().to_string(),
                        command: unittests_command.to_vec(),
                        workdir: None,
                        kind: CaseKind::ExitStatus,
                    });
                    continue;
                }
                for section in sections.iter().filter(|section| section.suite == *suite) {
                    cases.extend(section_cases(section));
                }
            }
            Ok(cases)
        }
    }
}
