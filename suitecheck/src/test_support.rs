//! Test-only helpers for result files, registry sections, and scripted runners.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};

use crate::core::suite::{Section, Suite, TestCase};
use crate::io::store::{BaselineStore, StorePaths};
use crate::io::test_runner::{Observation, TestRunner};

/// Store whose files live directly in `dir` (`expected_results`, `failed_results`).
pub fn store_in(dir: &Path) -> BaselineStore {
    BaselineStore::new(StorePaths {
        result_file: dir.join("expected_results"),
        failed_file: dir.join("failed_results"),
    })
}

/// Write `lines`, each terminated by `\n`.
pub fn write_lines(path: &Path, lines: &[&str]) {
    let mut buf = String::new();
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    fs::write(path, buf).expect("write lines");
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("read lines")
        .lines()
        .map(str::to_string)
        .collect()
}

/// Registry section running `true`, with optional cases.
pub fn section(name: &str, suite: Suite, cases: &[&str]) -> Section {
    let command = if cases.is_empty() {
        vec!["true".to_string()]
    } else {
        vec!["cat".to_string(), "{case}".to_string()]
    };
    Section {
        name: name.to_string(),
        suite,
        command,
        cases: cases.iter().map(|case| case.to_string()).collect(),
        workdir: None,
    }
}

/// Runner that answers from a fixed table keyed by case key.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    observations: BTreeMap<String, Observation>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, exit_code: Option<i32>, stdout_sha256: &str) -> Self {
        self.observations.insert(
            key.to_string(),
            Observation {
                exit_code,
                timed_out: false,
                stdout_sha256: stdout_sha256.to_string(),
                stderr: String::new(),
            },
        );
        self
    }
}

impl TestRunner for ScriptedRunner {
    fn run(&self, case: &TestCase) -> Result<Observation> {
        self.observations
            .get(&case.key)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted observation for {}", case.key))
    }
}
