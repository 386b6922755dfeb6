//! Tool configuration stored in `suitecheck.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::io::store::StorePaths;

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "suitecheck.toml";

/// Suitecheck configuration (TOML).
///
/// Every field is optional. Relative paths are resolved against the
/// directory containing the config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Baseline of accepted results.
    pub result_file: PathBuf,

    /// Failures observed in the most recent run.
    pub failed_file: PathBuf,

    /// Suite registry (`[[section]]` entries).
    pub registry_file: PathBuf,

    /// Per-case wall-clock budget in seconds.
    pub case_timeout_secs: u64,

    /// Keep at most this many bytes of each case's stderr in memory.
    pub output_limit_bytes: usize,

    pub unittests: UnittestsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UnittestsConfig {
    /// Command backing the `unittests` suite (e.g. `["cargo","test"]`).
    pub command: Vec<String>,
}

impl Default for UnittestsConfig {
    fn default() -> Self {
        Self {
            command: vec!["cargo".to_string(), "test".to_string()],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            result_file: PathBuf::from("tests/results/expected_results"),
            failed_file: PathBuf::from("tests/results/failed_results"),
            registry_file: PathBuf::from("testsuites.toml"),
            case_timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
            unittests: UnittestsConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.case_timeout_secs == 0 {
            return Err(anyhow!("case_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.unittests.command.is_empty() || self.unittests.command[0].trim().is_empty() {
            return Err(anyhow!("unittests.command must be a non-empty array"));
        }
        if self.result_file.as_os_str().is_empty() {
            return Err(anyhow!("result_file must be non-empty"));
        }
        if self.failed_file.as_os_str().is_empty() {
            return Err(anyhow!("failed_file must be non-empty"));
        }
        if self.result_file == self.failed_file {
            return Err(anyhow!("result_file and failed_file must differ"));
        }
        Ok(())
    }

    pub fn case_timeout(&self) -> Duration {
        Duration::from_secs(self.case_timeout_secs)
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths {
            result_file: self.result_file.clone(),
            failed_file: self.failed_file.clone(),
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.result_file,
            &mut self.failed_file,
            &mut self.registry_file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `Config::default()` resolved against the
/// file's directory.
pub fn load_config(path: &Path) -> Result<Config> {
    let base = config_base_dir(path);
    let mut cfg = if path.exists() {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?
    } else {
        Config::default()
    };
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    cfg.resolve_paths(&base);
    Ok(cfg)
}

fn config_base_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
