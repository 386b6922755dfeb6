//! Test execution adapter.
//!
//! The coordinator only sees [`TestRunner`]; [`ProcessTestRunner`] is the
//! production implementation that runs each case's command as a child process.

use std::process::Command;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, instrument};

use crate::core::record::{Record, SEPARATOR};
use crate::core::suite::TestCase;
use crate::io::process::run_command_with_timeout;

/// What a single case execution produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Hex SHA-256 of the case's full stdout.
    pub stdout_sha256: String,
    /// Captured stderr (bounded), shown for failing cases.
    pub stderr: String,
}

impl Observation {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Payload recorded in baseline and failure files: `<status> : <sha256>`.
    pub fn payload(&self) -> String {
        let status = if self.timed_out {
            "timeout".to_string()
        } else {
            match self.exit_code {
                Some(code) => format!("exit {code}"),
                None => "signal".to_string(),
            }
        };
        format!("{status}{SEPARATOR}{}", self.stdout_sha256)
    }

    pub fn record(&self, key: &str) -> Record {
        Record::new(key, &self.payload())
    }
}

pub trait TestRunner {
    fn run(&self, case: &TestCase) -> Result<Observation>;
}

/// Runs each case's command with a timeout and bounded output capture.
#[derive(Debug, Clone)]
pub struct ProcessTestRunner {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl TestRunner for ProcessTestRunner {
    #[instrument(skip_all, fields(key = %case.key))]
    fn run(&self, case: &TestCase) -> Result<Observation> {
        let Some((program, args)) = case.command.split_first() else {
            bail!("case {} has an empty command", case.key);
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(workdir) = &case.workdir {
            cmd.current_dir(workdir);
        }

        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)?;
        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        stderr.push_str(&output.stderr_truncated_notice(&case.key));

        let observation = Observation {
            exit_code: output.status.code(),
            timed_out: output.timed_out,
            stdout_sha256: output.stdout_sha256,
            stderr,
        };
        debug!(payload = %observation.payload(), "case observed");
        Ok(observation)
    }
}
