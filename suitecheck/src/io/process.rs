//! Helpers for running child processes with timeouts and bounded output.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use sha2::{Digest, Sha256};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
///
/// Stdout is only fingerprinted; stderr is kept (bounded) for display.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stderr: Vec<u8>,
    pub stderr_truncated: usize,
    /// Hex SHA-256 of the complete stdout stream.
    pub stdout_sha256: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. Stdout is hashed as it streams and never
/// stored. `output_limit_bytes` bounds the amount of stderr stored in memory (bytes beyond this
/// are discarded while still draining the pipe).
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!(program = ?cmd.get_program(), "spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, program = ?cmd.get_program(), "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {:?}", cmd.get_program()));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || hash_stream(stdout));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let stdout_sha256 = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stderr_truncated > 0 {
        warn!(stderr_truncated, "stderr truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stderr,
        stderr_truncated,
        stdout_sha256,
        timed_out,
    })
}

fn join_output<T>(handle: thread::JoinHandle<Result<T>>) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Drain a stream to EOF and return the hex SHA-256 of everything read.
fn hash_stream<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Drain a stream to EOF, keeping at most `limit` bytes. Returns the kept bytes and the number
/// of discarded bytes.
fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA-256 of the empty input.
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    /// SHA-256 of `out`.
    const OUT_SHA256: &str = "762069bc07a6e1b5df123a5ae7bd91c10daa04694fbaa17fba0cd6a8dcce8f22";

    #[test]
    fn read_limited_truncates() {
        let (bytes, truncated) = read_stream_limited(&b"hello world"[..], 5).expect("read");
        assert_eq!(bytes, b"hello");
        assert_eq!(truncated, 6);

        let (bytes, truncated) = read_stream_limited(&b"hello world"[..], 100).expect("read");
        assert_eq!(bytes, b"hello world");
        assert_eq!(truncated, 0);
    }

    #[test]
    fn hash_covers_whole_stream() {
        assert_eq!(hash_stream(&b""[..]).expect("hash"), EMPTY_SHA256);
        let large = vec![b'x'; 20_000];
        let mut expected = large.clone();
        expected.push(b'y');
        assert_ne!(
            hash_stream(large.as_slice()).expect("hash"),
            hash_stream(expected.as_slice()).expect("hash")
        );
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_status() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf out; printf err >&2; exit 3");
        let output =
            run_command_with_timeout(cmd, Duration::from_secs(10), 1000).expect("run command");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout_sha256, OUT_SHA256);
        assert_eq!(output.stderr, b"err");
        assert!(!output.timed_out);
        assert_eq!(output.stderr_truncated_notice("case"), "");
    }

    #[cfg(unix)]
    #[test]
    fn kills_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let output =
            run_command_with_timeout(cmd, Duration::from_millis(100), 1000).expect("run command");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }

    #[test]
    fn spawn_failure_is_error() {
        let cmd = Command::new("suitecheck-definitely-missing-binary");
        let err = run_command_with_timeout(cmd, Duration::from_secs(1), 10).expect_err("spawn");
        assert!(format!("{err:#}").contains("spawn"));
    }
}
