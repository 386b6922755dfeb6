//! Test-suite driver with a persisted baseline of known results.
//!
//! Each run executes the selected cases and compares what they produce with
//! the accepted results in the baseline file. Divergent cases are written to
//! a failure file; `--reset` merges that file back into the baseline.
//!
//! - **[`core`]**: Pure, deterministic logic (record format, merging, verdicts,
//!   case planning). No I/O.
//! - **[`io`]**: Side-effecting operations (config, registry, result files,
//!   process execution).
//!
//! [`run`] and [`reconcile`] coordinate core logic with I/O to implement the CLI.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod reconcile;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
