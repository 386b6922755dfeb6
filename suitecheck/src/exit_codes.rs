//! Stable exit codes for the suitecheck CLI.

/// Every selected case passed.
pub const OK: i32 = 0;
/// At least one case failed or diverged from the baseline.
pub const FAILED: i32 = 1;
/// Invalid config or registry, unknown section, or another fatal error.
pub const INVALID: i32 = 2;
