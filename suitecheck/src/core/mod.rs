//! Pure, deterministic logic: record model, merging, verdicts, case planning.
//!
//! Nothing in this module touches the filesystem or spawns processes.

pub mod merge;
pub mod record;
pub mod suite;
pub mod verdict;
