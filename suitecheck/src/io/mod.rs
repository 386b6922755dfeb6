//! I/O helpers: configuration, registry, result files, process execution.

pub mod config;
pub mod process;
pub mod registry;
pub mod store;
pub mod test_runner;
