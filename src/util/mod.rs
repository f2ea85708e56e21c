//! Shared utilities

pub mod config;
pub mod fs;
pub mod process;

pub use config::ConfigSources;
pub use process::ProcessBuilder;
