//! Core types: build configuration, file records and errors.

pub mod config;
pub mod errors;
pub mod file;

pub use config::{Architecture, BuildConfiguration};
pub use errors::{BuildError, ConfigError};
pub use file::FileRecord;
