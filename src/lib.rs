//! msbuild-task - run MSBuild as a stage in a file pipeline
//!
//! This crate locates an MSBuild executable for the host, turns a
//! [`BuildConfiguration`] into a command line, runs it against a project
//! file and reports exactly one outcome per build.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

pub use builder::{CommandBuilder, MsBuildFinder, MsBuildRunner, ResolvedCommand};
pub use self::core::{Architecture, BuildConfiguration, BuildError, FileRecord};
pub use ops::BuildStage;
