//! High-level operations.

pub mod msbuild_build;
pub mod msbuild_stage;

pub use msbuild_build::{build, BuildOptions, BuildResult};
pub use msbuild_stage::BuildStage;
