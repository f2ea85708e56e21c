//! MSBuild invocation.
//!
//! Data flows one way: the toolchain finder resolves an executable, the
//! command builder turns a configuration into arguments, and the runner
//! spawns the process and reports a single outcome.

pub mod command;
pub mod runner;
pub mod toolchain;

pub use command::{build_arguments, CommandBuilder, ResolvedCommand};
pub use runner::{
    BuildHandle, CollectSink, CompletionLatch, ExecutionOutcome, MsBuildRunner, OutputSink,
};
pub use toolchain::{MsBuildFinder, Resolution, ToolsVersion, ToolsVersionSelector};
