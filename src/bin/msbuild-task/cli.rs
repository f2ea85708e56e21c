//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

use msbuild_task::builder::ToolsVersionSelector;
use msbuild_task::{Architecture, BuildConfiguration};

/// msbuild-task - build MSBuild projects and solutions
#[derive(Parser)]
#[command(name = "msbuild-task")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project or solution files to build, in order
    #[arg(required = true)]
    pub projects: Vec<PathBuf>,

    /// Config file layered over the global and project config
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Target to build (repeatable)
    #[arg(short, long = "target")]
    pub targets: Vec<String>,

    /// Build configuration (e.g. Debug, Release)
    #[arg(short, long)]
    pub configuration: Option<String>,

    /// MSBuild property as NAME=VALUE (repeatable)
    #[arg(short, long = "property", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    /// Tools version (e.g. 15.0, auto)
    #[arg(long, value_parser = parse_tools_version)]
    pub tools_version: Option<ToolsVersionSelector>,

    /// Architecture of the MSBuild to use (x86, x64)
    #[arg(long)]
    pub arch: Option<Architecture>,

    /// MSBuild verbosity level
    #[arg(long)]
    pub verbosity: Option<String>,

    /// Use this MSBuild executable instead of searching for one
    #[arg(long, env = "MSBUILD_PATH")]
    pub msbuild_path: Option<PathBuf>,

    /// Maximum number of concurrent MSBuild nodes (0 = one per core)
    #[arg(short = 'm', long, allow_negative_numbers = true)]
    pub max_cpu_count: Option<i32>,

    /// Fail when MSBuild fails instead of only logging it
    #[arg(long)]
    pub error_on_fail: bool,

    /// Log the MSBuild command line before running it
    #[arg(long)]
    pub log_command: bool,

    /// Show MSBuild's standard output
    #[arg(long)]
    pub stdout: bool,

    /// Directory holding published artifacts
    #[arg(long)]
    pub publish_dir: Option<PathBuf>,

    /// Print the files found in the publish directory after a build
    #[arg(long)]
    pub emit_published_files: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut BuildConfiguration) {
        if !self.targets.is_empty() {
            config.targets = self.targets.clone();
        }
        if let Some(configuration) = &self.configuration {
            config.configuration = Some(configuration.clone());
        }
        config.properties.extend(self.properties.iter().cloned());
        if let Some(tools_version) = &self.tools_version {
            config.tools_version = Some(tools_version.clone());
        }
        if let Some(arch) = self.arch {
            config.architecture = arch;
        }
        if let Some(verbosity) = &self.verbosity {
            config.verbosity = verbosity.clone();
        }
        if let Some(path) = &self.msbuild_path {
            config.msbuild_path = Some(path.clone());
        }
        if self.max_cpu_count.is_some() {
            config.max_cpu_count = self.max_cpu_count;
        }
        if let Some(dir) = &self.publish_dir {
            config.publish_directory = Some(dir.clone());
        }

        config.error_on_fail |= self.error_on_fail;
        config.log_command |= self.log_command;
        config.stdout |= self.stdout;
        config.emit_published_files |= self.emit_published_files;
    }
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid property '{}'; expected NAME=VALUE", s)),
    }
}

fn parse_tools_version(s: &str) -> Result<ToolsVersionSelector, String> {
    match ToolsVersionSelector::parse(s) {
        ToolsVersionSelector::Invalid(raw) => Err(format!(
            "invalid tools version '{}'; expected a number like 15.0 or 'auto'",
            raw
        )),
        selector => Ok(selector),
    }
}
