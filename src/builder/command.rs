//! MSBuild command line construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::toolchain::finder::{is_legacy_fallback, MsBuildFinder};
use crate::core::config::BuildConfiguration;
use crate::core::errors::BuildError;
use crate::util::fs::normalize_path;
use crate::util::process::ProcessBuilder;

/// A fully formed MSBuild invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    /// Normalized executable path or bare command name
    pub executable: PathBuf,
    /// Input file first, then every derived flag
    pub args: Vec<String>,
}

impl ResolvedCommand {
    /// Render as a single line for logging.
    pub fn display(&self) -> String {
        let mut parts = vec![self.executable.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// A process builder for this command.
    pub fn to_process(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.executable).args(&self.args)
    }
}

/// Derive the MSBuild flags for `config`, in the order MSBuild receives them.
pub fn build_arguments(config: &BuildConfiguration) -> Vec<String> {
    let mut args = Vec::new();

    args.push(format!("/target:{}", config.effective_targets().join(";")));
    args.push(format!("/verbosity:{}", config.verbosity));

    if let Some(tools_version) = &config.tools_version {
        args.push(format!("/toolsversion:{}", tools_version.argument_value()));
    }

    if config.nologo {
        args.push("/nologo".to_string());
    }

    if let Some(flp) = &config.file_logger_parameters {
        args.push(format!("/flp:{}", flp));
    }

    if let Some(clp) = &config.console_logger_parameters {
        args.push(format!("/clp:{}", clp));
    }

    if let Some(logger) = &config.logger_parameters {
        args.push(format!("/logger:{}", logger));
    }

    // xbuild rejects /maxcpucount
    let legacy_tool = config
        .msbuild_path
        .as_deref()
        .is_some_and(is_legacy_fallback);
    if !legacy_tool {
        match config.max_cpu_count {
            Some(0) => args.push("/maxcpucount".to_string()),
            Some(n) if n > 0 => args.push(format!("/maxcpucount:{}", n)),
            _ => {}
        }
    }

    if !config.node_reuse {
        args.push("/nodeReuse:False".to_string());
    }

    for (name, value) in merged_properties(config) {
        args.push(format!("/property:{}={}", name, value));
    }

    args.extend(config.custom_args.iter().cloned());

    args
}

/// `Configuration` and `Platform` from their dedicated options, then the
/// caller's properties.
///
/// The dedicated options win over same-named entries in `properties`
/// (compared case-insensitively, as MSBuild does).
fn merged_properties(config: &BuildConfiguration) -> Vec<(&str, &str)> {
    let mut merged: Vec<(&str, &str)> = Vec::new();

    if let Some(configuration) = &config.configuration {
        merged.push(("Configuration", configuration.as_str()));
    }
    if let Some(platform) = &config.solution_platform {
        merged.push(("Platform", platform.as_str()));
    }

    let derived = merged.len();
    for (name, value) in &config.properties {
        let overridden = merged[..derived]
            .iter()
            .any(|(existing, _)| existing.eq_ignore_ascii_case(name));
        if !overridden {
            merged.push((name.as_str(), value.as_str()));
        }
    }

    merged
}

/// Turns a configuration and an input file into a [`ResolvedCommand`].
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    finder: Arc<MsBuildFinder>,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new(Arc::new(MsBuildFinder::new()))
    }
}

impl CommandBuilder {
    pub fn new(finder: Arc<MsBuildFinder>) -> Self {
        CommandBuilder { finder }
    }

    /// Build the command for `file`.
    ///
    /// Without an explicit `msbuildPath`, the executable is resolved and
    /// written back to `config`. Everything else in `config` is left as
    /// the caller set it.
    pub fn construct(
        &self,
        file: &Path,
        config: Option<&mut BuildConfiguration>,
    ) -> Result<ResolvedCommand, BuildError> {
        let config = config.ok_or(BuildError::NoOptionsSpecified)?;

        let executable = match &config.msbuild_path {
            Some(path) => path.clone(),
            None => {
                let resolution = self.finder.find(config)?;
                config.msbuild_path = Some(resolution.executable.clone());
                resolution.executable
            }
        };

        let mut args = vec![file.display().to_string()];
        args.extend(build_arguments(config));

        Ok(ResolvedCommand {
            executable: normalize_path(&executable),
            args,
        })
    }
}
