//! Build error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::config::Architecture;

/// Error raised while resolving, constructing or running an MSBuild command.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No options specified!")]
    NoOptionsSpecified,

    #[error("unsupported MSBuild tools version `{requested}`")]
    UnsupportedVersion { requested: String },

    #[error("no {architecture} MSBuild executable found under `{}`", root.display())]
    ExecutableNotFound {
        root: PathBuf,
        architecture: Architecture,
    },

    #[error("failed to start `{}`: {source}", executable.display())]
    ProcessLaunch {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("MSBuild failed with code {code}!")]
    ProcessExit { code: i32, signal: Option<String> },

    #[error("MSBuild was killed with signal {signal}!")]
    ProcessKilled { signal: String },

    #[error("failed to enumerate published files in `{}`: {source}", directory.display())]
    ArtifactEnumeration {
        directory: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Error raised while loading a [`BuildConfiguration`](crate::core::config::BuildConfiguration).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown option '{name}'!{}", did_you_mean(.suggestion))]
    UnknownOption {
        name: String,
        suggestion: Option<&'static str>,
    },

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

fn did_you_mean(suggestion: &Option<&'static str>) -> String {
    match suggestion {
        Some(name) => format!(" Did you mean '{}'?", name),
        None => String::new(),
    }
}

impl BuildError {
    /// Whether this error comes from running the build tool.
    ///
    /// Only these are subject to `errorOnFail`; resolution errors and
    /// artifact enumeration errors always propagate.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            BuildError::ProcessLaunch { .. }
                | BuildError::ProcessExit { .. }
                | BuildError::ProcessKilled { .. }
        )
    }
}
