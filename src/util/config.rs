//! Configuration file support.
//!
//! Build options can come from three files, merged key by key:
//! - Global: `~/.msbuild-task/config.toml` - User-wide defaults
//! - Project: `msbuild-task.toml` in the working directory
//! - Explicit: a file passed on the command line
//!
//! Later files take precedence. The `properties` table is merged entry by
//! entry rather than replaced.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml::{Table, Value};

use crate::core::config::BuildConfiguration;

/// File name of the project config.
pub const PROJECT_CONFIG_FILE: &str = "msbuild-task.toml";

/// Get the global config directory (~/.msbuild-task).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".msbuild-task"))
}

/// Get the global config path (~/.msbuild-task/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path.
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_CONFIG_FILE)
}

/// The config files that feed one build, lowest precedence first.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Skipped if missing
    pub global: Option<PathBuf>,
    /// Skipped if missing
    pub project: Option<PathBuf>,
    /// Must exist
    pub explicit: Option<PathBuf>,
}

impl ConfigSources {
    /// The standard locations for a build run from `cwd`.
    pub fn discover(cwd: &Path, explicit: Option<PathBuf>) -> Self {
        ConfigSources {
            global: global_config_path(),
            project: Some(project_config_path(cwd)),
            explicit,
        }
    }

    /// Merge every present file over the defaults.
    pub fn load(&self) -> Result<BuildConfiguration> {
        let mut merged = Table::new();

        for path in [&self.global, &self.project].into_iter().flatten() {
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                merge_tables(&mut merged, read_table(path)?);
            }
        }

        if let Some(path) = &self.explicit {
            merge_tables(&mut merged, read_table(path)?);
        }

        BuildConfiguration::from_table(merged).context("invalid build configuration")
    }
}

fn read_table(path: &Path) -> Result<Table> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;

    contents
        .parse::<Table>()
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

/// Merge `overlay` into `base` (overlay takes precedence).
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
