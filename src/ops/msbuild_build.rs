//! Implementation of `msbuild-task`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::builder::runner::CollectSink;
use crate::core::config::BuildConfiguration;
use crate::core::file::FileRecord;
use crate::ops::msbuild_stage::BuildStage;

/// Options for a build run.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Merged configuration used as the template for every project
    pub config: BuildConfiguration,

    /// Project or solution files, built in order
    pub projects: Vec<PathBuf>,
}

/// What a build run produced.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Projects that went through the build stage
    pub built: Vec<PathBuf>,

    /// Artifacts found in the publish location
    pub published: Vec<FileRecord>,
}

/// Build every project and gather what the stage passed on.
pub fn build(opts: BuildOptions) -> Result<BuildResult> {
    if opts.projects.is_empty() {
        bail!("no project files given");
    }

    for project in &opts.projects {
        if !project.is_file() {
            bail!("project file not found: {}", project.display());
        }
    }

    let stage = BuildStage::new(opts.config);
    let sink = Arc::new(CollectSink::new());
    let files = opts.projects.iter().map(FileRecord::from_path);

    stage
        .process_all(files, sink.clone())
        .context("build failed")?;

    let mut result = BuildResult::default();
    for file in sink.take() {
        let Some(path) = file.path.clone() else {
            continue;
        };
        if opts.projects.contains(&path) && file.contents.is_none() {
            result.built.push(path);
        } else {
            result.published.push(file);
        }
    }

    Ok(result)
}
