//! Build stage for a stream of file records.

use std::sync::Arc;

use crate::builder::runner::{ExecutionOutcome, MsBuildRunner, OutputSink};
use crate::core::config::BuildConfiguration;
use crate::core::file::FileRecord;

/// Builds each project file that flows through it.
///
/// Every file gets a fresh copy of the template configuration, so the
/// executable resolved for one build never leaks into the next.
#[derive(Debug, Clone)]
pub struct BuildStage {
    template: BuildConfiguration,
    runner: MsBuildRunner,
}

impl BuildStage {
    pub fn new(template: BuildConfiguration) -> Self {
        Self::with_runner(template, MsBuildRunner::default())
    }

    pub fn with_runner(template: BuildConfiguration, runner: MsBuildRunner) -> Self {
        BuildStage {
            template: template.with_default_targets(),
            runner,
        }
    }

    pub fn template(&self) -> &BuildConfiguration {
        &self.template
    }

    /// Build one file, then pass it on to `sink`.
    ///
    /// Records without a path are passed on untouched. Published artifacts
    /// reach the sink before the input file does.
    pub fn process(&self, file: FileRecord, sink: Arc<dyn OutputSink>) -> ExecutionOutcome {
        let Some(path) = file.path.clone() else {
            sink.push(file);
            return Ok(());
        };

        tracing::debug!("Building {}", path.display());
        self.runner
            .spawn(self.template.clone(), &path, Arc::clone(&sink))?
            .wait()?;

        sink.push(file);
        Ok(())
    }

    /// Process files in order, stopping at the first error.
    pub fn process_all(
        &self,
        files: impl IntoIterator<Item = FileRecord>,
        sink: Arc<dyn OutputSink>,
    ) -> ExecutionOutcome {
        for file in files {
            self.process(file, Arc::clone(&sink))?;
        }
        Ok(())
    }
}
