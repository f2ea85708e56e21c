//! Running MSBuild and reducing its lifecycle to a single outcome.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::builder::command::{CommandBuilder, ResolvedCommand};
use crate::core::config::BuildConfiguration;
use crate::core::errors::BuildError;
use crate::core::file::FileRecord;
use crate::util::fs::walk_files;

/// Terminal result of one build.
pub type ExecutionOutcome = Result<(), BuildError>;

type Completion = Box<dyn FnOnce(ExecutionOutcome) + Send>;

/// Receives files produced by a build.
pub trait OutputSink: Send + Sync {
    fn push(&self, file: FileRecord);
}

impl OutputSink for Sender<FileRecord> {
    fn push(&self, file: FileRecord) {
        // A dropped receiver means nobody wants the files any more.
        let _ = self.send(file);
    }
}

/// Sink that keeps everything pushed to it.
#[derive(Debug, Default)]
pub struct CollectSink {
    files: Mutex<Vec<FileRecord>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the collected files.
    pub fn take(&self) -> Vec<FileRecord> {
        std::mem::take(&mut *self.files.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputSink for CollectSink {
    fn push(&self, file: FileRecord) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(file);
    }
}

enum LatchState {
    Pending(Completion),
    Completed,
}

/// Delivers an outcome to a completion callback at most once.
///
/// The first [`complete`](Self::complete) moves the latch from pending to
/// completed and runs the callback; later calls do nothing.
pub struct CompletionLatch {
    state: Mutex<LatchState>,
}

impl CompletionLatch {
    pub fn new(completion: impl FnOnce(ExecutionOutcome) + Send + 'static) -> Self {
        CompletionLatch {
            state: Mutex::new(LatchState::Pending(Box::new(completion))),
        }
    }

    /// Deliver `outcome`. Returns `false` if an outcome was already delivered.
    pub fn complete(&self, outcome: ExecutionOutcome) -> bool {
        let completion = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match std::mem::replace(&mut *state, LatchState::Completed) {
                LatchState::Pending(completion) => completion,
                LatchState::Completed => {
                    tracing::debug!("Ignoring outcome for an already completed build");
                    return false;
                }
            }
        };
        completion(outcome);
        true
    }
}

/// A running build whose outcome arrives over a one-shot channel.
#[derive(Debug)]
pub struct BuildHandle {
    command: ResolvedCommand,
    outcome: Receiver<ExecutionOutcome>,
}

impl BuildHandle {
    pub fn command(&self) -> &ResolvedCommand {
        &self.command
    }

    /// Block until the build finishes.
    pub fn wait(self) -> ExecutionOutcome {
        self.outcome.recv().unwrap_or_else(|_| {
            Err(BuildError::ProcessLaunch {
                executable: self.command.executable.clone(),
                source: io::Error::other("build ended without reporting an outcome"),
            })
        })
    }
}

/// Spawns MSBuild for one file at a time.
///
/// Every call runs its own child process with its own completion latch;
/// nothing limits how many run at once.
#[derive(Debug, Clone, Default)]
pub struct MsBuildRunner {
    commands: CommandBuilder,
}

impl MsBuildRunner {
    pub fn new(commands: CommandBuilder) -> Self {
        MsBuildRunner { commands }
    }

    /// Start building `file` and return once the process is launched.
    ///
    /// Resolution and construction errors are returned directly.
    /// Everything after that goes to `completion`, exactly once; published
    /// files are pushed to `sink` before it is called.
    pub fn start(
        &self,
        mut config: BuildConfiguration,
        file: &Path,
        sink: Arc<dyn OutputSink>,
        completion: impl FnOnce(ExecutionOutcome) + Send + 'static,
    ) -> Result<ResolvedCommand, BuildError> {
        let command = self.commands.construct(file, Some(&mut config))?;

        if config.log_command {
            tracing::info!("Using msbuild command: {}", command.display());
        }

        let latch = Arc::new(CompletionLatch::new(completion));
        let process = command
            .to_process()
            .stdout(config.stdout)
            .stderr(config.stderr);

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = BuildError::ProcessLaunch {
                    executable: command.executable.clone(),
                    source,
                };
                report_launch_error(&config, &latch, err);
                return Ok(command);
            }
        };

        let executable = command.executable.clone();
        thread::spawn(move || match child.wait() {
            Ok(status) => report_exit(&config, status, sink.as_ref(), &latch),
            Err(source) => {
                let err = BuildError::ProcessLaunch { executable, source };
                report_launch_error(&config, &latch, err);
            }
        });

        Ok(command)
    }

    /// Start a build and get a handle to its outcome.
    pub fn spawn(
        &self,
        config: BuildConfiguration,
        file: &Path,
        sink: Arc<dyn OutputSink>,
    ) -> Result<BuildHandle, BuildError> {
        let (tx, rx) = mpsc::channel();
        let command = self.start(config, file, sink, move |outcome| {
            let _ = tx.send(outcome);
        })?;
        Ok(BuildHandle {
            command,
            outcome: rx,
        })
    }

    /// Build `file` and wait for the outcome.
    pub fn run(
        &self,
        config: BuildConfiguration,
        file: &Path,
        sink: Arc<dyn OutputSink>,
    ) -> ExecutionOutcome {
        self.spawn(config, file, sink)?.wait()
    }
}

fn report_launch_error(config: &BuildConfiguration, latch: &CompletionLatch, err: BuildError) {
    tracing::error!("{}", err);
    tracing::error!("Build failed!");
    fail(config, latch, err);
}

fn report_exit(
    config: &BuildConfiguration,
    status: ExitStatus,
    sink: &dyn OutputSink,
    latch: &CompletionLatch,
) {
    match status.code() {
        Some(0) => {
            tracing::info!("Build complete!");

            if config.emit_published_files {
                match collect_published_files(config) {
                    Ok(files) => {
                        for file in files {
                            sink.push(file);
                        }
                    }
                    Err(err) => {
                        fail(config, latch, err);
                        return;
                    }
                }
            }

            latch.complete(Ok(()));
        }
        Some(code) => {
            tracing::error!("Build failed with code {}!", code);
            let err = BuildError::ProcessExit {
                code,
                signal: exit_signal(&status),
            };
            fail(config, latch, err);
        }
        None => {
            let signal = exit_signal(&status).unwrap_or_else(|| "unknown".to_string());
            tracing::error!("Build was killed with signal {}!", signal);
            fail(config, latch, BuildError::ProcessKilled { signal });
        }
    }
}

/// Execution failures only reach the caller with `errorOnFail`; anything
/// else always does.
fn fail(config: &BuildConfiguration, latch: &CompletionLatch, err: BuildError) {
    if config.error_on_fail || !err.is_execution_failure() {
        latch.complete(Err(err));
    } else {
        latch.complete(Ok(()));
    }
}

/// Read every file under the publish location.
fn collect_published_files(config: &BuildConfiguration) -> Result<Vec<FileRecord>, BuildError> {
    let Some(location) = config.publish_location() else {
        return Err(BuildError::ArtifactEnumeration {
            directory: PathBuf::new(),
            source: io::Error::new(
                io::ErrorKind::NotFound,
                "no publishDirectory or PublishUrl property configured",
            ),
        });
    };

    let enumeration_error = |source: io::Error| BuildError::ArtifactEnumeration {
        directory: location.to_path_buf(),
        source,
    };

    let root = std::path::absolute(location).map_err(enumeration_error)?;
    let mut records = Vec::new();
    for path in walk_files(&root).map_err(enumeration_error)? {
        let contents = fs::read(&path).map_err(enumeration_error)?;
        records.push(FileRecord::published(&root, path, contents));
    }

    tracing::debug!(
        "Found {} published file(s) in {}",
        records.len(),
        root.display()
    );
    Ok(records)
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<String> {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    let signal = status.signal()?;
    Some(
        Signal::try_from(signal)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|_| signal.to_string()),
    )
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<String> {
    None
}
