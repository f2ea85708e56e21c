//! Queries against the host: PATH lookups, tool version checks and
//! the Program Files environment.

use std::path::{Path, PathBuf};

use crate::core::config::Architecture;
use crate::util::process::{find_executable, ProcessBuilder};

/// Questions the finder asks the host system.
pub trait HostProbe: Send + Sync {
    /// Whether `name` resolves on the executable search path.
    fn on_search_path(&self, name: &str) -> bool;

    /// Raw output of `<executable> /version /nologo`, or `None` if it
    /// could not be run.
    fn query_version(&self, executable: &Path) -> Option<String>;
}

/// Probe backed by the real PATH and real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn on_search_path(&self, name: &str) -> bool {
        find_executable(name).is_some()
    }

    fn query_version(&self, executable: &Path) -> Option<String> {
        let output = ProcessBuilder::new(executable)
            .args(["/version", "/nologo"])
            .exec();

        match output {
            Ok(out) if out.status.success() => {
                Some(String::from_utf8_lossy(&out.stdout).into_owned())
            }
            Ok(out) => {
                tracing::debug!(
                    "{} /version exited with {:?}",
                    executable.display(),
                    out.status.code()
                );
                None
            }
            Err(e) => {
                tracing::debug!("Failed to query MSBuild version: {:#}", e);
                None
            }
        }
    }
}

/// Program Files locations from the host environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// `ProgramFiles`
    pub program_files: Option<PathBuf>,
    /// `ProgramFiles(x86)`
    pub program_files_x86: Option<PathBuf>,
}

impl HostEnvironment {
    /// Capture the current process environment.
    pub fn from_env() -> Self {
        HostEnvironment {
            program_files: std::env::var_os("ProgramFiles").map(PathBuf::from),
            program_files_x86: std::env::var_os("ProgramFiles(x86)").map(PathBuf::from),
        }
    }

    /// Root under which MSBuild for `arch` is installed.
    ///
    /// 64-bit MSBuild lives under the x86 Program Files folder on 64-bit
    /// Windows, so `x64` maps to `ProgramFiles(x86)`.
    pub fn program_files_root(&self, arch: Architecture) -> PathBuf {
        match arch {
            Architecture::X64 => self
                .program_files_x86
                .clone()
                .unwrap_or_else(|| PathBuf::from("C:/Program Files (x86)")),
            Architecture::X86 => self
                .program_files
                .clone()
                .unwrap_or_else(|| PathBuf::from("C:/Program Files")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_files_defaults() {
        let env = HostEnvironment::default();
        assert_eq!(
            env.program_files_root(Architecture::X64),
            PathBuf::from("C:/Program Files (x86)")
        );
        assert_eq!(
            env.program_files_root(Architecture::X86),
            PathBuf::from("C:/Program Files")
        );
    }

    #[test]
    fn test_program_files_override() {
        let env = HostEnvironment {
            program_files: Some(PathBuf::from("D:/PF")),
            program_files_x86: Some(PathBuf::from("D:/PF86")),
        };
        assert_eq!(env.program_files_root(Architecture::X64), PathBuf::from("D:/PF86"));
        assert_eq!(env.program_files_root(Architecture::X86), PathBuf::from("D:/PF"));
    }

    #[test]
    fn test_system_probe_missing_tool() {
        assert!(!SystemProbe.on_search_path("definitely-not-a-real-build-tool"));
        assert_eq!(
            SystemProbe.query_version(Path::new("/definitely/not/here/MSBuild.exe")),
            None
        );
    }
}
