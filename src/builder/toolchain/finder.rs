//! Resolution of the MSBuild executable for a build configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::config::BuildConfiguration;
use crate::core::errors::BuildError;

use super::detect::{
    legacy_version, matches_architecture, modern_install_root, ListingCache, MSBUILD_EXE,
};
use super::probe::{HostEnvironment, HostProbe, SystemProbe};
use super::version::{ToolsVersion, ToolsVersionSelector, VersionRegistry, CURRENT_TAG};

/// Open-source build tool used where MSBuild is unavailable.
pub const XBUILD: &str = "xbuild";

/// Command name of a full MSBuild on the search path.
pub const MSBUILD_COMMAND: &str = "msbuild";

/// Whether `executable` is the `xbuild` fallback.
pub fn is_legacy_fallback(executable: &Path) -> bool {
    executable
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.eq_ignore_ascii_case(XBUILD))
}

/// Outcome of resolving the build tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Absolute path, or a bare command name looked up on PATH
    pub executable: PathBuf,
    /// Tools version the executable was chosen for; `None` off Windows
    pub version: Option<ToolsVersion>,
}

impl Resolution {
    fn command(name: &str) -> Self {
        Resolution {
            executable: PathBuf::from(name),
            version: None,
        }
    }
}

#[derive(Debug, Default)]
struct DetectionState {
    registry: VersionRegistry,
    /// Auto-detected version per Visual Studio installation root
    detected: HashMap<PathBuf, ToolsVersion>,
}

/// Locates MSBuild for a configuration.
///
/// A finder owns its version registry and directory listing cache, so
/// detection work is shared by every resolution made through it and
/// dropped with it. It is `Sync`; share one through an `Arc` to reuse the
/// caches across concurrent builds.
pub struct MsBuildFinder {
    env: HostEnvironment,
    probe: Box<dyn HostProbe>,
    state: Mutex<DetectionState>,
    listings: ListingCache,
}

impl Default for MsBuildFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MsBuildFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsBuildFinder")
            .field("env", &self.env)
            .field("listings", &self.listings)
            .finish_non_exhaustive()
    }
}

impl MsBuildFinder {
    /// A finder for the current host.
    pub fn new() -> Self {
        Self::with_host(HostEnvironment::from_env(), Box::new(SystemProbe))
    }

    /// A finder with an explicit environment and probe.
    pub fn with_host(env: HostEnvironment, probe: Box<dyn HostProbe>) -> Self {
        MsBuildFinder {
            env,
            probe,
            state: Mutex::new(DetectionState::default()),
            listings: ListingCache::new(),
        }
    }

    /// Snapshot of the versions known to this finder, detected ones included.
    pub fn registry(&self) -> VersionRegistry {
        self.lock_state().registry.clone()
    }

    /// Resolve the executable for `config`.
    pub fn find(&self, config: &BuildConfiguration) -> Result<Resolution, BuildError> {
        if config.is_unix_like() {
            let name = if self.probe.on_search_path(MSBUILD_COMMAND) {
                MSBUILD_COMMAND
            } else {
                XBUILD
            };
            return Ok(Resolution::command(name));
        }

        if !config.is_windows() {
            return Ok(Resolution::command(XBUILD));
        }

        let arch = config.architecture;
        let program_files = self.env.program_files_root(arch);
        let selector = config
            .tools_version
            .clone()
            .unwrap_or(ToolsVersionSelector::Auto);
        let newest_known = VersionRegistry::newest_static_modern();

        let (version, modern_root) = match selector {
            ToolsVersionSelector::Invalid(requested) => {
                return Err(BuildError::UnsupportedVersion { requested })
            }
            ToolsVersionSelector::Auto => self.auto_detect(&program_files),
            ToolsVersionSelector::Version(v) if v.major > newest_known.major => {
                self.auto_detect(&program_files)
            }
            ToolsVersionSelector::Version(v) if v.major >= 15 => {
                (v, modern_install_root(&program_files, Some(v)))
            }
            ToolsVersionSelector::Version(v) => (v, None),
        };

        let tag = self
            .lock_state()
            .registry
            .lookup(version)
            .map(str::to_string)
            .ok_or_else(|| BuildError::UnsupportedVersion {
                requested: version.to_string(),
            })?;

        let executable = if version.major > 15 {
            // MSBuild 16+ only ships inside a Visual Studio install
            let home = modern_root
                .ok_or_else(|| BuildError::ExecutableNotFound {
                    root: program_files.join("Microsoft Visual Studio"),
                    architecture: arch,
                })?
                .join("MSBuild");
            self.listings
                .executables(&home)
                .iter()
                .find(|exe| matches_architecture(exe, arch))
                .cloned()
                .ok_or(BuildError::ExecutableNotFound {
                    root: home,
                    architecture: arch,
                })?
        } else if version.major >= 12 {
            let install_root = modern_root.unwrap_or(program_files);
            let mut path = install_root.join("MSBuild").join(&tag).join("Bin");
            if arch.is_64bit() {
                path.push("amd64");
            }
            path.join(MSBUILD_EXE)
        } else {
            let framework = if arch.is_64bit() {
                "Framework64"
            } else {
                "Framework"
            };
            config
                .windir
                .join("Microsoft.Net")
                .join(framework)
                .join(&tag)
                .join(MSBUILD_EXE)
        };

        tracing::debug!(
            "Resolved MSBuild {} at {}",
            version,
            executable.display()
        );

        Ok(Resolution {
            executable,
            version: Some(version),
        })
    }

    /// Pick a version from what is installed under `program_files`.
    ///
    /// Returns the version and, when one exists, the Visual Studio
    /// installation it belongs to.
    fn auto_detect(&self, program_files: &Path) -> (ToolsVersion, Option<PathBuf>) {
        let Some(root) = modern_install_root(program_files, None) else {
            let version = legacy_version(program_files);
            tracing::debug!("No Visual Studio installation found, using MSBuild {}", version);
            return (version, None);
        };

        if let Some(version) = self.lock_state().detected.get(&root) {
            return (*version, Some(root));
        }

        let executables = self.listings.executables(&root.join("MSBuild"));
        let detected: Vec<ToolsVersion> = executables
            .iter()
            .filter_map(|exe| self.probe.query_version(exe))
            .filter_map(|output| ToolsVersion::from_version_output(&output))
            .collect();

        let mut state = self.lock_state();
        for version in &detected {
            if state.registry.register(*version, CURRENT_TAG) {
                tracing::debug!("Registered detected MSBuild version {}", version);
            }
        }

        let version = detected
            .into_iter()
            .max()
            .unwrap_or_else(VersionRegistry::newest_static_modern);
        state.detected.insert(root.clone(), version);

        (version, Some(root))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DetectionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Architecture;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeProbe {
        on_path: bool,
        versions: HashMap<PathBuf, String>,
        queries: Arc<AtomicUsize>,
    }

    impl HostProbe for FakeProbe {
        fn on_search_path(&self, _name: &str) -> bool {
            self.on_path
        }

        fn query_version(&self, executable: &Path) -> Option<String> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.versions.get(executable).cloned()
        }
    }

    fn finder_with(program_files: &Path, probe: FakeProbe) -> MsBuildFinder {
        let env = HostEnvironment {
            program_files: Some(program_files.to_path_buf()),
            program_files_x86: Some(program_files.to_path_buf()),
        };
        MsBuildFinder::with_host(env, Box::new(probe))
    }

    fn windows(version: &str, arch: Architecture) -> BuildConfiguration {
        BuildConfiguration {
            platform: "win32".into(),
            architecture: arch,
            windir: PathBuf::from("WINDIR"),
            tools_version: Some(ToolsVersionSelector::parse(version)),
            ..Default::default()
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_xbuild_on_unix_without_msbuild() {
        let finder = MsBuildFinder::with_host(HostEnvironment::default(), Box::new(FakeProbe::default()));
        for platform in ["linux", "darwin"] {
            let config = BuildConfiguration {
                platform: platform.into(),
                ..Default::default()
            };
            assert_eq!(finder.find(&config).unwrap().executable, PathBuf::from(XBUILD));
        }
    }

    #[test]
    fn test_msbuild_on_unix_when_on_path() {
        let probe = FakeProbe {
            on_path: true,
            ..Default::default()
        };
        let finder = MsBuildFinder::with_host(HostEnvironment::default(), Box::new(probe));
        let config = BuildConfiguration {
            platform: "linux".into(),
            ..Default::default()
        };
        assert_eq!(
            finder.find(&config).unwrap(),
            Resolution {
                executable: PathBuf::from(MSBUILD_COMMAND),
                version: None
            }
        );
    }

    #[test]
    fn test_xbuild_on_unknown_platform() {
        let probe = FakeProbe {
            on_path: true,
            ..Default::default()
        };
        let finder = MsBuildFinder::with_host(HostEnvironment::default(), Box::new(probe));
        for platform in ["xyz", "freebsd", "sunos"] {
            let config = BuildConfiguration {
                platform: platform.into(),
                ..Default::default()
            };
            assert_eq!(finder.find(&config).unwrap().executable, PathBuf::from(XBUILD));
        }
    }

    #[test]
    fn test_framework_msbuild() {
        let finder = MsBuildFinder::with_host(HostEnvironment::default(), Box::new(FakeProbe::default()));

        let x86 = finder.find(&windows("3.5", Architecture::X86)).unwrap();
        assert_eq!(
            x86.executable,
            Path::new("WINDIR/Microsoft.Net/Framework/v3.5/MSBuild.exe")
        );

        let x64 = finder.find(&windows("3.5", Architecture::X64)).unwrap();
        assert_eq!(
            x64.executable,
            Path::new("WINDIR/Microsoft.Net/Framework64/v3.5/MSBuild.exe")
        );
    }

    #[test]
    fn test_msbuild_12_program_files() {
        let finder = MsBuildFinder::with_host(HostEnvironment::default(), Box::new(FakeProbe::default()));

        let x64 = finder.find(&windows("12.0", Architecture::X64)).unwrap();
        assert_eq!(
            x64.executable,
            Path::new("C:/Program Files (x86)/MSBuild/12.0/Bin/amd64/MSBuild.exe")
        );

        let x86 = finder.find(&windows("12.0", Architecture::X86)).unwrap();
        assert_eq!(
            x86.executable,
            Path::new("C:/Program Files/MSBuild/12.0/Bin/MSBuild.exe")
        );
        assert_eq!(x86.version, Some(ToolsVersion::new(12, 0)));
    }

    #[test]
    fn test_msbuild_15_without_visual_studio() {
        let tmp = TempDir::new().unwrap();
        let finder = finder_with(tmp.path(), FakeProbe::default());

        let resolved = finder.find(&windows("15.0", Architecture::X86)).unwrap();
        assert_eq!(
            resolved.executable,
            tmp.path().join("MSBuild/15.0/Bin/MSBuild.exe")
        );
    }

    #[test]
    fn test_msbuild_15_prefers_first_present_edition() {
        let tmp = TempDir::new().unwrap();
        let professional = tmp
            .path()
            .join("Microsoft Visual Studio/2017/Professional");
        fs::create_dir_all(&professional).unwrap();
        fs::create_dir_all(tmp.path().join("Microsoft Visual Studio/2017/Community")).unwrap();
        let finder = finder_with(tmp.path(), FakeProbe::default());

        let resolved = finder.find(&windows("15.0", Architecture::X86)).unwrap();
        assert_eq!(
            resolved.executable,
            professional.join("MSBuild/15.0/Bin/MSBuild.exe")
        );
    }

    #[test]
    fn test_auto_without_any_install_uses_framework_4() {
        let tmp = TempDir::new().unwrap();
        let finder = finder_with(tmp.path(), FakeProbe::default());

        let resolved = finder.find(&windows("auto", Architecture::X86)).unwrap();
        assert_eq!(
            resolved.executable,
            Path::new("WINDIR/Microsoft.Net/Framework/v4.0.30319/MSBuild.exe")
        );
        assert_eq!(resolved.version, Some(ToolsVersion::FALLBACK));
    }

    #[test]
    fn test_auto_uses_newest_legacy_install() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("MSBuild/12.0/Bin")).unwrap();
        fs::create_dir_all(tmp.path().join("MSBuild/14.0/Bin/amd64")).unwrap();
        let finder = finder_with(tmp.path(), FakeProbe::default());

        let resolved = finder.find(&windows("auto", Architecture::X64)).unwrap();
        assert_eq!(
            resolved.executable,
            tmp.path().join("MSBuild/14.0/Bin/amd64/MSBuild.exe")
        );
    }

    #[test]
    fn test_modern_msbuild_filters_by_architecture() {
        let tmp = TempDir::new().unwrap();
        let home = tmp
            .path()
            .join("Microsoft Visual Studio/2019/Community/MSBuild");
        touch(&home.join("Current/Bin/MSBuild.exe"));
        touch(&home.join("Current/Bin/amd64/MSBuild.exe"));
        let finder = finder_with(tmp.path(), FakeProbe::default());

        let x86 = finder.find(&windows("16.0", Architecture::X86)).unwrap();
        assert_eq!(x86.executable, home.join("Current/Bin/MSBuild.exe"));

        let x64 = finder.find(&windows("16.0", Architecture::X64)).unwrap();
        assert_eq!(x64.executable, home.join("Current/Bin/amd64/MSBuild.exe"));
    }

    #[test]
    fn test_modern_msbuild_without_matching_architecture() {
        let tmp = TempDir::new().unwrap();
        let home = tmp
            .path()
            .join("Microsoft Visual Studio/2019/BuildTools/MSBuild");
        touch(&home.join("Current/Bin/MSBuild.exe"));
        let finder = finder_with(tmp.path(), FakeProbe::default());

        let err = finder.find(&windows("16.0", Architecture::X64)).unwrap_err();
        assert!(matches!(err, BuildError::ExecutableNotFound { .. }));
    }

    #[test]
    fn test_modern_msbuild_ignores_legacy_installs() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("MSBuild/14.0/Bin/MSBuild.exe"));
        let finder = finder_with(tmp.path(), FakeProbe::default());

        let err = finder.find(&windows("16.0", Architecture::X86)).unwrap_err();
        match err {
            BuildError::ExecutableNotFound { root, architecture } => {
                assert_eq!(root, tmp.path().join("Microsoft Visual Studio"));
                assert_eq!(architecture, Architecture::X86);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_auto_registers_newer_detected_version() {
        let tmp = TempDir::new().unwrap();
        let home = tmp
            .path()
            .join("Microsoft Visual Studio/2022/Enterprise/MSBuild");
        let x86 = home.join("Current/Bin/MSBuild.exe");
        let x64 = home.join("Current/Bin/amd64/MSBuild.exe");
        touch(&x86);
        touch(&x64);

        let mut versions = HashMap::new();
        versions.insert(x86.clone(), "18.0.1.2\r\n".to_string());
        versions.insert(x64.clone(), "18.0.1.2\r\n".to_string());
        let queries = Arc::new(AtomicUsize::new(0));
        let probe = FakeProbe {
            versions,
            queries: queries.clone(),
            ..Default::default()
        };
        let finder = finder_with(tmp.path(), probe);
        assert!(!finder.registry().contains(ToolsVersion::new(18, 0)));

        let resolved = finder.find(&windows("auto", Architecture::X64)).unwrap();
        assert_eq!(resolved.executable, x64);
        assert_eq!(resolved.version, Some(ToolsVersion::new(18, 0)));
        assert_eq!(
            finder.registry().lookup(ToolsVersion::new(18, 0)),
            Some(CURRENT_TAG)
        );

        // A second resolution reuses the detection and returns the same path.
        let queried = queries.load(Ordering::SeqCst);
        let again = finder.find(&windows("auto", Architecture::X64)).unwrap();
        assert_eq!(again, resolved);
        assert_eq!(queries.load(Ordering::SeqCst), queried);
    }

    #[test]
    fn test_auto_without_version_output_uses_newest_known() {
        let tmp = TempDir::new().unwrap();
        let home = tmp
            .path()
            .join("Microsoft Visual Studio/2022/Community/MSBuild");
        touch(&home.join("Current/Bin/MSBuild.exe"));
        let finder = finder_with(tmp.path(), FakeProbe::default());

        let resolved = finder.find(&windows("auto", Architecture::X86)).unwrap();
        assert_eq!(resolved.version, Some(VersionRegistry::newest_static_modern()));
        assert_eq!(resolved.executable, home.join("Current/Bin/MSBuild.exe"));
    }

    #[test]
    fn test_version_beyond_known_triggers_detection() {
        let tmp = TempDir::new().unwrap();
        let finder = finder_with(tmp.path(), FakeProbe::default());

        let resolved = finder.find(&windows("42", Architecture::X86)).unwrap();
        assert_eq!(resolved.version, Some(ToolsVersion::FALLBACK));
    }

    #[test]
    fn test_unsupported_versions() {
        let finder = MsBuildFinder::with_host(HostEnvironment::default(), Box::new(FakeProbe::default()));

        let err = finder.find(&windows("-1", Architecture::X86)).unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedVersion { requested } if requested == "-1"));

        let err = finder.find(&windows("13.0", Architecture::X86)).unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedVersion { requested } if requested == "13.0"));
    }

    #[test]
    fn test_find_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("Microsoft Visual Studio/2017/Community")).unwrap();
        let finder = finder_with(tmp.path(), FakeProbe::default());
        let config = windows("15.0", Architecture::X64);

        assert_eq!(finder.find(&config).unwrap(), finder.find(&config).unwrap());
    }

    #[test]
    fn test_is_legacy_fallback() {
        assert!(is_legacy_fallback(Path::new("xbuild")));
        assert!(is_legacy_fallback(Path::new("/usr/bin/xbuild")));
        assert!(!is_legacy_fallback(Path::new("msbuild")));
        assert!(!is_legacy_fallback(Path::new("C:/MSBuild/15.0/Bin/MSBuild.exe")));
    }
}
