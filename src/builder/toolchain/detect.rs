//! Discovery of MSBuild installations on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use walkdir::WalkDir;

use crate::core::config::Architecture;
use crate::util::fs::subdirectory_names;

use super::version::ToolsVersion;

/// File name of the Windows MSBuild executable.
pub const MSBUILD_EXE: &str = "MSBuild.exe";

/// Visual Studio editions, in the order they are preferred.
pub const EDITION_TIERS: &[&str] = &["Enterprise", "Professional", "Community", "BuildTools"];

/// Visual Studio release folders and the MSBuild major version they ship, newest first.
const VS_RELEASES: &[(&str, u32)] = &[("2022", 17), ("2019", 16), ("2017", 15)];

/// Find the Visual Studio installation to take MSBuild from.
///
/// With a version, only the release that ships it is searched (every
/// release if none matches); without one, every release newest first.
/// Within a release, editions are tried in [`EDITION_TIERS`] order and the
/// first existing folder wins.
pub fn modern_install_root(program_files: &Path, version: Option<ToolsVersion>) -> Option<PathBuf> {
    let vs_root = program_files.join("Microsoft Visual Studio");

    let mut releases: Vec<&str> = VS_RELEASES
        .iter()
        .filter(|(_, major)| version.map_or(true, |v| v.major == *major))
        .map(|(year, _)| *year)
        .collect();
    if releases.is_empty() {
        releases = VS_RELEASES.iter().map(|(year, _)| *year).collect();
    }

    for year in releases {
        for tier in EDITION_TIERS {
            let candidate = vs_root.join(year).join(tier);
            if candidate.is_dir() {
                tracing::debug!("Found Visual Studio installation at {}", candidate.display());
                return Some(candidate);
            }
        }
    }

    None
}

/// Every `MSBuild.exe` under `root`, matched case-insensitively.
///
/// Entries are visited in file name order, so the sequence is stable for an
/// unchanged tree. A missing root yields nothing.
pub fn find_executables(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.eq_ignore_ascii_case(MSBUILD_EXE))
        })
        .map(walkdir::DirEntry::into_path)
}

/// Whether an MSBuild path belongs to `arch`.
///
/// 64-bit builds live below an `amd64` folder; 32-bit builds never do.
pub fn matches_architecture(path: &Path, arch: Architecture) -> bool {
    let in_amd64 = path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| s.eq_ignore_ascii_case("amd64"))
    });
    in_amd64 == arch.is_64bit()
}

/// Newest pre-2017 MSBuild under `<program files>/MSBuild`.
///
/// Those installs are folders named after their version (`12.0`, `14.0`)
/// holding a `Bin` directory. Falls back to 4.0 when none qualify.
pub fn legacy_version(program_files: &Path) -> ToolsVersion {
    let msbuild_dir = program_files.join("MSBuild");

    subdirectory_names(&msbuild_dir)
        .into_iter()
        .filter(|name| name.starts_with('1'))
        .filter(|name| msbuild_dir.join(name).join("Bin").is_dir())
        .filter_map(|name| ToolsVersion::parse(&name))
        .max()
        .unwrap_or(ToolsVersion::FALLBACK)
}

/// Executable listings keyed by the folder they were collected from.
///
/// Owned by a finder and lives as long as it does. Listings are only ever
/// added, so concurrent lookups of the same folder agree.
#[derive(Debug, Default)]
pub struct ListingCache {
    listings: Mutex<HashMap<PathBuf, Arc<Vec<PathBuf>>>>,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executables under `root`, walking the tree on first use only.
    pub fn executables(&self, root: &Path) -> Arc<Vec<PathBuf>> {
        let mut listings = self.listings.lock().unwrap_or_else(|e| e.into_inner());
        listings
            .entry(root.to_path_buf())
            .or_insert_with(|| {
                tracing::debug!("Searching {} for {}", root.display(), MSBUILD_EXE);
                Arc::new(find_executables(root).collect())
            })
            .clone()
    }

    /// Number of folders listed so far.
    pub fn len(&self) -> usize {
        self.listings.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_modern_root_tier_order() {
        let tmp = TempDir::new().unwrap();
        let vs = tmp.path().join("Microsoft Visual Studio").join("2017");
        fs::create_dir_all(vs.join("Community")).unwrap();
        fs::create_dir_all(vs.join("Professional")).unwrap();

        assert_eq!(
            modern_install_root(tmp.path(), Some(ToolsVersion::new(15, 0))),
            Some(vs.join("Professional"))
        );
    }

    #[test]
    fn test_modern_root_newest_release_first() {
        let tmp = TempDir::new().unwrap();
        let vs = tmp.path().join("Microsoft Visual Studio");
        fs::create_dir_all(vs.join("2017").join("Enterprise")).unwrap();
        fs::create_dir_all(vs.join("2019").join("BuildTools")).unwrap();

        assert_eq!(
            modern_install_root(tmp.path(), None),
            Some(vs.join("2019").join("BuildTools"))
        );
        // An explicit version only looks at its own release.
        assert_eq!(
            modern_install_root(tmp.path(), Some(ToolsVersion::new(15, 0))),
            Some(vs.join("2017").join("Enterprise"))
        );
        assert_eq!(
            modern_install_root(tmp.path(), Some(ToolsVersion::new(17, 0))),
            None
        );
    }

    #[test]
    fn test_modern_root_missing() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(modern_install_root(tmp.path(), None), None);
    }

    #[test]
    fn test_find_executables_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("Current/Bin/MSBuild.exe"));
        touch(&tmp.path().join("Current/Bin/amd64/msbuild.EXE"));
        touch(&tmp.path().join("Current/Bin/MSBuild.dll"));

        let found: Vec<PathBuf> = find_executables(tmp.path()).collect();
        assert_eq!(
            found,
            vec![
                tmp.path().join("Current/Bin/MSBuild.exe"),
                tmp.path().join("Current/Bin/amd64/msbuild.EXE"),
            ]
        );
        assert_eq!(find_executables(&tmp.path().join("missing")).count(), 0);
    }

    #[test]
    fn test_matches_architecture() {
        let x64 = Path::new("VS/MSBuild/Current/Bin/amd64/MSBuild.exe");
        let x86 = Path::new("VS/MSBuild/Current/Bin/MSBuild.exe");
        assert!(matches_architecture(x64, Architecture::X64));
        assert!(!matches_architecture(x64, Architecture::X86));
        assert!(matches_architecture(x86, Architecture::X86));
        assert!(!matches_architecture(x86, Architecture::X64));
    }

    #[test]
    fn test_legacy_version() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(legacy_version(tmp.path()), ToolsVersion::FALLBACK);

        let msbuild = tmp.path().join("MSBuild");
        fs::create_dir_all(msbuild.join("12.0").join("Bin")).unwrap();
        fs::create_dir_all(msbuild.join("14.0")).unwrap();
        fs::create_dir_all(msbuild.join("Microsoft").join("Bin")).unwrap();
        assert_eq!(legacy_version(tmp.path()), ToolsVersion::new(12, 0));

        fs::create_dir_all(msbuild.join("14.0").join("Bin")).unwrap();
        assert_eq!(legacy_version(tmp.path()), ToolsVersion::new(14, 0));
    }

    #[test]
    fn test_legacy_version_skips_unparseable_folders() {
        let tmp = TempDir::new().unwrap();
        let msbuild = tmp.path().join("MSBuild");
        fs::create_dir_all(msbuild.join("14.0").join("Bin")).unwrap();
        fs::create_dir_all(msbuild.join("1x").join("Bin")).unwrap();
        fs::create_dir_all(msbuild.join("1-preview").join("Bin")).unwrap();

        assert_eq!(legacy_version(tmp.path()), ToolsVersion::new(14, 0));
    }

    #[test]
    fn test_listing_cache_reuses_first_walk() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("Bin/MSBuild.exe"));

        let cache = ListingCache::new();
        assert!(cache.is_empty());
        let first = cache.executables(tmp.path());
        assert_eq!(first.len(), 1);

        // Later changes on disk are not seen through the cache.
        touch(&tmp.path().join("Bin/amd64/MSBuild.exe"));
        let second = cache.executables(tmp.path());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }
}
