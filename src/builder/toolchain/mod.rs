//! MSBuild toolchain discovery.
//!
//! Resolution order for a build:
//! 1. An explicit `msbuildPath` skips discovery entirely
//! 2. Linux/macOS hosts use `msbuild` from PATH, else `xbuild`
//! 3. Windows hosts look for Visual Studio installations, legacy
//!    `MSBuild/<version>` folders, then the .NET Framework directory

pub mod detect;
pub mod finder;
pub mod probe;
pub mod version;

pub use detect::ListingCache;
pub use finder::{is_legacy_fallback, MsBuildFinder, Resolution, XBUILD};
pub use probe::{HostEnvironment, HostProbe, SystemProbe};
pub use version::{ToolsVersion, ToolsVersionSelector, VersionRegistry};
