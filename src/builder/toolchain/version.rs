//! MSBuild tools versions and the version registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize, Serializer};

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\.\d+").unwrap());

/// A numeric tools version, compared on `major` then `minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolsVersion {
    pub major: u32,
    pub minor: u32,
}

impl ToolsVersion {
    /// Version used when nothing better can be determined.
    pub const FALLBACK: ToolsVersion = ToolsVersion::new(4, 0);

    pub const fn new(major: u32, minor: u32) -> Self {
        ToolsVersion { major, minor }
    }

    /// Build a version from a number, rounded to one decimal place.
    pub fn from_number(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let formatted = format!("{:.1}", value);
        let (major, minor) = formatted.split_once('.')?;
        Some(ToolsVersion::new(major.parse().ok()?, minor.parse().ok()?))
    }

    /// Parse `"12"`, `"12.0"` or `"3.5"`.
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse::<f64>().ok().and_then(Self::from_number)
    }

    /// Extract the version from `MSBuild.exe /version` output.
    ///
    /// Only the major component is kept; the build tool reports versions
    /// like `16.11.2.50704`.
    pub fn from_version_output(output: &str) -> Option<Self> {
        let major = VERSION_RE.captures(output)?.get(1)?.as_str().parse().ok()?;
        Some(ToolsVersion::new(major, 0))
    }
}

impl fmt::Display for ToolsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The `toolsVersion` option: a concrete version, `auto`, or something unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolsVersionSelector {
    Auto,
    Version(ToolsVersion),
    Invalid(String),
}

impl ToolsVersionSelector {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("auto") {
            return ToolsVersionSelector::Auto;
        }
        match ToolsVersion::parse(s) {
            Some(version) => ToolsVersionSelector::Version(version),
            None => ToolsVersionSelector::Invalid(s.to_string()),
        }
    }

    /// Value passed to `/toolsversion:`; anything non-numeric becomes `4.0`.
    pub fn argument_value(&self) -> ToolsVersion {
        match self {
            ToolsVersionSelector::Version(version) => *version,
            _ => ToolsVersion::FALLBACK,
        }
    }
}

impl fmt::Display for ToolsVersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolsVersionSelector::Auto => f.write_str("auto"),
            ToolsVersionSelector::Version(version) => write!(f, "{}", version),
            ToolsVersionSelector::Invalid(raw) => f.write_str(raw),
        }
    }
}

impl From<ToolsVersion> for ToolsVersionSelector {
    fn from(version: ToolsVersion) -> Self {
        ToolsVersionSelector::Version(version)
    }
}

impl Serialize for ToolsVersionSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ToolsVersionSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Integer(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Integer(n) => match u32::try_from(n) {
                Ok(major) => ToolsVersionSelector::Version(ToolsVersion::new(major, 0)),
                Err(_) => ToolsVersionSelector::Invalid(n.to_string()),
            },
            Raw::Float(f) => match ToolsVersion::from_number(f) {
                Some(version) => ToolsVersionSelector::Version(version),
                None => ToolsVersionSelector::Invalid(f.to_string()),
            },
            Raw::Text(s) if s.trim().is_empty() => {
                return Err(D::Error::custom("toolsVersion must not be empty"))
            }
            Raw::Text(s) => ToolsVersionSelector::parse(&s),
        })
    }
}

/// Folder name used by MSBuild 16 and newer inside a Visual Studio install.
pub const CURRENT_TAG: &str = "Current";

const STATIC_VERSIONS: &[(ToolsVersion, &str)] = &[
    (ToolsVersion::new(1, 0), "v1.0.3705"),
    (ToolsVersion::new(1, 1), "v1.1.4322"),
    (ToolsVersion::new(2, 0), "v2.0.50727"),
    (ToolsVersion::new(3, 5), "v3.5"),
    (ToolsVersion::new(4, 0), "v4.0.30319"),
    (ToolsVersion::new(12, 0), "12.0"),
    (ToolsVersion::new(14, 0), "14.0"),
    (ToolsVersion::new(15, 0), "15.0"),
    (ToolsVersion::new(16, 0), CURRENT_TAG),
    (ToolsVersion::new(17, 0), CURRENT_TAG),
];

/// Map from tools version to the folder tag MSBuild is installed under.
///
/// Seeded with the versions known ahead of time and extended with versions
/// found by auto-detection.
#[derive(Debug, Clone)]
pub struct VersionRegistry {
    entries: BTreeMap<ToolsVersion, String>,
}

impl Default for VersionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionRegistry {
    pub fn new() -> Self {
        VersionRegistry {
            entries: STATIC_VERSIONS
                .iter()
                .map(|(version, tag)| (*version, tag.to_string()))
                .collect(),
        }
    }

    /// Folder tag for `version`, if known.
    pub fn lookup(&self, version: ToolsVersion) -> Option<&str> {
        self.entries.get(&version).map(String::as_str)
    }

    pub fn contains(&self, version: ToolsVersion) -> bool {
        self.entries.contains_key(&version)
    }

    /// Add a detected version. Existing entries are left alone.
    ///
    /// Returns `true` if the version was not known before.
    pub fn register(&mut self, version: ToolsVersion, tag: impl Into<String>) -> bool {
        if self.entries.contains_key(&version) {
            return false;
        }
        self.entries.insert(version, tag.into());
        true
    }

    /// Newest version that shipped before this registry was built.
    pub fn newest_static_modern() -> ToolsVersion {
        STATIC_VERSIONS
            .iter()
            .map(|(version, _)| *version)
            .max()
            .unwrap_or(ToolsVersion::FALLBACK)
    }
}
