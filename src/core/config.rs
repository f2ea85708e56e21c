//! The resolved set of options controlling one MSBuild invocation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};

use crate::builder::toolchain::version::ToolsVersionSelector;
use crate::core::errors::ConfigError;

/// Target used when none is configured.
pub const DEFAULT_TARGET: &str = "Rebuild";

/// Every option name a configuration file may set.
pub const OPTION_NAMES: &[&str] = &[
    "targets",
    "configuration",
    "solutionPlatform",
    "properties",
    "customArgs",
    "verbosity",
    "nologo",
    "maxcpucount",
    "nodeReuse",
    "loggerParameters",
    "fileLoggerParameters",
    "consoleLoggerParameters",
    "toolsVersion",
    "platform",
    "architecture",
    "windir",
    "msbuildPath",
    "errorOnFail",
    "logCommand",
    "stdout",
    "stderr",
    "emitPublishedFiles",
    "publishDirectory",
];

/// Properties that may name the publish location when `publishDirectory` is unset.
const PUBLISH_PROPERTIES: &[&str] = &["PublishUrl", "PublishDir"];

/// CPU architecture of the MSBuild to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X86,
    X64,
}

impl Architecture {
    /// Architecture of the current host.
    pub fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            Architecture::X64
        } else {
            Architecture::X86
        }
    }

    pub fn is_64bit(self) -> bool {
        self == Architecture::X64
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86 => f.write_str("x86"),
            Architecture::X64 => f.write_str("x64"),
        }
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86" => Ok(Architecture::X86),
            "x64" => Ok(Architecture::X64),
            _ => Err(format!(
                "invalid architecture '{}'; expected 'x86' or 'x64'",
                s
            )),
        }
    }
}

/// Host platform name in the `win32`/`linux`/`darwin` convention.
pub fn host_platform() -> String {
    match std::env::consts::OS {
        "windows" => "win32".to_string(),
        "macos" => "darwin".to_string(),
        other => other.to_string(),
    }
}

fn default_windir() -> PathBuf {
    std::env::var_os("WINDIR")
        .or_else(|| std::env::var_os("windir"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("C:/Windows"))
}

/// Options for building one project or solution file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildConfiguration {
    /// Targets to build, joined with `;` on the command line
    pub targets: Vec<String>,

    /// Build configuration, passed as the `Configuration` property
    pub configuration: Option<String>,

    /// Passed as the `Platform` property
    pub solution_platform: Option<String>,

    /// Extra `/property:` values
    #[serde(deserialize_with = "deserialize_properties")]
    pub properties: BTreeMap<String, String>,

    /// Raw arguments appended after everything else
    pub custom_args: Vec<String>,

    pub verbosity: String,
    pub nologo: bool,

    /// `None` or negative: omit. `0`: bare `/maxcpucount`.
    #[serde(rename = "maxcpucount")]
    pub max_cpu_count: Option<i32>,

    pub node_reuse: bool,
    pub logger_parameters: Option<String>,
    pub file_logger_parameters: Option<String>,
    pub console_logger_parameters: Option<String>,

    pub tools_version: Option<ToolsVersionSelector>,

    /// Host OS family (`win32`, `linux`, `darwin`, ...)
    pub platform: String,

    pub architecture: Architecture,

    /// Windows directory holding the .NET Framework MSBuild installs
    pub windir: PathBuf,

    /// Explicit MSBuild executable; skips resolution when set
    pub msbuild_path: Option<PathBuf>,

    pub error_on_fail: bool,
    pub log_command: bool,
    pub stdout: bool,
    pub stderr: bool,

    /// Report files under the publish location after a successful build
    pub emit_published_files: bool,
    pub publish_directory: Option<PathBuf>,
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        BuildConfiguration {
            targets: vec![DEFAULT_TARGET.to_string()],
            configuration: Some("Release".to_string()),
            solution_platform: None,
            properties: BTreeMap::new(),
            custom_args: Vec::new(),
            verbosity: "normal".to_string(),
            nologo: true,
            max_cpu_count: None,
            node_reuse: true,
            logger_parameters: None,
            file_logger_parameters: None,
            console_logger_parameters: None,
            tools_version: Some(ToolsVersionSelector::Auto),
            platform: host_platform(),
            architecture: Architecture::host(),
            windir: default_windir(),
            msbuild_path: None,
            error_on_fail: false,
            log_command: false,
            stdout: false,
            stderr: true,
            emit_published_files: false,
            publish_directory: None,
        }
    }
}

impl BuildConfiguration {
    /// Parse a configuration from TOML, filling in defaults.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Self::from_table(contents.parse::<toml::Table>()?)
    }

    /// Build a configuration from an already merged TOML table.
    ///
    /// Unknown keys are rejected with the closest known option name, if any.
    pub fn from_table(table: toml::Table) -> Result<Self, ConfigError> {
        if let Some(name) = table.keys().find(|key| !OPTION_NAMES.contains(&key.as_str())) {
            return Err(ConfigError::UnknownOption {
                suggestion: suggest_option(name),
                name: name.clone(),
            });
        }

        let config: BuildConfiguration = toml::Value::Table(table).try_into()?;
        Ok(config.with_default_targets())
    }

    /// Replace an empty target list with the default target.
    pub fn with_default_targets(mut self) -> Self {
        if self.targets.is_empty() {
            self.targets.push(DEFAULT_TARGET.to_string());
        }
        self
    }

    /// Targets to pass to MSBuild; never empty.
    pub fn effective_targets(&self) -> Vec<&str> {
        if self.targets.is_empty() {
            vec![DEFAULT_TARGET]
        } else {
            self.targets.iter().map(String::as_str).collect()
        }
    }

    pub fn is_windows(&self) -> bool {
        self.platform.starts_with("win")
    }

    /// Linux and macOS, where Mono or .NET may provide `msbuild`.
    pub fn is_unix_like(&self) -> bool {
        self.platform.contains("linux") || self.platform.contains("darwin")
    }

    /// Directory scanned for published files.
    ///
    /// `publishDirectory` wins over a `PublishUrl`/`PublishDir` property.
    pub fn publish_location(&self) -> Option<&Path> {
        if let Some(dir) = &self.publish_directory {
            return Some(dir);
        }
        PUBLISH_PROPERTIES.iter().find_map(|wanted| {
            self.properties
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| Path::new(value.as_str()))
        })
    }
}

/// The known option closest to `name`, if it is close enough to be a typo.
pub fn suggest_option(name: &str) -> Option<&'static str> {
    let wanted = name.to_lowercase();
    let max_distance = (wanted.chars().count() / 3).max(1);

    OPTION_NAMES
        .iter()
        .map(|option| (strsim::damerau_levenshtein(&wanted, &option.to_lowercase()), *option))
        .filter(|(distance, _)| *distance <= max_distance)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, option)| option)
}

/// Accept scalar property values of any TOML type and keep them as text.
fn deserialize_properties<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, toml::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, value)| {
            let text = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    return Err(D::Error::custom(format!(
                        "property `{}` must be a string, number or boolean, found {}",
                        name,
                        other.type_str()
                    )))
                }
            };
            Ok((name, text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::version::ToolsVersion;

    #[test]
    fn test_defaults() {
        let config = BuildConfiguration::default();
        assert_eq!(config.targets, vec!["Rebuild"]);
        assert_eq!(config.configuration.as_deref(), Some("Release"));
        assert_eq!(config.verbosity, "normal");
        assert!(config.nologo);
        assert_eq!(config.max_cpu_count, None);
        assert_eq!(config.tools_version, Some(ToolsVersionSelector::Auto));
        assert!(config.stderr);
        assert!(!config.stdout);
        assert!(!config.error_on_fail);
    }

    #[test]
    fn test_from_toml() {
        let config = BuildConfiguration::from_toml(
            r#"
            targets = ["Clean", "Build"]
            configuration = "Debug"
            toolsVersion = 14
            maxcpucount = 4
            platform = "win32"
            architecture = "x86"

            [properties]
            WarningLevel = 2
            TreatWarningsAsErrors = true
            "#,
        )
        .unwrap();

        assert_eq!(config.targets, vec!["Clean", "Build"]);
        assert_eq!(config.configuration.as_deref(), Some("Debug"));
        assert_eq!(
            config.tools_version,
            Some(ToolsVersionSelector::Version(ToolsVersion::new(14, 0)))
        );
        assert_eq!(config.max_cpu_count, Some(4));
        assert_eq!(config.architecture, Architecture::X86);
        assert_eq!(config.properties["WarningLevel"], "2");
        assert_eq!(config.properties["TreatWarningsAsErrors"], "true");
        assert!(config.nologo);
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = BuildConfiguration::from_toml("toolsversion = 12").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown option 'toolsversion'! Did you mean 'toolsVersion'?"
        );

        let err = BuildConfiguration::from_toml("colour = true").unwrap_err();
        assert_eq!(err.to_string(), "Unknown option 'colour'!");
    }

    #[test]
    fn test_suggest_option() {
        assert_eq!(suggest_option("toolVersion"), Some("toolsVersion"));
        assert_eq!(suggest_option("errorOnFial"), Some("errorOnFail"));
        assert_eq!(suggest_option("maxCpuCount"), Some("maxcpucount"));
        assert_eq!(suggest_option("target"), Some("targets"));
        assert_eq!(suggest_option("somethingElse"), None);
    }

    #[test]
    fn test_option_names_match_schema() {
        let config = BuildConfiguration {
            solution_platform: Some("Any CPU".into()),
            max_cpu_count: Some(2),
            logger_parameters: Some("logger".into()),
            file_logger_parameters: Some("flp".into()),
            console_logger_parameters: Some("clp".into()),
            msbuild_path: Some(PathBuf::from("msbuild")),
            publish_directory: Some(PathBuf::from("publish")),
            ..Default::default()
        };
        let table = toml::Table::try_from(&config).unwrap();

        let mut serialized: Vec<&str> = table.keys().map(String::as_str).collect();
        let mut known = OPTION_NAMES.to_vec();
        serialized.sort_unstable();
        known.sort_unstable();
        assert_eq!(serialized, known);

        assert_eq!(BuildConfiguration::from_table(table).unwrap(), config);
    }

    #[test]
    fn test_nested_property_rejected() {
        let err = BuildConfiguration::from_toml("[properties.Nested]\nA = 1").unwrap_err();
        assert!(err.to_string().contains("property `Nested`"));
    }

    #[test]
    fn test_empty_targets_fall_back() {
        let config = BuildConfiguration::from_toml("targets = []").unwrap();
        assert_eq!(config.targets, vec![DEFAULT_TARGET]);

        let raw = BuildConfiguration {
            targets: Vec::new(),
            ..Default::default()
        };
        assert_eq!(raw.effective_targets(), vec![DEFAULT_TARGET]);
    }

    #[test]
    fn test_platform_families() {
        let mut config = BuildConfiguration {
            platform: "win32".into(),
            ..Default::default()
        };
        assert!(config.is_windows());
        assert!(!config.is_unix_like());

        config.platform = "darwin".into();
        assert!(!config.is_windows());
        assert!(config.is_unix_like());

        config.platform = "freebsd".into();
        assert!(!config.is_windows());
        assert!(!config.is_unix_like());
    }

    #[test]
    fn test_publish_location() {
        let mut config = BuildConfiguration::default();
        assert_eq!(config.publish_location(), None);

        config
            .properties
            .insert("publishUrl".into(), "out/site".into());
        assert_eq!(config.publish_location(), Some(Path::new("out/site")));

        config.publish_directory = Some(PathBuf::from("dist"));
        assert_eq!(config.publish_location(), Some(Path::new("dist")));
    }

    #[test]
    fn test_architecture_from_str() {
        assert_eq!("X64".parse::<Architecture>(), Ok(Architecture::X64));
        assert!("arm".parse::<Architecture>().is_err());
        assert_eq!(Architecture::X86.to_string(), "x86");
    }
}
