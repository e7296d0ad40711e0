//! Project configuration types (xc8pp.toml format).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{BuildError, CONFIG_FILE_NAME};

/// Root project configuration. Every section falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectMeta,

    /// Device and preprocessor settings.
    #[serde(default)]
    pub target: TargetConfig,

    /// How the declaration front end is invoked.
    #[serde(default)]
    pub frontend: FrontendConfig,

    /// Output layout.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Project metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    /// Project name, used in generated banners.
    #[serde(default)]
    pub name: Option<String>,
}

/// Target device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// PIC device name (e.g. "PIC16F876A").
    #[serde(default = "default_device")]
    pub device: String,

    /// Oscillator frequency in Hz, emitted as `_XTAL_FREQ`.
    #[serde(default = "default_xtal_freq")]
    pub xtal_freq: u64,

    /// Include directories handed to the front end.
    #[serde(default)]
    pub includes: Vec<String>,

    /// Preprocessor definitions (`NAME` or `NAME=VALUE`).
    #[serde(default)]
    pub defines: Vec<String>,
}

/// Front-end invocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Compiler executable producing the declaration dump.
    #[serde(default = "default_clang")]
    pub clang: String,

    /// Language standard passed as `-std=`.
    #[serde(default = "default_std")]
    pub std: String,

    /// Seconds before a front-end run is killed.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Synthesize stand-in device headers when the real ones are absent.
    #[serde(default = "default_true")]
    pub stubs: bool,

    /// Extra arguments appended to the front-end command line.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Output layout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// File name of the shared header written in batch mode.
    #[serde(default = "default_shared_header")]
    pub shared_header: String,

    /// Include `<xc.h>` in generated translation units.
    #[serde(default = "default_true")]
    pub device_header: bool,
}

fn default_device() -> String {
    "PIC16F876A".to_string()
}

fn default_xtal_freq() -> u64 {
    4_000_000
}

fn default_clang() -> String {
    "clang".to_string()
}

fn default_std() -> String {
    "c++17".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_shared_header() -> String {
    "shared_definitions.h".to_string()
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            xtal_freq: default_xtal_freq(),
            includes: Vec::new(),
            defines: Vec::new(),
        }
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            clang: default_clang(),
            std: default_std(),
            timeout_secs: default_timeout(),
            stubs: true,
            extra_args: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            shared_header: default_shared_header(),
            device_header: true,
        }
    }
}

/// Values given on the command line. `None` and empty lists leave the file value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub device: Option<String>,
    pub includes: Vec<String>,
    pub defines: Vec<String>,
    pub clang: Option<String>,
    pub timeout_secs: Option<u64>,
    pub no_stubs: bool,
}

impl ProjectConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ProjectConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Look for `xc8pp.toml` in `dir` and its ancestors.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .map(|d| d.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Reject values the front end cannot work with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.target.device.trim().is_empty() {
            return Err(BuildError::Validation("target.device must not be empty".into()));
        }
        if self.frontend.timeout_secs == 0 {
            return Err(BuildError::Validation(
                "frontend.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.output.shared_header.contains('/') || self.output.shared_header.contains('\\') {
            return Err(BuildError::Validation(format!(
                "output.shared_header must be a bare file name, got `{}`",
                self.output.shared_header
            )));
        }
        Ok(())
    }

    /// Apply command-line values on top of the file. Lists are appended.
    pub fn merge_cli(&mut self, cli: &CliOverrides) {
        if let Some(device) = &cli.device {
            self.target.device = device.clone();
        }
        self.target.includes.extend(cli.includes.iter().cloned());
        self.target.defines.extend(cli.defines.iter().cloned());
        if let Some(clang) = &cli.clang {
            self.frontend.clang = clang.clone();
        }
        if let Some(timeout) = cli.timeout_secs {
            self.frontend.timeout_secs = timeout;
        }
        if cli.no_stubs {
            self.frontend.stubs = false;
        }
    }

    /// Whether a define for `name` is already present.
    pub fn defines_macro(&self, name: &str) -> bool {
        self.target
            .defines
            .iter()
            .any(|d| d.split('=').next() == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[project]
name = "arduino-multi"

[target]
device = "PIC18F4550"
xtal_freq = 8000000
includes = ["include"]
defines = ["DEBUG=1"]

[frontend]
clang = "clang-17"
timeout_secs = 10
stubs = false

[output]
shared_header = "common.h"
device_header = false
        "#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.project.name.as_deref(), Some("arduino-multi"));
        assert_eq!(config.target.device, "PIC18F4550");
        assert_eq!(config.target.xtal_freq, 8_000_000);
        assert_eq!(config.target.includes, vec!["include"]);
        assert_eq!(config.frontend.clang, "clang-17");
        assert_eq!(config.frontend.std, "c++17");
        assert!(!config.frontend.stubs);
        assert_eq!(config.output.shared_header, "common.h");
        assert!(!config.output.device_header);
        assert!(config.defines_macro("DEBUG"));
        assert!(!config.defines_macro("_XTAL_FREQ"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ProjectConfig = toml::from_str("").unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.target.device, "PIC16F876A");
        assert_eq!(config.target.xtal_freq, 4_000_000);
        assert_eq!(config.frontend.timeout_secs, 60);
        assert!(config.output.device_header);
    }

    #[test]
    fn test_merge_cli() {
        let mut config = ProjectConfig::default();
        config.target.includes.push("lib".to_string());

        config.merge_cli(&CliOverrides {
            device: Some("PIC16F877A".to_string()),
            includes: vec!["src".to_string()],
            defines: vec!["LED_COUNT=4".to_string()],
            timeout_secs: Some(5),
            no_stubs: true,
            ..Default::default()
        });

        assert_eq!(config.target.device, "PIC16F877A");
        assert_eq!(config.target.includes, vec!["lib", "src"]);
        assert_eq!(config.target.defines, vec!["LED_COUNT=4"]);
        assert_eq!(config.frontend.timeout_secs, 5);
        assert_eq!(config.frontend.clang, "clang");
        assert!(!config.frontend.stubs);
    }

    #[test]
    fn test_validation() {
        let mut config = ProjectConfig::default();
        config.frontend.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(BuildError::Validation(_))));

        let mut config = ProjectConfig::default();
        config.output.shared_header = "out/shared.h".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_and_discover() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("src");
        std::fs::create_dir(&nested).unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[target]\ndevice = \"PIC16F84A\"\n").unwrap();

        assert_eq!(ProjectConfig::discover(&nested), Some(path.clone()));
        let config = ProjectConfig::from_file(&path).unwrap();
        assert_eq!(config.target.device, "PIC16F84A");
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[target\n").unwrap();
        assert!(matches!(
            ProjectConfig::from_file(&path),
            Err(BuildError::ParseToml(_))
        ));
    }
}
