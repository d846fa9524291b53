//! Project configuration (girscan.toml)
//!
//! Every field is optional; command-line flags override what the file says.
//!
//! ```toml
//! [namespace]
//! name = "Foo"
//! version = "1.0"
//! identifier-prefixes = ["Foo"]
//!
//! [scan]
//! units = ["build/foo.json"]
//! includes = ["GObject-2.0"]
//! dump = "build/foo-dump.xml"
//!
//! [warnings]
//! warn-all = true
//! disabled = ["missing-colon"]
//! ```

use crate::ast::Include;
use crate::diagnostic::{WarningCode, WarningConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default file name looked up in the working directory
pub const CONFIG_FILE: &str = "girscan.toml";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is present but unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A warning name or code that does not exist
    #[error("unknown warning '{0}'")]
    UnknownWarning(String),
}

/// `[namespace]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NamespaceConfig {
    /// Namespace name
    pub name: Option<String>,
    /// Namespace version
    pub version: Option<String>,
    /// C identifier prefixes; defaults to the name
    #[serde(default)]
    pub identifier_prefixes: Vec<String>,
    /// C symbol prefixes; derived from the identifier prefixes by default
    #[serde(default)]
    pub symbol_prefixes: Vec<String>,
    /// Keep symbols without any known prefix
    #[serde(default)]
    pub accept_unprefixed: bool,
}

/// `[scan]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScanConfig {
    /// Front-end output files
    #[serde(default)]
    pub units: Vec<PathBuf>,
    /// `Name-Version` dependencies
    #[serde(default)]
    pub includes: Vec<String>,
    /// Extra directories searched for included GIR files
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    /// pkg-config packages to export
    #[serde(default)]
    pub packages: Vec<String>,
    /// C headers to record
    #[serde(default)]
    pub c_includes: Vec<String>,
    /// Shared libraries holding the symbols
    #[serde(default)]
    pub shared_libraries: Vec<String>,
    /// Documentation format recorded in the output
    pub doc_format: Option<String>,
    /// A precomputed runtime type dump
    pub dump: Option<PathBuf>,
    /// Probe program and arguments
    #[serde(default)]
    pub probe: Vec<String>,
    /// Roots stripped from source file names in the output
    #[serde(default)]
    pub sources_top_dirs: Vec<PathBuf>,
    /// Output file
    pub output: Option<PathBuf>,
}

/// `[warnings]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WarningsConfig {
    /// Show regular warnings
    #[serde(default)]
    pub warn_all: bool,
    /// Show pedantic warnings
    #[serde(default)]
    pub strict: bool,
    /// Fail the run on any warning
    #[serde(default)]
    pub warn_error: bool,
    /// Warning names or codes to silence
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// Contents of `girscan.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Namespace identity
    #[serde(default)]
    pub namespace: NamespaceConfig,
    /// Inputs and output metadata
    #[serde(default)]
    pub scan: ScanConfig,
    /// Warning visibility
    #[serde(default)]
    pub warnings: WarningsConfig,
}

impl Config {
    /// Parse configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content)?;
        // relative paths are relative to the file
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.rebase(base);
        }
        Ok(config)
    }

    /// `girscan.toml` in `dir`, if there is one
    pub fn discover(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Self::from_file(&path).map(Some)
    }

    /// Parse configuration from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that TOML typing cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.namespace.name {
            if name.is_empty() || name.contains('.') || name.contains('-') {
                return Err(ConfigError::Invalid(format!(
                    "namespace name '{}' must be a non-empty identifier",
                    name
                )));
            }
        }
        if let Some(version) = &self.namespace.version {
            if version.is_empty() {
                return Err(ConfigError::Invalid("namespace version is empty".to_string()));
            }
        }
        self.includes()?;
        self.warning_config()?;
        Ok(())
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.scan.units.iter_mut().for_each(join);
        self.scan.include_paths.iter_mut().for_each(join);
        self.scan.sources_top_dirs.iter_mut().for_each(join);
        self.scan.dump.iter_mut().for_each(join);
        self.scan.output.iter_mut().for_each(join);
    }

    /// `[scan] includes` parsed as `Name-Version`
    pub fn includes(&self) -> Result<Vec<Include>, ConfigError> {
        self.scan
            .includes
            .iter()
            .map(|s| Include::from_string(s).map_err(|e| ConfigError::Invalid(e.to_string())))
            .collect()
    }

    /// `[warnings]` as a [`WarningConfig`]
    pub fn warning_config(&self) -> Result<WarningConfig, ConfigError> {
        let mut config = WarningConfig {
            warn_all: self.warnings.warn_all,
            strict: self.warnings.strict,
            warn_error: self.warnings.warn_error,
            ..WarningConfig::default()
        };
        for name in &self.warnings.disabled {
            let code = WarningCode::from_name(name)
                .ok_or_else(|| ConfigError::UnknownWarning(name.clone()))?;
            config.disabled.insert(code);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full() {
        let toml = r#"
[namespace]
name = "Foo"
version = "1.0"
identifier-prefixes = ["Foo", "Fo"]

[scan]
units = ["foo.json"]
includes = ["GObject-2.0"]
packages = ["foo-1.0"]
doc-format = "gi-docgen"

[warnings]
warn-all = true
disabled = ["missing-colon", "W2001"]
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.namespace.name.as_deref(), Some("Foo"));
        assert_eq!(config.namespace.identifier_prefixes, vec!["Foo", "Fo"]);
        assert_eq!(config.includes().unwrap(), vec![Include::new("GObject", "2.0")]);
        assert_eq!(config.scan.doc_format.as_deref(), Some("gi-docgen"));

        let warnings = config.warning_config().unwrap();
        assert!(warnings.warn_all);
        assert!(!warnings.strict);
        assert!(warnings.disabled.contains(&WarningCode::MissingColon));
        assert_eq!(warnings.disabled.len(), 2);
    }

    #[test]
    fn test_empty_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_warning() {
        let err = Config::parse("[warnings]\ndisabled = [\"no-such-warning\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownWarning(ref name) if name == "no-such-warning"));
    }

    #[test]
    fn test_malformed_include() {
        let err = Config::parse("[scan]\nincludes = [\"GObject\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(matches!(Config::parse("[output]\nx = 1\n"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_dotted_namespace_rejected() {
        let err = Config::parse("[namespace]\nname = \"Foo.Bar\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_relative_paths_follow_the_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[scan]\nunits = [\"unit.json\"]\ndump = \"/abs/dump.xml\"\n",
        )
        .unwrap();
        let config = Config::discover(dir.path()).unwrap().unwrap();
        assert_eq!(config.scan.units, vec![dir.path().join("unit.json")]);
        assert_eq!(config.scan.dump, Some(PathBuf::from("/abs/dump.xml")));
    }

    #[test]
    fn test_discover_without_file() {
        let dir = TempDir::new().unwrap();
        assert!(Config::discover(dir.path()).unwrap().is_none());
    }
}
