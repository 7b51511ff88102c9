//! Application configuration.
//!
//! Configuration is read once at startup from a TOML file and passed down
//! explicitly; nothing here is global. Only `home_directory` is required.
//!
//! # Configuration File Format
//!
//! ```toml
//! [checker]
//! home_directory = "/home/user"
//!
//! [notifications]
//! enabled = true
//! icon = "go-down"
//! timeout_ms = 10000
//!
//! [logging]
//! file = "logs/default.log"
//! max_bytes = 5242880
//! backup_count = 3
//! level = "info"
//!
//! [filters.exclude]
//! patterns = ["*.crdownload", "*.part"]
//! regex = []
//!
//! [[categories]]
//! name = "Archives"
//! extensions = ["zip", "7z"]
//! ```

use crate::file_category::{Category, CategoryRegistry, RegistryError};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".downsortrc.toml";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// IO error while reading configuration.
    #[error("IO error reading configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration in {origin}: {source}")]
    ConfigInvalid {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    /// `checker.home_directory` is not set.
    #[error("Missing required setting checker.home_directory")]
    MissingHomeDirectory,

    /// `checker.home_directory` is not an absolute path.
    #[error("home_directory must be an absolute path, got {}", .0.display())]
    RelativeHomeDirectory(PathBuf),

    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidGlobPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Invalid regex pattern provided.
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegexPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A user-defined category clashes with another one.
    #[error(transparent)]
    Category(#[from] RegistryError),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub checker: CheckerConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub filters: FilterRules,

    /// Categories added on top of the built-in ones.
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,

    /// File this configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Directory holding `Downloads` and the category directories.
    pub home_directory: Option<PathBuf>,
}

/// Desktop notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_icon")]
    pub icon: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            icon: default_icon(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Log file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file path. Relative paths resolve against the configuration
    /// file's directory.
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Size at which the log file is rotated.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Number of rotated files kept next to the active one.
    #[serde(default = "default_backup_count")]
    pub backup_count: usize,

    /// Level filter in `tracing` directive syntax; `RUST_LOG` wins over it.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            max_bytes: default_max_bytes(),
            backup_count: default_backup_count(),
            level: default_level(),
        }
    }
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    #[serde(default)]
    pub exclude: ExcludeRules,
}

/// File names that are never moved, even if their extension is claimed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Glob patterns matched against the file name (e.g. "*.part").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// A user-defined category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,

    /// Destination directory under the home directory; defaults to `name`.
    #[serde(default)]
    pub destination: Option<PathBuf>,

    pub extensions: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_icon() -> String {
    "go-down".to_string()
}

fn default_timeout_ms() -> u32 {
    10_000
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs").join("default.log")
}

fn default_max_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_backup_count() -> usize {
    3
}

fn default_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.downsortrc.toml` in the current directory
    /// 3. Look for `~/.config/downsort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// The defaults have no home directory, so [`AppConfig::home_directory`]
    /// fails on them unless one is set afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any file found cannot be parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("downsort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid {
            origin: path.display().to_string(),
            source: e,
        })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid {
            origin: "<inline>".to_string(),
            source: e,
        })
    }

    /// Overrides the configured home directory.
    pub fn with_home_directory(mut self, home: impl Into<PathBuf>) -> Self {
        self.checker.home_directory = Some(home.into());
        self
    }

    /// Returns the validated home directory.
    ///
    /// # Errors
    ///
    /// Fails if the setting is absent or not absolute.
    pub fn home_directory(&self) -> Result<&Path, ConfigError> {
        let home = self
            .checker
            .home_directory
            .as_deref()
            .ok_or(ConfigError::MissingHomeDirectory)?;
        if !home.is_absolute() {
            return Err(ConfigError::RelativeHomeDirectory(home.to_path_buf()));
        }
        Ok(home)
    }

    /// Directory being watched: `<home_directory>/Downloads`.
    pub fn watch_root(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.home_directory()?.join("Downloads"))
    }

    /// Resolved path of the log file.
    pub fn log_file(&self) -> PathBuf {
        if self.logging.file.is_absolute() {
            return self.logging.file.clone();
        }
        match self.source.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(&self.logging.file),
            None => self.logging.file.clone(),
        }
    }

    /// Builds the category registry: the built-ins followed by user categories.
    pub fn registry(&self) -> Result<CategoryRegistry, ConfigError> {
        let mut registry = CategoryRegistry::builtin();
        for custom in &self.categories {
            let destination = custom
                .destination
                .clone()
                .unwrap_or_else(|| PathBuf::from(&custom.name));
            registry = registry.with_category(Category::new(
                custom.name.clone(),
                destination,
                &custom.extensions,
            ))?;
        }
        Ok(registry)
    }

    /// Compile the exclusion rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Compiled exclusion rules.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = rules
            .exclude
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
                    pattern: pattern.clone(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            exclude_patterns,
            exclude_regexes,
        })
    }

    /// Check if a file may be moved (its name matches no exclusion rule).
    pub fn should_include(&self, file_path: &Path) -> bool {
        let Some(file_name) = file_path.file_name().map(|n| n.to_string_lossy()) else {
            return true;
        };

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches(&file_name))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    pub fn is_empty(&self) -> bool {
        self.exclude_patterns.is_empty() && self.exclude_regexes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let config = AppConfig::from_toml_str(
            r#"
            [checker]
            home_directory = "/home/u"
            "#,
        )
        .unwrap();

        assert_eq!(config.home_directory().unwrap(), Path::new("/home/u"));
        assert_eq!(config.watch_root().unwrap(), PathBuf::from("/home/u/Downloads"));
        assert!(config.notifications.enabled);
        assert_eq!(config.notifications.icon, "go-down");
        assert_eq!(config.notifications.timeout_ms, 10_000);
        assert_eq!(config.logging.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.logging.backup_count, 3);
        assert!(config.compile_filters().unwrap().is_empty());
    }

    #[test]
    fn test_missing_home_directory() {
        let config = AppConfig::from_toml_str("[notifications]\nenabled = false\n").unwrap();
        assert!(matches!(
            config.home_directory(),
            Err(ConfigError::MissingHomeDirectory)
        ));
    }

    #[test]
    fn test_defaults_run_with_home_override() {
        let config = AppConfig::default();
        assert!(config.source.is_none());
        assert!(matches!(
            config.home_directory(),
            Err(ConfigError::MissingHomeDirectory)
        ));

        let config = config.with_home_directory("/home/u");
        assert_eq!(config.home_directory().unwrap(), Path::new("/home/u"));
        assert_eq!(config.watch_root().unwrap(), Path::new("/home/u/Downloads"));
        assert_eq!(config.registry().unwrap().len(), 4);
    }

    #[test]
    fn test_relative_home_directory_rejected() {
        let config = AppConfig::default().with_home_directory("relative/home");
        assert!(matches!(
            config.home_directory(),
            Err(ConfigError::RelativeHomeDirectory(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        let result = AppConfig::from_toml_str("[checker\nhome_directory = ");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_explicit_missing_file() {
        let result = AppConfig::load(Some(Path::new("/non/existent/downsort.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_load_from_file_resolves_log_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("downsort.toml");
        fs::write(
            &path,
            "[checker]\nhome_directory = \"/home/u\"\n\n[logging]\nfile = \"logs/app.log\"\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.log_file(), temp_dir.path().join("logs").join("app.log"));
    }

    #[test]
    fn test_custom_categories_extend_builtins() {
        let config = AppConfig::from_toml_str(
            r#"
            [checker]
            home_directory = "/home/u"

            [[categories]]
            name = "Archives"
            extensions = ["zip", "7z"]

            [[categories]]
            name = "Books"
            destination = "Documents/Books"
            extensions = ["epub"]
            "#,
        )
        .unwrap();

        let registry = config.registry().unwrap();
        assert_eq!(registry.len(), 6);
        assert_eq!(
            registry.destination_for("Archives"),
            Some(Path::new("Archives"))
        );
        assert_eq!(
            registry.destination_for("Books"),
            Some(Path::new("Documents/Books"))
        );
    }

    #[test]
    fn test_duplicate_custom_category() {
        let config = AppConfig::from_toml_str(
            r#"
            [[categories]]
            name = "Pictures"
            extensions = ["heic"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.registry(),
            Err(ConfigError::Category(RegistryError::DuplicateName(_)))
        ));
    }

    #[test]
    fn test_exclude_patterns_and_regex() {
        let config = AppConfig::from_toml_str(
            r#"
            [filters.exclude]
            patterns = ["*.part", "~*"]
            regex = ['^\.goutputstream-']
            "#,
        )
        .unwrap();
        let filters = config.compile_filters().unwrap();

        assert!(!filters.should_include(Path::new("/d/movie.mkv.part")));
        assert!(!filters.should_include(Path::new("/d/~lock.DOC")));
        assert!(!filters.should_include(Path::new("/d/.goutputstream-X1.png")));
        assert!(filters.should_include(Path::new("/d/movie.mkv")));
    }

    #[test]
    fn test_invalid_patterns_return_error() {
        let mut config = AppConfig::default();
        config.filters.exclude.patterns = vec!["[invalid".to_string()];
        assert!(matches!(
            config.compile_filters(),
            Err(ConfigError::InvalidGlobPattern { .. })
        ));

        let mut config = AppConfig::default();
        config.filters.exclude.regex = vec!["[invalid(".to_string()];
        assert!(matches!(
            config.compile_filters(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }
}
