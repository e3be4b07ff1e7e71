//! Configuration system for fanout
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (FANOUT_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Task runner settings
    pub runner: RunnerSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Task runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Executable that hosts the tasks (defaults to the current executable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_program: Option<String>,

    /// Extra arguments passed to every worker process
    pub worker_args: Vec<String>,

    /// Per-task timeout in milliseconds (0 = wait indefinitely)
    pub task_timeout_ms: u64,

    /// Let workers write to the parent's stderr
    pub inherit_stderr: bool,

    /// Task count above which a warning is logged (0 = 4 x CPU count)
    pub concurrency_warning: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            worker_program: None,
            worker_args: Vec::new(),
            task_timeout_ms: 0,
            inherit_stderr: true,
            concurrency_warning: 0,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl RunnerSettings {
    /// Effective warning threshold, resolving 0 to 4 x CPU count
    pub fn effective_concurrency_warning(&self) -> usize {
        if self.concurrency_warning > 0 {
            self.concurrency_warning
        } else {
            num_cpus::get() * 4
        }
    }
}

impl FanoutConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            config = Self::from_file(&path)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without overrides or validation
    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::config_parse(format!("{}: {}", path.display(), e.message()), Some(e))
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // An explicit path must exist
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("fanout.toml"),
            dirs::config_dir()
                .map(|p| p.join("fanout").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".fanout").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FANOUT_WORKER_PROGRAM") {
            self.runner.worker_program = Some(val);
        }
        if let Ok(val) = std::env::var("FANOUT_TASK_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                self.runner.task_timeout_ms = n;
            }
        }
        if let Ok(val) = std::env::var("FANOUT_INHERIT_STDERR") {
            self.runner.inherit_stderr = parse_bool(&val);
        }
        if let Ok(val) = std::env::var("FANOUT_CONCURRENCY_WARNING") {
            if let Ok(n) = val.parse() {
                self.runner.concurrency_warning = n;
            }
        }

        if let Ok(val) = std::env::var("FANOUT_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("FANOUT_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("FANOUT_LOG_JSON") {
            self.logging.json_format = parse_bool(&val);
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref program) = self.runner.worker_program {
            self.runner.worker_program = Some(expand_path(program));
        }
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if let Some(ref program) = self.runner.worker_program {
            if program.trim().is_empty() {
                return Err(Error::config_field_invalid(
                    "runner.worker_program",
                    "worker_program cannot be empty",
                ));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        if self.logging.max_files == 0 {
            return Err(Error::config_field_invalid(
                "logging.max_files",
                "max_files must be at least 1",
            ));
        }

        Ok(())
    }
}

fn parse_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

/// Expand a path with shell-like expansion
fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).to_string()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".fanout")
                .join("config.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# fanout configuration

[runner]
# Executable that hosts the tasks (defaults to the running executable)
# worker_program = "/usr/local/bin/fanout"

# Extra arguments passed to every worker process
worker_args = []

# Per-task timeout in milliseconds (0 = wait indefinitely)
task_timeout_ms = 0

# Let workers write diagnostics to this process's stderr
inherit_stderr = true

# Warn when a single run starts more workers than this (0 = 4 x CPU count).
# Every task always gets its own process; this only controls the warning.
concurrency_warning = 0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.fanout/logs/fanout.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = FanoutConfig::default();
        assert!(config.runner.worker_program.is_none());
        assert_eq!(config.runner.task_timeout_ms, 0);
        assert!(config.runner.inherit_stderr);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_override() {
        env::set_var("FANOUT_TASK_TIMEOUT_MS", "2500");
        env::set_var("FANOUT_INHERIT_STDERR", "false");
        env::set_var("FANOUT_LOG_LEVEL", "debug");

        let mut config = FanoutConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.runner.task_timeout_ms, 2500);
        assert!(!config.runner.inherit_stderr);
        assert_eq!(config.logging.level, "debug");

        env::remove_var("FANOUT_TASK_TIMEOUT_MS");
        env::remove_var("FANOUT_INHERIT_STDERR");
        env::remove_var("FANOUT_LOG_LEVEL");
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = FanoutConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_worker_program() {
        let mut config = FanoutConfig::default();
        config.runner.worker_program = Some("  ".to_string());
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::ConfigValidation { field: Some(ref f), .. } if f == "runner.worker_program"
        ));
    }

    #[test]
    fn test_concurrency_warning_resolves_auto() {
        let mut settings = RunnerSettings::default();
        assert_eq!(settings.effective_concurrency_warning(), num_cpus::get() * 4);
        settings.concurrency_warning = 7;
        assert_eq!(settings.effective_concurrency_warning(), 7);
    }

    #[test]
    fn test_path_expansion() {
        let mut config = FanoutConfig::default();
        config.logging.file = Some("~/logs/fanout.log".to_string());
        config.expand_paths();
        assert!(!config.logging.file.unwrap().contains('~'));
    }

    #[test]
    fn test_parse_config_file() {
        let config: FanoutConfig = toml::from_str(
            r#"
[runner]
worker_program = "/opt/tasks/bin/host"
worker_args = ["--quiet"]
task_timeout_ms = 1500

[logging]
level = "warn"
"#,
        )
        .unwrap();

        assert_eq!(config.runner.worker_program.as_deref(), Some("/opt/tasks/bin/host"));
        assert_eq!(config.runner.worker_args, vec!["--quiet"]);
        assert_eq!(config.runner.task_timeout_ms, 1500);
        assert!(config.runner.inherit_stderr);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_generated_config_parses() {
        let config: FanoutConfig = toml::from_str(&generate_default_config()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fanout.toml");
        let path_str = path.to_str().unwrap();

        init_config(Some(path_str), false).unwrap();
        assert!(path.exists());
        assert!(init_config(Some(path_str), false).is_err());
        assert!(init_config(Some(path_str), true).is_ok());
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let err = FanoutConfig::load(Some("/definitely/not/here/fanout.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }
}
