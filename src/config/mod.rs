/// Configuration system for history-tutor
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::analyzer::gemini::DEFAULT_ENDPOINT;
use crate::error::{ConfigError, TutorError};
use crate::history::HistoryOptions;
use crate::paths::PlatformPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the analyzer API key; never written to disk
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persist analyses and position between runs
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding one session file per repository
    #[serde(default = "default_sessions_dir")]
    pub directory: PathBuf,

    /// Keep going without persistence if the cache cannot be opened
    #[serde(default = "default_true")]
    pub degrade_on_failure: bool,
}

/// Analyzer (Gemini) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Base URL of the Generative Language API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Diff characters included in a commit prompt
    #[serde(default = "default_max_diff_chars")]
    pub max_diff_chars: usize,

    /// Files sampled from the first commit
    #[serde(default = "default_max_snapshot_files")]
    pub max_snapshot_files: usize,

    /// Larger files are skipped when sampling the first commit
    #[serde(default = "default_max_snapshot_file_bytes")]
    pub max_snapshot_file_bytes: usize,

    /// Model context window in tokens
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Warn before walking a repository larger than this share of the window
    #[serde(default = "default_size_warning_threshold")]
    pub size_warning_threshold: f64,
}

/// Where repositories and derived documents live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Clone target for remote repositories
    #[serde(default = "default_repos_dir")]
    pub repos_dir: PathBuf,

    /// Architecture documents, one per repository
    #[serde(default = "default_architecture_dir")]
    pub architecture_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for debug log files
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,

    /// Level printed to stderr unless RUST_LOG is set
    #[serde(default = "default_console_level")]
    pub console_level: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_sessions_dir() -> PathBuf {
    PlatformPaths::default_sessions_dir()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_diff_chars() -> usize {
    10_000
}

fn default_max_snapshot_files() -> usize {
    20
}

fn default_max_snapshot_file_bytes() -> usize {
    10_000
}

fn default_context_window() -> usize {
    1_048_576
}

fn default_size_warning_threshold() -> f64 {
    0.70
}

fn default_repos_dir() -> PathBuf {
    PlatformPaths::default_repos_dir()
}

fn default_architecture_dir() -> PathBuf {
    PlatformPaths::default_architecture_dir()
}

fn default_log_dir() -> PathBuf {
    PlatformPaths::default_log_dir()
}

fn default_console_level() -> String {
    "warn".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_sessions_dir(),
            degrade_on_failure: true,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_diff_chars: default_max_diff_chars(),
            max_snapshot_files: default_max_snapshot_files(),
            max_snapshot_file_bytes: default_max_snapshot_file_bytes(),
            context_window: default_context_window(),
            size_warning_threshold: default_size_warning_threshold(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            repos_dir: default_repos_dir(),
            architecture_dir: default_architecture_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            console_level: default_console_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, TutorError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or use defaults
    pub fn load_or_default() -> Result<Self, TutorError> {
        let config_path = PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), TutorError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), TutorError> {
        let invalid = |key: &str, reason: String| -> TutorError {
            ConfigError::InvalidValue {
                key: key.to_string(),
                reason,
            }
            .into()
        };

        if self.analyzer.model.trim().is_empty() {
            return Err(invalid("analyzer.model", "must not be empty".to_string()));
        }

        if !(self.analyzer.endpoint.starts_with("http://")
            || self.analyzer.endpoint.starts_with("https://"))
        {
            return Err(invalid(
                "analyzer.endpoint",
                format!("must be an http(s) URL, got '{}'", self.analyzer.endpoint),
            ));
        }

        let limits = [
            ("analyzer.timeout_secs", self.analyzer.timeout_secs as usize),
            ("analyzer.max_diff_chars", self.analyzer.max_diff_chars),
            ("analyzer.max_snapshot_files", self.analyzer.max_snapshot_files),
            (
                "analyzer.max_snapshot_file_bytes",
                self.analyzer.max_snapshot_file_bytes,
            ),
            ("analyzer.context_window", self.analyzer.context_window),
        ];
        for (key, value) in limits {
            if value == 0 {
                return Err(invalid(key, "must be greater than 0".to_string()));
            }
        }

        let threshold = self.analyzer.size_warning_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(invalid(
                "analyzer.size_warning_threshold",
                format!("must be in (0, 1], got {}", threshold),
            ));
        }

        let level = self.logging.console_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(invalid(
                "logging.console_level",
                format!(
                    "must be one of {}, got '{}'",
                    LOG_LEVELS.join(", "),
                    self.logging.console_level
                ),
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the process environment in
    /// production)
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("HISTORY_TUTOR_CACHE_DIR") {
            self.cache.directory = PathBuf::from(dir);
        }

        if let Some(value) = lookup("HISTORY_TUTOR_NO_CACHE")
            && is_truthy(&value)
        {
            self.cache.enabled = false;
        }

        if let Some(model) = lookup("GEMINI_MODEL")
            && !model.trim().is_empty()
        {
            self.analyzer.model = model;
        }

        if let Some(endpoint) = lookup("GEMINI_ENDPOINT") {
            self.analyzer.endpoint = endpoint;
        }

        if let Some(dir) = lookup("HISTORY_TUTOR_REPOS_DIR") {
            self.workspace.repos_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("HISTORY_TUTOR_LOG_DIR") {
            self.logging.directory = PathBuf::from(dir);
        }
    }

    /// Load from `path` (or the default location), then apply environment
    /// overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self, TutorError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_or_default()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Limits handed to the git history reader
    pub fn history_options(&self) -> HistoryOptions {
        HistoryOptions {
            max_snapshot_files: self.analyzer.max_snapshot_files,
            max_snapshot_file_bytes: self.analyzer.max_snapshot_file_bytes,
            ..HistoryOptions::default()
        }
    }

    /// API key from the environment, if set and non-empty
    pub fn api_key() -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests;
