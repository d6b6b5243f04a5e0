/// Centralized platform-specific path computation
///
/// Provides consistent path handling across Windows, macOS, and Linux. Session
/// caches live under the cache directory, cloned repositories, architecture
/// documents and logs under the data directory.
use sha2::{Digest, Sha256};
use std::path::PathBuf;

const PROJECT_DIR: &str = "history-tutor";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the appropriate data directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_DATA_HOME or ~/.local/share
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the appropriate cache directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Caches
    /// - Linux/Unix: $XDG_CACHE_HOME or ~/.cache
    pub fn cache_dir() -> PathBuf {
        dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the appropriate config directory for the current platform
    pub fn config_dir() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns: {data_dir}/history-tutor
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(PROJECT_DIR)
    }

    /// Returns: {cache_dir}/history-tutor
    pub fn project_cache_dir() -> PathBuf {
        Self::cache_dir().join(PROJECT_DIR)
    }

    /// Returns: {config_dir}/history-tutor
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(PROJECT_DIR)
    }

    /// Directory holding one session cache file per repository
    ///
    /// Returns: {cache_dir}/history-tutor/sessions
    pub fn default_sessions_dir() -> PathBuf {
        Self::project_cache_dir().join("sessions")
    }

    /// Returns: {data_dir}/history-tutor/repos
    pub fn default_repos_dir() -> PathBuf {
        Self::project_data_dir().join("repos")
    }

    /// Returns: {data_dir}/history-tutor/architecture
    pub fn default_architecture_dir() -> PathBuf {
        Self::project_data_dir().join("architecture")
    }

    /// Returns: {data_dir}/history-tutor/logs
    pub fn default_log_dir() -> PathBuf {
        Self::project_data_dir().join("logs")
    }

    /// Returns: {config_dir}/history-tutor/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }

    /// File stem shared by a repository's session cache and architecture document
    ///
    /// Two repositories with the same name but different origins get distinct
    /// files: the stem carries a short hash of the origin.
    pub fn repo_file_stem(repo_name: &str, origin: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(origin.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        let safe_name: String = repo_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}-{}", safe_name, &hash[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_dir_not_empty() {
        let dir = PlatformPaths::cache_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_project_paths_contain_project_name() {
        assert!(
            PlatformPaths::project_data_dir()
                .to_string_lossy()
                .contains("history-tutor")
        );
        assert!(
            PlatformPaths::project_cache_dir()
                .to_string_lossy()
                .contains("history-tutor")
        );
        assert!(
            PlatformPaths::project_config_dir()
                .to_string_lossy()
                .contains("history-tutor")
        );
    }

    #[test]
    fn test_default_sessions_dir() {
        let path = PlatformPaths::default_sessions_dir();
        assert!(path.ends_with("history-tutor/sessions"));
    }

    #[test]
    fn test_default_config_path() {
        let path = PlatformPaths::default_config_path();
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_repo_file_stem_distinguishes_origins() {
        let a = PlatformPaths::repo_file_stem("click", "https://github.com/pallets/click");
        let b = PlatformPaths::repo_file_stem("click", "/home/me/forks/click");
        let a_again = PlatformPaths::repo_file_stem("click", "https://github.com/pallets/click");

        assert_ne!(a, b);
        assert_eq!(a, a_again);
        assert!(a.starts_with("click-"));
        assert_eq!(a.len(), "click-".len() + 12);
    }

    #[test]
    fn test_repo_file_stem_sanitizes_name() {
        let stem = PlatformPaths::repo_file_stem("my repo/../x", "origin");
        assert!(stem.starts_with("my_repo_.._x-"));
        assert!(!stem.contains('/'));
    }
}
