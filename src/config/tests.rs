use super::*;
use std::collections::HashMap;
use tempfile::NamedTempFile;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.cache.enabled);
    assert!(config.cache.degrade_on_failure);
    assert_eq!(config.analyzer.model, "gemini-2.5-pro");
    assert_eq!(config.analyzer.timeout_secs, 120);
    assert_eq!(config.analyzer.max_diff_chars, 10_000);
    assert_eq!(config.analyzer.max_snapshot_files, 20);
    assert_eq!(config.analyzer.context_window, 1_048_576);
    assert_eq!(config.analyzer.size_warning_threshold, 0.70);
    assert_eq!(config.logging.console_level, "warn");
    assert!(config.cache.directory.ends_with("history-tutor/sessions"));
}

#[test]
fn test_validate_valid_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_zero_timeout() {
    let mut config = Config::default();
    config.analyzer.timeout_secs = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("analyzer.timeout_secs"));
}

#[test]
fn test_validate_zero_limits() {
    let mut config = Config::default();
    config.analyzer.max_snapshot_files = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.analyzer.max_diff_chars = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_size_warning_threshold() {
    let mut config = Config::default();
    config.analyzer.size_warning_threshold = 0.0;
    assert!(config.validate().is_err());
    config.analyzer.size_warning_threshold = 1.5;
    assert!(config.validate().is_err());
    config.analyzer.size_warning_threshold = 1.0;
    assert!(config.validate().is_ok());

    config.analyzer.context_window = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_empty_model() {
    let mut config = Config::default();
    config.analyzer.model = "  ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_bad_endpoint() {
    let mut config = Config::default();
    config.analyzer.endpoint = "ftp://example.com".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_log_level() {
    let mut config = Config::default();
    config.logging.console_level = "INFO".to_string();
    assert!(config.validate().is_ok());
    config.logging.console_level = "loud".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_save_and_load() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    let mut config = Config::default();
    config.analyzer.model = "gemini-2.5-flash".to_string();
    config.cache.enabled = false;

    config.save(path).unwrap();
    let loaded = Config::from_file(path).unwrap();

    assert_eq!(loaded.analyzer.model, "gemini-2.5-flash");
    assert!(!loaded.cache.enabled);
}

#[test]
fn test_partial_file_uses_defaults() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "[analyzer]\ntimeout_secs = 30\n").unwrap();

    let loaded = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(loaded.analyzer.timeout_secs, 30);
    assert_eq!(loaded.analyzer.model, "gemini-2.5-pro");
    assert!(loaded.cache.enabled);
}

#[test]
fn test_load_nonexistent_file() {
    let result = Config::from_file(Path::new("/nonexistent/config.toml"));
    assert!(matches!(
        result,
        Err(TutorError::Config(ConfigError::FileNotFound(_)))
    ));
}

#[test]
fn test_load_invalid_toml() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "[cache\nenabled = ").unwrap();

    let result = Config::from_file(temp_file.path());
    assert!(matches!(
        result,
        Err(TutorError::Config(ConfigError::ParseFailed(_)))
    ));
}

#[test]
fn test_env_overrides() {
    let mut config = Config::default();
    config.apply_overrides_from(lookup(&[
        ("HISTORY_TUTOR_CACHE_DIR", "/tmp/sessions"),
        ("HISTORY_TUTOR_NO_CACHE", "true"),
        ("GEMINI_MODEL", "gemini-2.5-flash"),
        ("GEMINI_ENDPOINT", "http://localhost:9000"),
        ("HISTORY_TUTOR_REPOS_DIR", "/tmp/repos"),
        ("HISTORY_TUTOR_LOG_DIR", "/tmp/logs"),
    ]));

    assert_eq!(config.cache.directory, PathBuf::from("/tmp/sessions"));
    assert!(!config.cache.enabled);
    assert_eq!(config.analyzer.model, "gemini-2.5-flash");
    assert_eq!(config.analyzer.endpoint, "http://localhost:9000");
    assert_eq!(config.workspace.repos_dir, PathBuf::from("/tmp/repos"));
    assert_eq!(config.logging.directory, PathBuf::from("/tmp/logs"));
}

#[test]
fn test_no_cache_requires_truthy_value() {
    let mut config = Config::default();
    config.apply_overrides_from(lookup(&[("HISTORY_TUTOR_NO_CACHE", "0")]));
    assert!(config.cache.enabled);
}

#[test]
fn test_empty_model_override_ignored() {
    let mut config = Config::default();
    config.apply_overrides_from(lookup(&[("GEMINI_MODEL", "")]));
    assert_eq!(config.analyzer.model, "gemini-2.5-pro");
}

#[test]
fn test_history_options_follow_config() {
    let mut config = Config::default();
    config.analyzer.max_snapshot_files = 5;
    let options = config.history_options();
    assert_eq!(options.max_snapshot_files, 5);
    assert_eq!(options.max_snapshot_file_bytes, 10_000);
}
