//! Rough repository size against the analyzer's context window

/// Files that count toward the estimate
const COUNTED_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "tsx", "jsx", "java", "go", "rs", "cpp", "c", "h", "hpp", "cs", "rb", "php",
    "swift", "kt", "scala", "sh", "bash", "md", "txt", "json", "yaml", "yml", "toml", "xml",
    "html", "css", "sql", "proto", "graphql",
];

/// Directories never descended into
pub(crate) const SKIPPED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "venv",
    "__pycache__",
    ".pytest_cache",
    "dist",
    "build",
];

/// Files above this size are skipped
pub(crate) const MAX_COUNTED_FILE_BYTES: usize = 1_000_000;

/// Approximate tokens in `text` (about four characters per token)
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Whether a file path is counted at all
pub fn is_counted(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| COUNTED_EXTENSIONS.contains(&ext))
}

/// Token estimate for the tip of a history
#[derive(Debug, Clone, PartialEq)]
pub struct SizeEstimate {
    pub token_count: usize,
    pub file_count: usize,
    pub skipped_files: usize,
    pub context_window: usize,
}

impl SizeEstimate {
    pub fn new(context_window: usize) -> Self {
        Self {
            token_count: 0,
            file_count: 0,
            skipped_files: 0,
            context_window,
        }
    }

    /// Add one file's contents
    pub fn count_file(&mut self, content: &str) {
        self.token_count += estimate_tokens(content);
        self.file_count += 1;
    }

    pub fn skip_file(&mut self) {
        self.skipped_files += 1;
    }

    /// Share of the context window, in percent
    pub fn percentage(&self) -> f64 {
        if self.context_window == 0 {
            return 0.0;
        }
        self.token_count as f64 / self.context_window as f64 * 100.0
    }

    /// `threshold` is a fraction of the window, e.g. `0.7`
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.percentage() > threshold * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        // Characters, not bytes
        assert_eq!(estimate_tokens("ééééé"), 1);
    }

    #[test]
    fn test_is_counted() {
        assert!(is_counted("src/main.rs"));
        assert!(is_counted("docs/README.md"));
        assert!(!is_counted("assets/logo.png"));
        assert!(!is_counted("Makefile"));
    }

    #[test]
    fn test_threshold() {
        let mut estimate = SizeEstimate::new(100);
        estimate.count_file(&"x".repeat(280));
        assert_eq!(estimate.token_count, 70);
        assert_eq!(estimate.file_count, 1);
        assert!(!estimate.exceeds(0.7));

        estimate.count_file("abcd");
        assert!(estimate.exceeds(0.7));
        assert!((estimate.percentage() - 71.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_window_never_warns() {
        let mut estimate = SizeEstimate::new(0);
        estimate.count_file("abcdefgh");
        assert_eq!(estimate.percentage(), 0.0);
        assert!(!estimate.exceeds(0.7));
    }
}
