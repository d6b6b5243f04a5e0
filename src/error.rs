/// Centralized error types for history-tutor using thiserror
///
/// Every failure path in the cache, resume and navigation core returns one of
/// these types; nothing in the core panics on bad input or I/O failure.
use crate::navigation::{CoordinatorState, Direction, Resolution};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum TutorError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised by the session cache store
///
/// Corruption of the cache file is not represented here: it is healed inside
/// [`crate::cache::CacheStore::open`] and reported as an open outcome instead.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read cache file '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move corrupt cache file '{path}' aside: {source}")]
    QuarantineFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist cache to '{path}': {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Commit {sha} is already cached with different content")]
    DuplicateKey { sha: String },

    #[error("Position {index} is outside the history (total commits: {total})")]
    PositionOutOfRange { index: usize, total: usize },

    #[error("Cache write task failed: {0}")]
    WriteTaskFailed(String),

    #[error("Failed to remove cache file '{path}': {source}")]
    RemoveFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by an analyzer collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Analyzer is not configured: {0}")]
    NotConfigured(String),

    #[error("Analyzer request failed: {0}")]
    Network(String),

    #[error("Analyzer request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Analyzer quota exhausted: {0}")]
    Quota(String),

    #[error("Analyzer returned HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Analyzer returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Analysis task failed: {0}")]
    TaskFailed(String),
}

/// Errors related to git operations
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git repository not found at: {0}")]
    RepoNotFound(String),

    #[error("Failed to open git repository: {0}")]
    OpenFailed(String),

    #[error("Revision not found: {0}")]
    RevisionNotFound(String),

    #[error("Failed to walk commit history: {0}")]
    WalkFailed(String),

    #[error("Failed to read commit {sha}: {reason}")]
    CommitReadFailed { sha: String, reason: String },

    #[error("Failed to compute diff for commit {sha}: {reason}")]
    DiffFailed { sha: String, reason: String },

    #[error("Failed to clone '{url}': {reason}")]
    CloneFailed { url: String, reason: String },

    #[error("Failed to fetch from origin: {0}")]
    FetchFailed(String),

    #[error("Commit index {index} is outside the history (total commits: {total})")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("Invalid repository location: {0}")]
    InvalidLocator(String),
}

/// Errors raised by the navigation coordinator
#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("Cannot move to the {direction} commit: at index {index} of {total} commits")]
    Boundary {
        direction: Direction,
        index: usize,
        total: usize,
    },

    /// The analysis (if any) succeeded but could not be written to the cache.
    /// The computed resolution travels with the error so it can still be shown.
    #[error("Failed to persist analysis for commit {sha}: {source}")]
    Persistence {
        sha: String,
        resolution: Option<Box<Resolution>>,
        #[source]
        source: CacheError,
    },

    #[error("{0}")]
    Analysis(#[from] AnalysisError),

    #[error("History error: {0}")]
    History(#[from] GitError),

    #[error("Session cache is unavailable: {0}")]
    CacheUnavailable(#[source] CacheError),

    #[error("Repository history is empty")]
    EmptyHistory,

    #[error("Navigator is not ready (state: {0:?})")]
    NotReady(CoordinatorState),

    #[error("Navigation was cancelled")]
    Cancelled,
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

// Conversion from anyhow::Error to TutorError
impl From<anyhow::Error> for TutorError {
    fn from(err: anyhow::Error) -> Self {
        TutorError::Other(format!("{:#}", err))
    }
}

impl TutorError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        TutorError::Other(msg.into())
    }

    /// Convert to a user-facing error string
    pub fn to_user_string(&self) -> String {
        format!("{}", self)
    }

    /// Check if this is a user error (bad input, boundary) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TutorError::Navigation(NavigationError::Boundary { .. })
                | TutorError::Config(ConfigError::InvalidValue { .. })
                | TutorError::Git(GitError::InvalidLocator(_))
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            TutorError::Analysis(err) => err.is_retryable(),
            TutorError::Navigation(err) => err.is_retryable(),
            TutorError::Cache(CacheError::Persistence { .. }) => true,
            TutorError::Io(_) => true,
            _ => false,
        }
    }
}

impl AnalysisError {
    /// Transient collaborator failures that a caller may choose to retry
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::Network(_) | AnalysisError::Timeout(_) => true,
            AnalysisError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl NavigationError {
    /// An invariant violation in the cache rather than an environmental failure
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            NavigationError::Persistence {
                source: CacheError::DuplicateKey { .. },
                ..
            }
        )
    }

    /// The coordinator is still usable after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            NavigationError::CacheUnavailable(_) | NavigationError::NotReady(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            NavigationError::Analysis(err) => err.is_retryable(),
            NavigationError::Persistence { source, .. } => {
                matches!(
                    source,
                    CacheError::Persistence { .. } | CacheError::WriteTaskFailed(_)
                )
            }
            _ => false,
        }
    }
}
