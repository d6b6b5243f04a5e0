//! Commit history sources
//!
//! A history is an immutable, 0-indexed, oldest-first sequence of commits.
//! The navigator only needs its length, the identifier at an index, and the
//! details handed to the analyzer.

/// git2-backed history
pub mod git;
/// Locating, cloning and naming repositories
pub mod remote;
/// Token estimate of a repository
pub mod size;

pub use git::{GitHistory, HistoryOptions};
pub use remote::{PreparedRepo, RepoLocator, commit_url};
pub use size::SizeEstimate;

use crate::error::GitError;
use serde::{Deserialize, Serialize};

/// How a file changed in a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

/// File content captured from a commit's tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub path: String,
    pub content: String,
}

/// Everything known about one commit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitDetails {
    /// Full commit SHA hash (40 characters for git)
    pub hash: String,
    pub short_hash: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    /// Commit timestamp (Unix epoch seconds)
    pub commit_date: i64,
    pub parent_hashes: Vec<String>,
    pub files_changed: Vec<FileChange>,
    /// Unified diff against the first parent (empty tree for root commits)
    pub diff_content: String,
    pub diff_truncated: bool,
    /// All file paths in the tree; only filled for the first commit
    pub file_tree: Vec<String>,
    /// Selected file contents; only filled for the first commit
    pub snapshot: Vec<FileSnapshot>,
}

/// Ordered commit sequence consumed by the navigator
pub trait HistorySource {
    /// Number of commits
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifier of the commit at `index`
    fn commit_id(&self, index: usize) -> Option<&str>;

    /// Full details of the commit at `index`
    fn commit_details(&self, index: usize) -> Result<CommitDetails, GitError>;
}

/// History held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    commits: Vec<CommitDetails>,
}

impl InMemoryHistory {
    pub fn new(commits: Vec<CommitDetails>) -> Self {
        Self { commits }
    }

    /// Minimal commits carrying only identifiers and a one-line message
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let commits = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let hash: String = id.into();
                CommitDetails {
                    short_hash: hash.chars().take(7).collect(),
                    message: format!("Commit {}", i + 1),
                    diff_content: format!("+change {}\n", i + 1),
                    hash,
                    ..Default::default()
                }
            })
            .collect();
        Self { commits }
    }

    pub fn push(&mut self, commit: CommitDetails) {
        self.commits.push(commit);
    }
}

impl HistorySource for InMemoryHistory {
    fn len(&self) -> usize {
        self.commits.len()
    }

    fn commit_id(&self, index: usize) -> Option<&str> {
        self.commits.get(index).map(|c| c.hash.as_str())
    }

    fn commit_details(&self, index: usize) -> Result<CommitDetails, GitError> {
        self.commits
            .get(index)
            .cloned()
            .ok_or(GitError::IndexOutOfRange {
                index,
                total: self.commits.len(),
            })
    }
}
