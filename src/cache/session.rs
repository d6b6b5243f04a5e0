//! Persisted session model: metadata plus the commit-keyed analysis records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current on-disk schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Identity of the repository a session belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
    /// Short repository name (e.g. `click`)
    pub name: String,
    /// Where the repository came from: a remote URL or a local path
    pub origin: String,
}

impl RepoIdentity {
    pub fn new(name: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: origin.into(),
        }
    }
}

/// A shrink of the observed history, kept for later inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryAnomaly {
    pub previous_total: usize,
    pub observed_total: usize,
    pub previous_position: usize,
    pub observed_at: DateTime<Utc>,
}

/// Session metadata, separate from the record map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub repo_name: String,
    pub repo_origin: String,
    /// Total commit count as last observed
    #[serde(default)]
    pub total_commits: usize,
    /// Last checkpointed navigation index
    #[serde(default)]
    pub last_position: usize,
    pub created_at: DateTime<Utc>,
    /// Latest architecture document version referenced by any record
    #[serde(default)]
    pub architecture_version: Option<u64>,
    #[serde(default)]
    pub history_anomalies: Vec<HistoryAnomaly>,
}

/// Cached explanation for one commit
///
/// Immutable once stored. Whether it was served from the cache or freshly
/// computed is decided at read time by the navigator, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitAnalysisRecord {
    pub sha: String,
    pub explanation: String,
    /// Architecture document version produced by this commit, if it changed it
    #[serde(default)]
    pub architecture_version: Option<u64>,
    pub analyzed_at: DateTime<Utc>,
}

impl CommitAnalysisRecord {
    pub fn new(
        sha: impl Into<String>,
        explanation: impl Into<String>,
        architecture_version: Option<u64>,
    ) -> Self {
        Self {
            sha: sha.into(),
            explanation: explanation.into(),
            architecture_version,
            analyzed_at: Utc::now(),
        }
    }

    /// Same payload, ignoring when it was computed
    pub fn same_content(&self, other: &CommitAnalysisRecord) -> bool {
        self.sha == other.sha
            && self.explanation == other.explanation
            && self.architecture_version == other.architecture_version
    }
}

/// Everything persisted for one repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub schema_version: u32,
    pub meta: SessionMeta,
    #[serde(default)]
    pub records: BTreeMap<String, CommitAnalysisRecord>,
}

impl Session {
    /// Create an empty session for a repository
    pub fn new(identity: &RepoIdentity) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            meta: SessionMeta {
                repo_name: identity.name.clone(),
                repo_origin: identity.origin.clone(),
                total_commits: 0,
                last_position: 0,
                created_at: Utc::now(),
                architecture_version: None,
                history_anomalies: Vec::new(),
            },
            records: BTreeMap::new(),
        }
    }

    /// Structural validation applied to everything read from disk
    ///
    /// Returns a human-readable reason on failure; the caller treats any
    /// failure as corruption.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version == 0 || self.schema_version > SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema version {} (supported: 1..={})",
                self.schema_version, SCHEMA_VERSION
            ));
        }

        let meta = &self.meta;
        if meta.total_commits == 0 {
            if meta.last_position != 0 {
                return Err(format!(
                    "position {} recorded for an empty history",
                    meta.last_position
                ));
            }
        } else if meta.last_position >= meta.total_commits {
            return Err(format!(
                "position {} is past the end of {} commits",
                meta.last_position, meta.total_commits
            ));
        }

        for (key, record) in &self.records {
            if record.sha.is_empty() {
                return Err(format!("record under key '{}' has an empty sha", key));
            }
            if key != &record.sha {
                return Err(format!(
                    "record keyed '{}' carries sha '{}'",
                    key, record.sha
                ));
            }
        }

        Ok(())
    }
}
