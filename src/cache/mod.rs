//! Durable session cache keyed by commit identifier
//!
//! One JSON file per repository holds the session metadata (position, totals,
//! schema version) and the map of commit analyses. Every mutation rewrites the
//! whole file atomically; a file that fails validation on load is moved aside
//! and replaced by an empty session instead of failing the caller.

pub(crate) mod atomic;
mod session;

pub use session::{
    CommitAnalysisRecord, HistoryAnomaly, RepoIdentity, SCHEMA_VERSION, Session, SessionMeta,
};

use crate::error::CacheError;
use crate::paths::PlatformPaths;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

/// How [`CacheStore::open`] obtained its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// No cache file existed
    Fresh,
    /// An existing, valid cache file was loaded
    Loaded { records: usize },
    /// The cache file was invalid; it was preserved under `quarantined`
    Recovered { quarantined: PathBuf, reason: String },
}

/// Result of inserting a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// Identical content was already cached
    Unchanged,
}

/// Result of [`CacheStore::update_total_commits`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsUpdate {
    pub previous: usize,
    pub current: usize,
    /// Commits that became reachable since the last observation
    pub new_commits: usize,
    /// Set when the history shrank
    pub anomaly: Option<HistoryAnomaly>,
}

/// Derived cache statistics, never stored
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub record_count: usize,
    pub total_commits: usize,
    pub coverage_percent: f64,
    pub last_position: usize,
}

/// File-backed store for one repository's session
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    session: Session,
    outcome: OpenOutcome,
    /// Whether the file on disk reflects `session`
    persisted: bool,
}

impl CacheStore {
    /// Cache file location for a repository inside `dir`
    pub fn path_for(dir: &Path, identity: &RepoIdentity) -> PathBuf {
        dir.join(format!(
            "{}.cache.json",
            PlatformPaths::repo_file_stem(&identity.name, &identity.origin)
        ))
    }

    /// Load the session stored at `path`, or start an empty one
    ///
    /// A missing file yields a fresh session. A file that cannot be parsed or
    /// fails validation is renamed aside and also yields a fresh session.
    /// Only genuine I/O failures (unreadable file, failed rename) are errors.
    pub fn open(path: impl Into<PathBuf>, identity: &RepoIdentity) -> Result<Self, CacheError> {
        let path = path.into();

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No session cache at {:?}, starting fresh for {}",
                    path,
                    identity.name
                );
                return Ok(Self::fresh(path, identity, OpenOutcome::Fresh));
            }
            Err(e) => {
                return Err(CacheError::ReadFailed {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };

        match Self::parse(&bytes) {
            Ok(session) => {
                if session.meta.repo_origin != identity.origin {
                    tracing::warn!(
                        "Session cache {:?} was created for origin '{}', now used for '{}'",
                        path,
                        session.meta.repo_origin,
                        identity.origin
                    );
                }
                let records = session.records.len();
                tracing::info!(
                    "Loaded session cache with {} cached commits (position {} of {})",
                    records,
                    session.meta.last_position + 1,
                    session.meta.total_commits
                );
                Ok(Self {
                    path,
                    session,
                    outcome: OpenOutcome::Loaded { records },
                    persisted: true,
                })
            }
            Err(reason) => {
                let quarantined = Self::quarantine(&path)?;
                tracing::warn!(
                    "Session cache {:?} is corrupt ({}); preserved as {:?}, starting fresh",
                    path,
                    reason,
                    quarantined
                );
                Ok(Self::fresh(
                    path,
                    identity,
                    OpenOutcome::Recovered {
                        quarantined,
                        reason,
                    },
                ))
            }
        }
    }

    fn fresh(path: PathBuf, identity: &RepoIdentity, outcome: OpenOutcome) -> Self {
        Self {
            path,
            session: Session::new(identity),
            outcome,
            persisted: false,
        }
    }

    fn parse(bytes: &[u8]) -> Result<Session, String> {
        let session: Session = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        session.validate()?;
        Ok(session)
    }

    /// Rename a corrupt file to `<name>.corrupt-<timestamp>`
    fn quarantine(path: &Path) -> Result<PathBuf, CacheError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cache.json".to_string());
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");

        let mut target = path.with_file_name(format!("{}.corrupt-{}", file_name, stamp));
        let mut attempt = 1;
        while target.exists() {
            target = path.with_file_name(format!("{}.corrupt-{}-{}", file_name, stamp, attempt));
            attempt += 1;
        }

        fs::rename(path, &target).map_err(|e| CacheError::QuarantineFailed {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(target)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn meta(&self) -> &SessionMeta {
        &self.session.meta
    }

    pub fn open_outcome(&self) -> &OpenOutcome {
        &self.outcome
    }

    /// Look up a cached analysis
    pub fn get_record(&self, sha: &str) -> Option<&CommitAnalysisRecord> {
        self.session.records.get(sha)
    }

    pub fn contains(&self, sha: &str) -> bool {
        self.session.records.contains_key(sha)
    }

    pub fn is_empty(&self) -> bool {
        self.session.records.is_empty()
    }

    /// Insert a new analysis and persist the session
    ///
    /// Re-inserting identical content is a no-op. Different content under an
    /// existing identifier fails with [`CacheError::DuplicateKey`]. If the
    /// write fails the insertion is rolled back.
    pub fn put_record(
        &mut self,
        record: CommitAnalysisRecord,
    ) -> Result<PutOutcome, CacheError> {
        if let Some(existing) = self.session.records.get(&record.sha) {
            if existing.same_content(&record) {
                tracing::debug!("Commit {} already cached with identical content", record.sha);
                return Ok(PutOutcome::Unchanged);
            }
            return Err(CacheError::DuplicateKey { sha: record.sha });
        }

        let sha = record.sha.clone();
        let previous_version = self.session.meta.architecture_version;
        if let Some(version) = record.architecture_version
            && previous_version.is_none_or(|v| v < version)
        {
            self.session.meta.architecture_version = Some(version);
        }
        self.session.records.insert(sha.clone(), record);

        if let Err(e) = self.persist() {
            self.session.records.remove(&sha);
            self.session.meta.architecture_version = previous_version;
            return Err(e);
        }

        tracing::info!("Cached analysis for commit {}", sha);
        Ok(PutOutcome::Inserted)
    }

    /// Record the commit count currently reported by the history
    ///
    /// Growth simply makes new indices reachable. A smaller count is logged
    /// and recorded as a [`HistoryAnomaly`]; the total follows the history
    /// (indices past it can no longer be reached), the position is clamped,
    /// and no record is ever deleted.
    pub fn update_total_commits(&mut self, total: usize) -> Result<TotalsUpdate, CacheError> {
        let previous_meta = self.session.meta.clone();
        let previous = previous_meta.total_commits;

        let anomaly = if total < previous {
            let anomaly = HistoryAnomaly {
                previous_total: previous,
                observed_total: total,
                previous_position: previous_meta.last_position,
                observed_at: Utc::now(),
            };
            tracing::warn!(
                "History shrank from {} to {} commits; keeping {} cached analyses",
                previous,
                total,
                self.session.records.len()
            );
            self.session.meta.history_anomalies.push(anomaly.clone());
            Some(anomaly)
        } else {
            None
        };

        self.session.meta.total_commits = total;
        let max_position = total.saturating_sub(1);
        if self.session.meta.last_position > max_position {
            self.session.meta.last_position = max_position;
        }

        let new_commits = total.saturating_sub(previous);
        if new_commits > 0 && previous > 0 {
            tracing::info!("Found {} new commits since last session", new_commits);
        }

        if self.session.meta != previous_meta || !self.persisted {
            if let Err(e) = self.persist() {
                self.session.meta = previous_meta;
                return Err(e);
            }
        }

        Ok(TotalsUpdate {
            previous,
            current: total,
            new_commits,
            anomaly,
        })
    }

    /// Durably record the current navigation index
    pub fn checkpoint_position(&mut self, index: usize) -> Result<(), CacheError> {
        let total = self.session.meta.total_commits;
        if index >= total {
            return Err(CacheError::PositionOutOfRange { index, total });
        }

        if self.session.meta.last_position == index && self.persisted {
            return Ok(());
        }

        let previous = self.session.meta.last_position;
        self.session.meta.last_position = index;
        if let Err(e) = self.persist() {
            self.session.meta.last_position = previous;
            return Err(e);
        }

        tracing::debug!("Saved position: {} of {}", index + 1, total);
        Ok(())
    }

    /// Coverage and position snapshot
    pub fn stats(&self) -> CacheStats {
        let record_count = self.session.records.len();
        let total_commits = self.session.meta.total_commits;
        let coverage_percent = if total_commits > 0 {
            (record_count as f64 / total_commits as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        CacheStats {
            record_count,
            total_commits,
            coverage_percent,
            last_position: self.session.meta.last_position,
        }
    }

    /// Delete the session file. Only ever called on explicit user request.
    pub fn destroy(self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Removed session cache {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::RemoveFailed {
                path: self.path.display().to_string(),
                source: e,
            }),
        }
    }

    fn persist(&mut self) -> Result<(), CacheError> {
        let content = serde_json::to_vec_pretty(&self.session)?;
        atomic::write_atomic(&self.path, &content).map_err(|e| {
            tracing::error!("Failed to save session cache to {:?}: {}", self.path, e);
            CacheError::Persistence {
                path: self.path.display().to_string(),
                source: e,
            }
        })?;
        self.persisted = true;
        tracing::debug!("Saved session cache to {:?}", self.path);
        Ok(())
    }
}
