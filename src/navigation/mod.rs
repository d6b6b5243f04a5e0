//! Navigation through a commit history with cached analyses
//!
//! The coordinator owns the session: it opens the cache, decides where to
//! resume, and on every step serves the target commit from the cache or
//! delegates to the analyzer, then checkpoints the new position.
//!
//! Analyses run in spawned tasks that also perform the cache write, so a
//! cancelled step still keeps the (expensive) result. Writes of successive
//! tasks are chained so they land in request order.

use crate::analyzer::{Analyzer, CommitContext, QuestionContext};
use crate::architecture::ArchitectureDocument;
use crate::cache::{
    CacheStats, CacheStore, CommitAnalysisRecord, OpenOutcome, RepoIdentity, TotalsUpdate,
};
use crate::error::{AnalysisError, CacheError, GitError, NavigationError};
use crate::history::HistorySource;
use crate::resume::{StartDecision, StartMode, decide_start_index};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Step direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Next => f.write_str("next"),
            Direction::Previous => f.write_str("previous"),
        }
    }
}

/// Where a resolved record came from; computed per read, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Cached,
    Fresh,
}

/// The analysis shown for one commit
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub index: usize,
    pub record: CommitAnalysisRecord,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    Ready,
    Resolving,
    Error,
}

/// Files backing one repository's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStorage {
    pub cache_file: PathBuf,
    pub architecture_file: PathBuf,
}

impl SessionStorage {
    pub fn new(cache_file: impl Into<PathBuf>, architecture_file: impl Into<PathBuf>) -> Self {
        Self {
            cache_file: cache_file.into(),
            architecture_file: architecture_file.into(),
        }
    }

    /// Standard file names for `identity` inside the given directories
    pub fn in_dirs(cache_dir: &Path, architecture_dir: &Path, identity: &RepoIdentity) -> Self {
        Self {
            cache_file: CacheStore::path_for(cache_dir, identity),
            architecture_file: ArchitectureDocument::path_for(architecture_dir, identity),
        }
    }

    /// Delete the session and its architecture document
    pub fn reset(&self, identity: &RepoIdentity) -> Result<(), CacheError> {
        tracing::info!("Resetting session for {}", identity.name);
        CacheStore::open(&self.cache_file, identity)?.destroy()?;
        ArchitectureDocument::remove(&self.architecture_file)
    }
}

#[derive(Debug, Clone)]
pub struct NavigationOptions {
    /// Read and write the session cache
    pub cache_enabled: bool,
    /// Resume from the stored position even when it is 0
    pub force_resume: bool,
    /// Continue without persistence when the cache cannot be opened
    pub degrade_on_failure: bool,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            force_resume: false,
            degrade_on_failure: false,
        }
    }
}

/// What [`NavigationCoordinator::start`] found
#[derive(Debug, Clone)]
pub struct StartReport {
    pub decision: StartDecision,
    pub open_outcome: Option<OpenOutcome>,
    pub totals: Option<TotalsUpdate>,
    /// Why persistence was switched off, when the cache could not be opened
    pub degraded: Option<String>,
}

/// Result of a spawned analysis
struct TaskOutcome {
    record: CommitAnalysisRecord,
    cache_error: Option<CacheError>,
    architecture_error: Option<CacheError>,
}

type AnalysisTask = JoinHandle<Result<TaskOutcome, AnalysisError>>;

pub struct NavigationCoordinator<H: HistorySource, A: Analyzer + ?Sized = dyn Analyzer> {
    history: H,
    analyzer: Arc<A>,
    identity: RepoIdentity,
    storage: SessionStorage,
    options: NavigationOptions,
    store: Option<Arc<Mutex<CacheStore>>>,
    architecture: Arc<Mutex<ArchitectureDocument>>,
    architecture_dirty: bool,
    /// Analyses whose cache write failed, kept for display and retry
    unsaved: HashMap<String, CommitAnalysisRecord>,
    /// Analyses abandoned by a cancelled step, picked up on revisit
    in_flight: HashMap<String, AnalysisTask>,
    /// Completion signal of the most recently spawned write
    write_chain: Option<oneshot::Receiver<()>>,
    state: CoordinatorState,
    mode: StartMode,
    index: usize,
}

impl<H: HistorySource, A: Analyzer + ?Sized> NavigationCoordinator<H, A> {
    pub fn new(
        history: H,
        analyzer: Arc<A>,
        identity: RepoIdentity,
        storage: SessionStorage,
        options: NavigationOptions,
    ) -> Self {
        Self {
            history,
            analyzer,
            identity,
            storage,
            options,
            store: None,
            architecture: Arc::new(Mutex::new(ArchitectureDocument::in_memory())),
            architecture_dirty: false,
            unsaved: HashMap::new(),
            in_flight: HashMap::new(),
            write_chain: None,
            state: CoordinatorState::Uninitialized,
            mode: StartMode::Passthrough,
            index: 0,
        }
    }

    /// Open the session and position the navigator
    pub async fn start(&mut self) -> Result<StartReport, NavigationError> {
        if self.state != CoordinatorState::Uninitialized {
            return Err(NavigationError::NotReady(self.state));
        }

        let total = self.history.len();
        if total == 0 {
            self.state = CoordinatorState::Error;
            return Err(NavigationError::EmptyHistory);
        }

        let mut open_outcome = None;
        let mut totals = None;
        let mut degraded = None;

        if self.options.cache_enabled {
            match self.open_store(total) {
                Ok((store, update)) => {
                    open_outcome = Some(store.open_outcome().clone());
                    totals = Some(update);
                    self.store = Some(Arc::new(Mutex::new(store)));
                }
                Err(e) if self.options.degrade_on_failure => {
                    tracing::warn!("Session cache unavailable, continuing without it: {}", e);
                    degraded = Some(e.to_string());
                }
                Err(e) => {
                    tracing::error!("Session cache unavailable: {}", e);
                    self.state = CoordinatorState::Error;
                    return Err(NavigationError::CacheUnavailable(e));
                }
            }
        }

        let decision = match &self.store {
            Some(store) => {
                let store = store.lock().await;
                decide_start_index(Some(store.meta()), self.options.force_resume, true)
            }
            None => decide_start_index(None, self.options.force_resume, false),
        };

        if decision.persistence_enabled()
            && let Some(store) = &self.store
        {
            let version = store.lock().await.meta().architecture_version;
            let document = ArchitectureDocument::load(&self.storage.architecture_file, version);
            *self.architecture.lock().await = document;
        }

        self.mode = decision.mode;
        self.index = decision.index;
        self.state = CoordinatorState::Ready;

        tracing::info!(
            "Session for {} started at commit {} of {} ({:?})",
            self.identity.name,
            self.index + 1,
            total,
            self.mode
        );

        Ok(StartReport {
            decision,
            open_outcome,
            totals,
            degraded,
        })
    }

    fn open_store(&self, total: usize) -> Result<(CacheStore, TotalsUpdate), CacheError> {
        let mut store = CacheStore::open(&self.storage.cache_file, &self.identity)?;
        let update = store.update_total_commits(total)?;
        Ok((store, update))
    }

    /// Move one commit and resolve its analysis
    pub async fn step(&mut self, direction: Direction) -> Result<Resolution, NavigationError> {
        self.step_cancellable(direction, &CancellationToken::new()).await
    }

    /// [`Self::step`] that gives up when `cancel` fires
    ///
    /// A cancelled step leaves the index unchanged; the analysis keeps
    /// running in the background and its result is cached.
    pub async fn step_cancellable(
        &mut self,
        direction: Direction,
        cancel: &CancellationToken,
    ) -> Result<Resolution, NavigationError> {
        self.ensure_ready()?;

        let total = self.history.len();
        let target = match direction {
            Direction::Next if self.index + 1 < total => self.index + 1,
            Direction::Previous if self.index > 0 => self.index - 1,
            _ => {
                return Err(NavigationError::Boundary {
                    direction,
                    index: self.index,
                    total,
                });
            }
        };

        self.state = CoordinatorState::Resolving;
        let resolved = self.resolve(target, cancel).await;
        self.settle(target, resolved).await
    }

    /// Resolve the commit at the current index without moving
    pub async fn resolve_current(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Resolution, NavigationError> {
        self.ensure_ready()?;
        self.state = CoordinatorState::Resolving;
        let target = self.index;
        let resolved = self.resolve(target, cancel).await;
        self.settle(target, resolved).await
    }

    fn ensure_ready(&mut self) -> Result<(), NavigationError> {
        match self.state {
            CoordinatorState::Ready => Ok(()),
            CoordinatorState::Resolving => {
                // A previous step future was dropped mid-flight
                tracing::debug!("Recovering from an abandoned step");
                self.state = CoordinatorState::Ready;
                Ok(())
            }
            state => Err(NavigationError::NotReady(state)),
        }
    }

    /// Apply the move (if any), checkpoint, and return to `Ready`
    async fn settle(
        &mut self,
        target: usize,
        resolved: Result<Resolution, NavigationError>,
    ) -> Result<Resolution, NavigationError> {
        let moved = match &resolved {
            Ok(_) => true,
            Err(NavigationError::Persistence { resolution, .. }) => resolution.is_some(),
            Err(_) => false,
        };
        if moved {
            self.index = target;
        }

        let checkpoint = self.checkpoint().await;
        self.state = CoordinatorState::Ready;

        match (resolved, checkpoint) {
            (Ok(resolution), Err(source)) => Err(NavigationError::Persistence {
                sha: resolution.record.sha.clone(),
                resolution: Some(Box::new(resolution)),
                source,
            }),
            (Err(e), Err(source)) => {
                tracing::warn!("Checkpoint also failed: {}", source);
                Err(e)
            }
            (resolved, Ok(())) => resolved,
        }
    }

    async fn checkpoint(&self) -> Result<(), CacheError> {
        let index = self.index;
        match &self.store {
            Some(store) => write_blocking(store, move |store| store.checkpoint_position(index))
                .await
                .and_then(|r| r),
            None => Ok(()),
        }
    }

    async fn resolve(
        &mut self,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<Resolution, NavigationError> {
        let sha = self
            .history
            .commit_id(index)
            .ok_or(GitError::IndexOutOfRange {
                index,
                total: self.history.len(),
            })?
            .to_string();

        if let Some(store) = &self.store {
            let cached = store.lock().await.get_record(&sha).cloned();
            if let Some(record) = cached {
                tracing::info!("Cache hit for commit {}", sha);
                self.in_flight.remove(&sha);
                return Ok(Resolution {
                    index,
                    record,
                    provenance: Provenance::Cached,
                });
            }
        }

        if let Some(record) = self.unsaved.get(&sha) {
            tracing::debug!("Serving unsaved analysis for commit {}", sha);
            return Ok(Resolution {
                index,
                record: record.clone(),
                provenance: Provenance::Fresh,
            });
        }

        let mut task = match self.in_flight.remove(&sha) {
            Some(task) => {
                tracing::debug!("Resuming abandoned analysis for commit {}", sha);
                task
            }
            None => {
                tracing::info!("Cache miss for commit {}, requesting analysis", sha);
                self.spawn_analysis(index, &sha).await?
            }
        };

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            joined = &mut task => Some(joined),
        };
        let Some(joined) = joined else {
            tracing::info!("Step to commit {} cancelled; analysis continues", sha);
            self.in_flight.insert(sha, task);
            return Err(NavigationError::Cancelled);
        };

        let outcome = joined.map_err(|e| AnalysisError::TaskFailed(e.to_string()))??;
        self.absorb(&outcome);
        let resolution = Resolution {
            index,
            record: outcome.record,
            provenance: Provenance::Fresh,
        };

        if let Some(source) = outcome.cache_error {
            return Err(NavigationError::Persistence {
                sha,
                resolution: Some(Box::new(resolution)),
                source,
            });
        }
        if let Some(source) = outcome.architecture_error {
            return Err(NavigationError::Persistence {
                sha,
                resolution: Some(Box::new(resolution)),
                source,
            });
        }

        Ok(resolution)
    }

    /// Keep whatever a finished task failed to write
    fn absorb(&mut self, outcome: &TaskOutcome) {
        if let Some(source) = &outcome.cache_error
            && !matches!(source, CacheError::DuplicateKey { .. })
        {
            self.unsaved.insert(outcome.record.sha.clone(), outcome.record.clone());
        }
        if outcome.architecture_error.is_some() {
            self.architecture_dirty = true;
        }
    }

    /// Collect background analyses abandoned by cancelled steps
    ///
    /// With `wait` every such task is awaited; otherwise only finished ones
    /// are taken. Results that reached the cache need nothing further;
    /// unsaved ones join [`Self::retry_unsaved`]'s queue.
    async fn harvest(&mut self, wait: bool) {
        let shas: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, task)| wait || task.is_finished())
            .map(|(sha, _)| sha.clone())
            .collect();

        for sha in shas {
            let Some(task) = self.in_flight.remove(&sha) else {
                continue;
            };
            match task.await {
                Ok(Ok(outcome)) => self.absorb(&outcome),
                Ok(Err(e)) => tracing::debug!("Abandoned analysis of {} failed: {}", sha, e),
                Err(e) => tracing::warn!("Abandoned analysis of {} panicked: {}", sha, e),
            }
        }
    }

    async fn spawn_analysis(
        &mut self,
        index: usize,
        sha: &str,
    ) -> Result<AnalysisTask, NavigationError> {
        let details = self.history.commit_details(index)?;
        let architecture = self
            .architecture
            .lock()
            .await
            .content()
            .map(|s| s.to_string());
        let context = CommitContext {
            index,
            total: self.history.len(),
            details,
            architecture,
        };

        let analyzer = Arc::clone(&self.analyzer);
        let store = self.store.clone();
        let document = Arc::clone(&self.architecture);
        let sha = sha.to_string();
        let (done, chained) = oneshot::channel();
        let predecessor = self.write_chain.replace(chained);

        Ok(tokio::spawn(async move {
            let analysis = analyzer.analyze(context).await;

            if let Some(previous) = predecessor {
                // Err only means the predecessor went away; ordering still holds
                let _ = previous.await;
            }

            let outcome = match analysis {
                Ok(analysis) => {
                    let mut architecture_error = None;
                    let version = match analysis.architecture_update {
                        Some(update) => {
                            let written = write_blocking(&document, move |document| {
                                let result = document.update(update);
                                (result, document.version())
                            })
                            .await;
                            match written {
                                Ok((Ok(version), _)) => Some(version),
                                Ok((Err(e), version)) => {
                                    tracing::error!("Failed to save architecture document: {}", e);
                                    architecture_error = Some(e);
                                    Some(version)
                                }
                                Err(e) => {
                                    tracing::error!("Failed to save architecture document: {}", e);
                                    architecture_error = Some(e);
                                    None
                                }
                            }
                        }
                        None => None,
                    };

                    let record = CommitAnalysisRecord::new(&sha, analysis.explanation, version);
                    let cache_error = match &store {
                        Some(store) => {
                            let pending = record.clone();
                            write_blocking(store, move |store| store.put_record(pending))
                                .await
                                .and_then(|r| r)
                                .err()
                        }
                        None => None,
                    };
                    if let Some(e) = &cache_error {
                        tracing::error!("Failed to cache analysis for commit {}: {}", sha, e);
                    }

                    Ok(TaskOutcome {
                        record,
                        cache_error,
                        architecture_error,
                    })
                }
                Err(e) => {
                    tracing::warn!("Analysis of commit {} failed: {}", sha, e);
                    Err(e)
                }
            };

            let _ = done.send(());
            outcome
        }))
    }

    /// Persist analyses whose earlier cache write failed
    ///
    /// Returns how many records were saved. Stops at the first failure.
    pub async fn retry_unsaved(&mut self) -> Result<usize, NavigationError> {
        let Some(store) = self.store.clone() else {
            return Ok(0);
        };
        self.harvest(false).await;

        if self.architecture_dirty {
            write_blocking(&self.architecture, |document| document.save())
                .await
                .and_then(|r| r)
                .map_err(|source| NavigationError::Persistence {
                    sha: self.current_sha(),
                    resolution: None,
                    source,
                })?;
            self.architecture_dirty = false;
        }

        let mut shas: Vec<String> = self.unsaved.keys().cloned().collect();
        shas.sort();
        let mut saved = 0;
        for sha in shas {
            let Some(record) = self.unsaved.get(&sha).cloned() else {
                continue;
            };
            let result = write_blocking(&store, move |store| store.put_record(record))
                .await
                .and_then(|r| r);
            match result {
                Ok(_) => {
                    self.unsaved.remove(&sha);
                    saved += 1;
                }
                Err(source) => {
                    return Err(NavigationError::Persistence {
                        sha,
                        resolution: None,
                        source,
                    });
                }
            }
        }

        self.checkpoint()
            .await
            .map_err(|source| NavigationError::Persistence {
                sha: self.current_sha(),
                resolution: None,
                source,
            })?;

        if saved > 0 {
            tracing::info!("Saved {} previously unsaved analyses", saved);
        }
        Ok(saved)
    }

    fn current_sha(&self) -> String {
        self.history
            .commit_id(self.index)
            .unwrap_or_default()
            .to_string()
    }

    /// Number of analyses held only in memory
    pub fn unsaved_count(&self) -> usize {
        self.unsaved.len()
    }

    /// Wait until every spawned analysis has written its result
    ///
    /// Analyses left behind by cancelled steps are collected too, so a
    /// failed write shows up in [`Self::unsaved_count`].
    pub async fn flush(&mut self) {
        if let Some(last) = self.write_chain.take() {
            let _ = last.await;
        }
        self.harvest(true).await;
    }

    /// Ask the analyzer about the commit at the current index
    ///
    /// The architecture document and the commit's explanation (cached or
    /// unsaved) are sent along; the answer is not stored.
    pub async fn ask(&self, question: &str) -> Result<String, NavigationError> {
        let details = self.history.commit_details(self.index)?;
        let last_explanation = match &self.store {
            Some(store) => store
                .lock()
                .await
                .get_record(&details.hash)
                .map(|record| record.explanation.clone()),
            None => None,
        }
        .or_else(|| {
            self.unsaved
                .get(&details.hash)
                .map(|record| record.explanation.clone())
        });

        let context = QuestionContext {
            question: question.to_string(),
            details,
            architecture: self.architecture().await,
            last_explanation,
        };
        Ok(self.analyzer.answer_question(context).await?)
    }

    /// Cache statistics; `None` in passthrough mode
    pub async fn stats(&self) -> Option<CacheStats> {
        match &self.store {
            Some(store) => Some(store.lock().await.stats()),
            None => None,
        }
    }

    /// Current architecture document text
    pub async fn architecture(&self) -> Option<String> {
        self.architecture
            .lock()
            .await
            .content()
            .map(|s| s.to_string())
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn total_commits(&self) -> usize {
        self.history.len()
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn mode(&self) -> StartMode {
        self.mode
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn identity(&self) -> &RepoIdentity {
        &self.identity
    }
}

/// Run a synchronous write against shared state on the blocking pool
async fn write_blocking<T, R, F>(target: &Arc<Mutex<T>>, write: F) -> Result<R, CacheError>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut T) -> R + Send + 'static,
{
    let target = Arc::clone(target);
    tokio::task::spawn_blocking(move || {
        let mut guard = target.blocking_lock();
        write(&mut *guard)
    })
    .await
    .map_err(|e| CacheError::WriteTaskFailed(e.to_string()))
}
