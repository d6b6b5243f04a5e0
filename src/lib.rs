//! # History Tutor - Resumable, Cached Walks Through Commit History
//!
//! Walks a git repository oldest-first and explains each commit with an
//! LLM, keeping a running architecture document. Explanations are cached per
//! commit and the position is checkpointed after every step, so a walk can be
//! resumed across restarts without paying for the same analysis twice.
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────────────┐
//!            │ NavigationCoordinator│  (step / resolve / checkpoint)
//!            └──────────┬───────────┘
//!        ┌──────────────┼───────────────┬────────────────┐
//!        │              │               │                │
//! ┌──────▼─────┐ ┌──────▼──────┐ ┌──────▼──────┐ ┌───────▼──────┐
//! │ CacheStore │ │ decide_start│ │HistorySource│ │   Analyzer   │
//! │ (JSON file)│ │   _index    │ │   (git2)    │ │   (Gemini)   │
//! └────────────┘ └─────────────┘ └─────────────┘ └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: Durable session cache keyed by commit identifier
//! - [`resume`]: Start-position policy
//! - [`navigation`]: The navigation state machine
//! - [`history`]: Commit sources (git2, in-memory) and repository locating
//! - [`analyzer`]: Analyzer trait, prompts and the Gemini client
//! - [`architecture`]: Versioned architecture document
//! - [`presenter`]: Terminal rendering
//! - [`config`]: Configuration management with environment variable support
//! - [`logging`]: Tracing subscriber setup
//! - [`error`]: Error types
//! - [`paths`]: Platform directories
//!
//! ## Usage Example
//!
//! ```no_run
//! use history_tutor::analyzer::UnconfiguredAnalyzer;
//! use history_tutor::history::{GitHistory, HistoryOptions, RepoLocator};
//! use history_tutor::navigation::{
//!     Direction, NavigationCoordinator, NavigationOptions, SessionStorage,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let locator = RepoLocator::local(".")?;
//!     let identity = locator.identity();
//!     let history = GitHistory::open(".", None, HistoryOptions::default())?;
//!     let storage = SessionStorage::in_dirs(
//!         "/tmp/sessions".as_ref(),
//!         "/tmp/architecture".as_ref(),
//!         &identity,
//!     );
//!
//!     let mut nav = NavigationCoordinator::new(
//!         history,
//!         Arc::new(UnconfiguredAnalyzer::new("no key")),
//!         identity,
//!         storage,
//!         NavigationOptions::default(),
//!     );
//!     nav.start().await?;
//!     let resolution = nav.step(Direction::Next).await?;
//!     println!("{}", resolution.record.explanation);
//!     Ok(())
//! }
//! ```

/// Analyzer trait, prompt construction and the Gemini HTTP client
pub mod analyzer;

/// Living architecture document with monotonic versions
pub mod architecture;

/// Durable, commit-keyed session cache with atomic writes
pub mod cache;

/// Configuration management with environment variable overrides
pub mod config;

/// Error types and utilities
pub mod error;

/// Commit history sources and repository locating
pub mod history;

/// Tracing subscriber setup (console + log file)
pub mod logging;

/// Navigation state machine over the commit history
pub mod navigation;

/// Platform directories and per-repository file names
pub mod paths;

/// Terminal rendering of commits, analyses and errors
pub mod presenter;

/// Start-position decision for a session
pub mod resume;
