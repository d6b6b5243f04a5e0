//! Start-position policy for a navigation session
//!
//! Kept as a pure function over the persisted metadata so the boundary cases
//! (history shrinkage, disabled cache, never-moved sessions) are testable
//! without touching the filesystem.

use crate::cache::SessionMeta;

/// How the session starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Persistence disabled for the whole run
    Passthrough,
    /// Start at the first commit; cached analyses are still honored
    Fresh,
    /// Continue from the checkpointed position
    Resumed,
}

/// Outcome of [`decide_start_index`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartDecision {
    pub index: usize,
    pub mode: StartMode,
    /// The checkpoint that had to be pulled back into range, if any
    pub clamped_from: Option<usize>,
}

impl StartDecision {
    /// Whether session state may be read or written for this run
    pub fn persistence_enabled(&self) -> bool {
        self.mode != StartMode::Passthrough
    }
}

/// Compute the index a session should start at
///
/// `session` is `None` when no session was loaded at all.
pub fn decide_start_index(
    session: Option<&SessionMeta>,
    force_resume: bool,
    cache_enabled: bool,
) -> StartDecision {
    if !cache_enabled {
        return StartDecision {
            index: 0,
            mode: StartMode::Passthrough,
            clamped_from: None,
        };
    }

    let fresh = StartDecision {
        index: 0,
        mode: StartMode::Fresh,
        clamped_from: None,
    };

    let Some(meta) = session else {
        return fresh;
    };

    if !force_resume && meta.last_position == 0 {
        return fresh;
    }

    let last_index = meta.total_commits.saturating_sub(1);
    let index = meta.last_position.min(last_index);
    let clamped_from = (index != meta.last_position).then_some(meta.last_position);
    if let Some(stored) = clamped_from {
        tracing::warn!(
            "Checkpointed position {} is past the end of {} commits, resuming at {}",
            stored + 1,
            meta.total_commits,
            index + 1
        );
    }

    StartDecision {
        index,
        mode: StartMode::Resumed,
        clamped_from,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta(last_position: usize, total_commits: usize) -> SessionMeta {
        SessionMeta {
            repo_name: "demo".to_string(),
            repo_origin: "/tmp/demo".to_string(),
            total_commits,
            last_position,
            created_at: Utc::now(),
            architecture_version: None,
            history_anomalies: Vec::new(),
        }
    }

    #[test]
    fn test_cache_disabled_always_starts_at_zero() {
        for (position, total, force) in [(0, 0, false), (3, 10, false), (9, 10, true)] {
            let m = meta(position, total);
            let decision = decide_start_index(Some(&m), force, false);
            assert_eq!(decision.index, 0);
            assert_eq!(decision.mode, StartMode::Passthrough);
            assert!(!decision.persistence_enabled());
        }
        assert_eq!(decide_start_index(None, true, false).index, 0);
    }

    #[test]
    fn test_no_session_is_fresh() {
        let decision = decide_start_index(None, false, true);
        assert_eq!(decision.index, 0);
        assert_eq!(decision.mode, StartMode::Fresh);
        assert!(decision.persistence_enabled());
    }

    #[test]
    fn test_zero_position_without_force_is_fresh() {
        let m = meta(0, 10);
        let decision = decide_start_index(Some(&m), false, true);
        assert_eq!(decision.index, 0);
        assert_eq!(decision.mode, StartMode::Fresh);
    }

    #[test]
    fn test_stored_position_resumes() {
        let m = meta(6, 10);
        let decision = decide_start_index(Some(&m), false, true);
        assert_eq!(decision.index, 6);
        assert_eq!(decision.mode, StartMode::Resumed);
        assert_eq!(decision.clamped_from, None);
    }

    #[test]
    fn test_force_resume_at_zero() {
        let m = meta(0, 10);
        let decision = decide_start_index(Some(&m), true, true);
        assert_eq!(decision.index, 0);
        assert_eq!(decision.mode, StartMode::Resumed);
    }

    #[test]
    fn test_shrunk_history_clamps_to_last_commit() {
        let m = meta(7, 5);
        let decision = decide_start_index(Some(&m), false, true);
        assert_eq!(decision.index, 4);
        assert_eq!(decision.clamped_from, Some(7));
    }

    #[test]
    fn test_last_commit_boundary_is_not_clamped() {
        let m = meta(4, 5);
        let decision = decide_start_index(Some(&m), true, true);
        assert_eq!(decision.index, 4);
        assert_eq!(decision.clamped_from, None);
    }

    #[test]
    fn test_empty_history_never_underflows() {
        let m = meta(3, 0);
        let decision = decide_start_index(Some(&m), true, true);
        assert_eq!(decision.index, 0);
        assert_eq!(decision.clamped_from, Some(3));
    }
}
