//! Terminal rendering for the interactive walk
//!
//! Everything here returns strings so the binary decides where output goes
//! and tests can check the exact text with colors off.

use crate::cache::{CacheStats, OpenOutcome};
use crate::error::NavigationError;
use crate::history::{CommitDetails, SizeEstimate, commit_url};
use crate::navigation::{Direction, Provenance, Resolution, StartReport};
use crate::resume::StartMode;
use chrono::DateTime;
use console::style;
use std::fmt::Write;

pub const HELP: &str = "\
Commands:
  n, next    analyze the next commit
  p, prev    go back to the previous commit
  d, diff    show the diff of the current commit
  s, stats   show cache statistics
  r, retry   save analyses that could not be written
  a, ask Q   ask a question about the current commit
  h, help    show this help
  q, quit    exit (progress is saved)";

#[derive(Debug, Clone)]
pub struct Presenter {
    pub use_colors: bool,
}

impl Default for Presenter {
    fn default() -> Self {
        Self {
            use_colors: console::colors_enabled(),
        }
    }
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn paint(
        &self,
        text: &str,
        f: impl FnOnce(console::StyledObject<&str>) -> console::StyledObject<&str>,
    ) -> String {
        if self.use_colors {
            f(style(text)).force_styling(true).to_string()
        } else {
            text.to_string()
        }
    }

    /// `Commit 3/40`
    pub fn progress(&self, index: usize, total: usize) -> String {
        let line = format!("Commit {}/{}", index + 1, total);
        self.paint(&line, |s| s.bold())
    }

    pub fn commit_header(&self, details: &CommitDetails, origin: Option<&str>) -> String {
        let mut out = String::new();
        let date = DateTime::from_timestamp(details.commit_date, 0)
            .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown date".to_string());
        let subject = details.message.lines().next().unwrap_or("");

        let _ = writeln!(
            out,
            "{} {}",
            self.paint(&details.short_hash, |s| s.yellow()),
            subject
        );
        let _ = writeln!(out, "Author: {} <{}>", details.author_name, details.author_email);
        let _ = write!(out, "Date:   {}", date);
        if !details.files_changed.is_empty() {
            let _ = write!(out, "\nFiles:  {} changed", details.files_changed.len());
        }
        if let Some(url) = origin.and_then(|o| commit_url(o, &details.hash)) {
            let _ = write!(out, "\nView:   {}", url);
        }
        out
    }

    /// `[cached] 12/40 analyzed (30.0%)`
    pub fn cache_status(&self, provenance: Provenance, stats: Option<&CacheStats>) -> String {
        let tag = match provenance {
            Provenance::Cached => self.paint("[cached]", |s| s.green()),
            Provenance::Fresh => self.paint("[fresh]", |s| s.cyan()),
        };
        match stats {
            Some(stats) => format!(
                "{} {}/{} analyzed ({:.1}%)",
                tag, stats.record_count, stats.total_commits, stats.coverage_percent
            ),
            None => format!("{} cache disabled", tag),
        }
    }

    pub fn resolution(
        &self,
        resolution: &Resolution,
        details: &CommitDetails,
        total: usize,
        origin: Option<&str>,
        stats: Option<&CacheStats>,
    ) -> String {
        format!(
            "{}  {}\n{}\n\n{}\n",
            self.progress(resolution.index, total),
            self.cache_status(resolution.provenance, stats),
            self.commit_header(details, origin),
            resolution.record.explanation.trim_end()
        )
    }

    /// Unified diff with added, removed and hunk lines colored
    pub fn diff(&self, diff: &str) -> String {
        if diff.trim().is_empty() {
            return "(no textual changes)".to_string();
        }
        diff.lines()
            .map(|line| {
                if line.starts_with("+++") || line.starts_with("---") || line.starts_with("diff ") {
                    self.paint(line, |s| s.bold())
                } else if line.starts_with('+') {
                    self.paint(line, |s| s.green())
                } else if line.starts_with('-') {
                    self.paint(line, |s| s.red())
                } else if line.starts_with("@@") {
                    self.paint(line, |s| s.cyan())
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn stats(&self, stats: Option<&CacheStats>, unsaved: usize) -> String {
        let Some(stats) = stats else {
            return "Cache disabled for this run".to_string();
        };
        let mut out = format!(
            "Cached analyses: {}\nTotal commits:   {}\nCoverage:        {:.1}%\n\
Saved position:  {}",
            stats.record_count,
            stats.total_commits,
            stats.coverage_percent,
            stats.last_position + 1
        );
        if unsaved > 0 {
            let _ = write!(out, "\nUnsaved:         {} (use 'retry')", unsaved);
        }
        out
    }

    pub fn start(&self, report: &StartReport, total: usize) -> String {
        let mut lines = Vec::new();
        if let Some(reason) = &report.degraded {
            lines.push(self.warning(&format!(
                "Session cache unavailable, progress will not be saved: {}",
                reason
            )));
        }
        if let Some(OpenOutcome::Recovered { quarantined, .. }) = &report.open_outcome {
            lines.push(self.warning(&format!(
                "Session cache was damaged; a copy was kept at {}",
                quarantined.display()
            )));
        }
        if let Some(totals) = &report.totals {
            if let Some(anomaly) = &totals.anomaly {
                lines.push(self.warning(&format!(
                    "History shrank from {} to {} commits since the last session",
                    anomaly.previous_total, anomaly.observed_total
                )));
            } else if totals.previous > 0 && totals.new_commits > 0 {
                lines.push(format!("{} new commits since the last session", totals.new_commits));
            }
        }
        let position = report.decision.index + 1;
        lines.push(match report.decision.mode {
            StartMode::Resumed => format!("Resuming at commit {} of {}", position, total),
            StartMode::Fresh => format!("Starting at the first of {} commits", total),
            StartMode::Passthrough => {
                format!("Starting at the first of {} commits (cache disabled)", total)
            }
        });
        lines.join("\n")
    }

    pub fn error(&self, err: &NavigationError) -> String {
        match err {
            NavigationError::Boundary { direction, .. } => {
                let edge = match direction {
                    Direction::Next => "Already at the latest commit",
                    Direction::Previous => "Already at the first commit",
                };
                self.warning(edge)
            }
            NavigationError::Persistence { sha, source, .. } => {
                let short: String = sha.chars().take(7).collect();
                if err.is_defect() {
                    self.failure(&format!("Cache conflict for {}: {}", short, source))
                } else {
                    self.warning(&format!(
                        "Analysis for {} is shown but was not saved ({}). Use 'retry' to save it.",
                        short, source
                    ))
                }
            }
            NavigationError::Analysis(e) => {
                let hint = if e.is_retryable() {
                    " Try the step again."
                } else {
                    ""
                };
                self.failure(&format!("Analysis failed: {}.{}", e, hint))
            }
            NavigationError::Cancelled => {
                self.warning("Cancelled; the analysis continues in the background")
            }
            other => self.failure(&other.to_string()),
        }
    }

    /// Warning shown before walking a repository that nears the context window
    pub fn size_warning(&self, estimate: &SizeEstimate, threshold: f64) -> String {
        let mut text = String::new();
        let _ = writeln!(
            text,
            "{}",
            self.warning(&format!(
                "Large repository: about {:.1}% of the model's context window",
                estimate.percentage()
            ))
        );
        let _ = writeln!(text, "  Files analyzed:   {}", estimate.file_count);
        let _ = writeln!(text, "  Estimated tokens: ~{}", estimate.token_count);
        let _ = writeln!(text, "  Threshold:        {:.0}%", threshold * 100.0);
        text.push_str(
            "Large repositories take longer and cost more to analyze, and the \
explanations get less detailed. Smaller repositories (10-50 commits, under \
1000 files) work best.",
        );
        text
    }

    /// Answer to an `ask` question
    pub fn answer(&self, answer: &str) -> String {
        format!("\n{}\n\n{}\n", self.paint("Answer", |s| s.cyan().bold()), answer.trim_end())
    }

    pub fn warning(&self, message: &str) -> String {
        if self.use_colors {
            self.paint(message, |s| s.yellow().bold())
        } else {
            format!("WARNING: {}", message)
        }
    }

    pub fn failure(&self, message: &str) -> String {
        if self.use_colors {
            self.paint(message, |s| s.red().bold())
        } else {
            format!("ERROR: {}", message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CommitAnalysisRecord, TotalsUpdate};
    use crate::error::{AnalysisError, CacheError};
    use crate::resume::StartDecision;

    fn plain() -> Presenter {
        Presenter::with_colors(false)
    }

    fn stats() -> CacheStats {
        CacheStats {
            record_count: 3,
            total_commits: 12,
            coverage_percent: 25.0,
            last_position: 4,
        }
    }

    #[test]
    fn test_progress() {
        assert_eq!(plain().progress(2, 40), "Commit 3/40");
    }

    #[test]
    fn test_cache_status() {
        let p = plain();
        assert_eq!(
            p.cache_status(Provenance::Cached, Some(&stats())),
            "[cached] 3/12 analyzed (25.0%)"
        );
        assert_eq!(p.cache_status(Provenance::Fresh, None), "[fresh] cache disabled");
    }

    #[test]
    fn test_commit_header_with_github_link() {
        let details = CommitDetails {
            hash: "abcdef1234".to_string(),
            short_hash: "abcdef1".to_string(),
            message: "Add parser\n\nLonger body".to_string(),
            author_name: "Ada".to_string(),
            author_email: "ada@example.com".to_string(),
            commit_date: 0,
            ..Default::default()
        };
        let header = plain().commit_header(&details, Some("https://github.com/o/r.git"));
        assert!(header.starts_with("abcdef1 Add parser\n"));
        assert!(header.contains("Author: Ada <ada@example.com>"));
        assert!(header.contains("1970-01-01 00:00 UTC"));
        assert!(header.ends_with("View:   https://github.com/o/r/tree/abcdef1234"));
        assert!(!header.contains("Longer body"));
    }

    #[test]
    fn test_resolution_layout() {
        let resolution = Resolution {
            index: 0,
            record: CommitAnalysisRecord::new("abc", "## What Changed\nstuff\n\n", None),
            provenance: Provenance::Fresh,
        };
        let details = CommitDetails {
            short_hash: "abc".to_string(),
            message: "init".to_string(),
            ..Default::default()
        };
        let text = plain().resolution(&resolution, &details, 5, None, Some(&stats()));
        assert!(text.starts_with("Commit 1/5  [fresh] 3/12 analyzed (25.0%)\nabc init\n"));
        assert!(text.ends_with("## What Changed\nstuff\n"));
    }

    #[test]
    fn test_diff_plain_and_colored() {
        let diff = "diff --git a/x b/x\n@@ -1 +1 @@\n-old\n+new\n context";
        assert_eq!(plain().diff(diff), diff);

        let colored = Presenter::with_colors(true).diff(diff);
        assert!(colored.contains("\u{1b}["));
        assert!(colored.contains("new"));
        assert_eq!(plain().diff("  \n"), "(no textual changes)");
    }

    #[test]
    fn test_stats_rendering() {
        let p = plain();
        let text = p.stats(Some(&stats()), 2);
        assert!(text.contains("Cached analyses: 3"));
        assert!(text.contains("Saved position:  5"));
        assert!(text.contains("Unsaved:         2"));
        assert_eq!(p.stats(None, 0), "Cache disabled for this run");
    }

    #[test]
    fn test_boundary_messages() {
        let p = plain();
        let next = NavigationError::Boundary {
            direction: Direction::Next,
            index: 4,
            total: 5,
        };
        let prev = NavigationError::Boundary {
            direction: Direction::Previous,
            index: 0,
            total: 5,
        };
        assert_eq!(p.error(&next), "WARNING: Already at the latest commit");
        assert_eq!(p.error(&prev), "WARNING: Already at the first commit");
    }

    #[test]
    fn test_persistence_and_defect_messages() {
        let p = plain();
        let unsaved = NavigationError::Persistence {
            sha: "abcdef123456".to_string(),
            resolution: None,
            source: CacheError::Persistence {
                path: "/x".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"),
            },
        };
        let text = p.error(&unsaved);
        assert!(text.starts_with("WARNING: Analysis for abcdef1 is shown but was not saved"));

        let conflict = NavigationError::Persistence {
            sha: "abcdef123456".to_string(),
            resolution: None,
            source: CacheError::DuplicateKey {
                sha: "abcdef123456".to_string(),
            },
        };
        assert!(p.error(&conflict).starts_with("ERROR: Cache conflict for abcdef1"));
    }

    #[test]
    fn test_analysis_error_hint() {
        let p = plain();
        let retryable = NavigationError::Analysis(AnalysisError::Timeout(120));
        assert!(p.error(&retryable).ends_with("Try the step again."));
        let quota = NavigationError::Analysis(AnalysisError::Quota("daily".to_string()));
        assert!(!p.error(&quota).contains("Try the step again."));
    }

    #[test]
    fn test_start_messages() {
        let report = StartReport {
            decision: StartDecision {
                index: 4,
                mode: StartMode::Resumed,
                clamped_from: None,
            },
            open_outcome: Some(OpenOutcome::Loaded { records: 4 }),
            totals: Some(TotalsUpdate {
                previous: 8,
                current: 10,
                new_commits: 2,
                anomaly: None,
            }),
            degraded: None,
        };
        let text = plain().start(&report, 10);
        assert_eq!(
            text,
            "2 new commits since the last session\nResuming at commit 5 of 10"
        );
    }

    #[test]
    fn test_size_warning() {
        let mut estimate = SizeEstimate::new(100);
        estimate.count_file(&"x".repeat(320));
        let text = plain().size_warning(&estimate, 0.7);
        assert!(text.starts_with(
            "WARNING: Large repository: about 80.0% of the model's context window\n"
        ));
        assert!(text.contains("  Files analyzed:   1\n"));
        assert!(text.contains("  Estimated tokens: ~80\n"));
        assert!(text.contains("  Threshold:        70%\n"));
    }

    #[test]
    fn test_answer() {
        assert_eq!(plain().answer("It parses.\n"), "\nAnswer\n\nIt parses.\n");
        assert!(HELP.contains("a, ask"));
    }
}
