//! Commit analysis collaborators
//!
//! The navigator hands each uncached commit to an [`Analyzer`] together with
//! the current architecture document and stores whatever comes back.

/// Gemini `generateContent` client
pub mod gemini;
/// Prompt construction and response parsing
pub mod prompts;

pub use gemini::{GeminiAnalyzer, GeminiSettings};

use crate::error::AnalysisError;
use crate::history::CommitDetails;

/// Input for one analysis
#[derive(Debug, Clone)]
pub struct CommitContext {
    /// 0-based position in the history
    pub index: usize,
    pub total: usize,
    pub details: CommitDetails,
    /// Architecture document accumulated so far
    pub architecture: Option<String>,
}

impl CommitContext {
    /// The oldest commit, analyzed from a tree snapshot rather than a diff
    pub fn is_initial(&self) -> bool {
        self.index == 0
    }
}

/// Input for a question about the commit being viewed
#[derive(Debug, Clone)]
pub struct QuestionContext {
    pub question: String,
    pub details: CommitDetails,
    pub architecture: Option<String>,
    /// Explanation shown for this commit, if one was resolved
    pub last_explanation: Option<String>,
}

/// Output of one analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub explanation: String,
    /// Replacement architecture document; `None` when the commit does not
    /// change the architecture
    pub architecture_update: Option<String>,
}

impl Analysis {
    pub fn explanation_only(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            architecture_update: None,
        }
    }
}

/// Produces an explanation for a commit
///
/// Implementations must not retry internally; a failed call is reported to
/// the user, who decides whether to retry.
#[async_trait::async_trait]
pub trait Analyzer: Send + Sync + 'static {
    async fn analyze(&self, context: CommitContext) -> Result<Analysis, AnalysisError>;

    /// Answer a free-form question about the current commit
    async fn answer_question(&self, context: QuestionContext) -> Result<String, AnalysisError> {
        let _ = context;
        Err(AnalysisError::NotConfigured(format!(
            "{} cannot answer questions",
            self.name()
        )))
    }

    /// Model or backend name for display
    fn name(&self) -> &str;
}

/// Analyzer used when no API key is configured
///
/// Every call fails with [`AnalysisError::NotConfigured`]; cached analyses
/// remain browsable.
#[derive(Debug, Clone)]
pub struct UnconfiguredAnalyzer {
    reason: String,
}

impl UnconfiguredAnalyzer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl Analyzer for UnconfiguredAnalyzer {
    async fn analyze(&self, _context: CommitContext) -> Result<Analysis, AnalysisError> {
        Err(AnalysisError::NotConfigured(self.reason.clone()))
    }

    async fn answer_question(&self, _context: QuestionContext) -> Result<String, AnalysisError> {
        Err(AnalysisError::NotConfigured(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}
