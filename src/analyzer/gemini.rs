use super::prompts;
use super::{Analysis, Analyzer, CommitContext, QuestionContext};
use crate::error::AnalysisError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default public endpoint of the Generative Language API
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection settings for [`GeminiAnalyzer`]
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
    /// Diff characters included in a commit prompt
    pub max_diff_chars: usize,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Analyzer backed by Gemini's `generateContent` endpoint
pub struct GeminiAnalyzer {
    client: Client,
    settings: GeminiSettings,
}

impl GeminiAnalyzer {
    pub fn new(settings: GeminiSettings) -> Result<Self, AnalysisError> {
        if settings.api_key.trim().is_empty() {
            return Err(AnalysisError::NotConfigured(
                "GEMINI_API_KEY is not set".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::Network(e.to_string()))?;

        tracing::info!("Using Gemini model: {}", settings.model);
        Ok(Self { client, settings })
    }

    async fn generate(&self, prompt: String) -> Result<String, AnalysisError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        tracing::debug!(
            "Gemini responded with {} after {}ms",
            status,
            start.elapsed().as_millis()
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Quota(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AnalysisError::InvalidResponse(
                "response contained no text".to_string(),
            ));
        }
        Ok(text)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> AnalysisError {
        if err.is_timeout() {
            AnalysisError::Timeout(self.settings.timeout_secs)
        } else {
            AnalysisError::Network(err.to_string())
        }
    }
}

#[async_trait::async_trait]
impl Analyzer for GeminiAnalyzer {
    async fn analyze(&self, context: CommitContext) -> Result<Analysis, AnalysisError> {
        let details = &context.details;

        if context.is_initial() {
            tracing::info!(
                "Analyzing initial architecture with {} files",
                details.file_tree.len()
            );
            let architecture = self
                .generate(prompts::initial_architecture_prompt(details))
                .await?;
            return Ok(Analysis {
                explanation: prompts::initial_explanation(&architecture),
                architecture_update: Some(architecture),
            });
        }

        if details.diff_content.trim().is_empty() {
            tracing::warn!("No diff available for commit {}", details.short_hash);
            return Ok(Analysis::explanation_only(
                "This commit has no textual changes to explain.",
            ));
        }

        tracing::info!("Sending commit analysis request for {}", details.short_hash);
        let response = self
            .generate(prompts::commit_prompt(
                details,
                context.architecture.as_deref(),
                self.settings.max_diff_chars,
            ))
            .await?;

        let architecture_update = prompts::parse_architecture_update(&response);
        if architecture_update.is_some() {
            tracing::info!("Architecture update detected for commit {}", details.short_hash);
        }
        Ok(Analysis {
            explanation: response,
            architecture_update,
        })
    }

    async fn answer_question(&self, context: QuestionContext) -> Result<String, AnalysisError> {
        let preview: String = context.question.chars().take(100).collect();
        tracing::info!("Answering question: {}", preview);
        let answer = self.generate(prompts::question_prompt(&context)).await?;
        tracing::debug!("Received answer of {} chars", answer.len());
        Ok(answer)
    }

    fn name(&self) -> &str {
        &self.settings.model
    }
}
