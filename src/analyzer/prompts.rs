use super::QuestionContext;
use crate::history::{CommitDetails, FileChange};
use chrono::{DateTime, Utc};

/// Marker the model is asked to emit when the architecture is unchanged
pub const NO_UPDATE_MARKER: &str = "NO ARCHITECTURE UPDATE NEEDED";

const UPDATE_HEADING: &str = "## Updated Architecture";

/// Prompt for the first commit: describe the architecture from scratch
pub fn initial_architecture_prompt(details: &CommitDetails) -> String {
    let files_text = details
        .snapshot
        .iter()
        .map(|file| format!("File: {}\n```\n{}\n```", file.path, file.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Analyze this codebase and provide a comprehensive architecture overview. \
This is the first commit of the project.

Files in repository:
{tree}

File contents:
{files_text}

Please provide:
1. Project structure overview
2. Key components and their responsibilities
3. Main technologies and frameworks used
4. Entry points and main workflows
5. Important patterns or architectural decisions

Format your response as a clear, educational markdown document that helps \
someone understand the codebase structure.",
        tree = details.file_tree.join(", "),
    )
}

/// Prompt for any later commit
pub fn commit_prompt(
    details: &CommitDetails,
    architecture: Option<&str>,
    max_diff_chars: usize,
) -> String {
    let date = DateTime::<Utc>::from_timestamp(details.commit_date, 0)
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    let diff: String = details.diff_content.chars().take(max_diff_chars).collect();
    let message = if details.message.is_empty() {
        "No message"
    } else {
        details.message.as_str()
    };

    format!(
        "Analyze this commit and explain the changes in an educational way.

Commit Information:
- SHA: {sha}
- Author: {author}
- Date: {date}
- Message: {message}

Files changed:
{files}

Diff:
```
{diff}
```

Current Architecture:
{architecture}

Please provide:
1. What changed - Summary of the modifications
2. Why it matters - Educational explanation of the purpose and impact
3. Key concepts - Any programming concepts or patterns introduced
4. Architecture impact - Does this change affect the architecture? (YES/NO)

If the architecture is affected, provide an updated architecture document. \
Otherwise, state \"{NO_UPDATE_MARKER}\".

Format your response as:
## What Changed
[summary]

## Why It Matters
[explanation]

## Key Concepts
[concepts]

## Architecture Impact
[YES/NO and explanation]

{UPDATE_HEADING} (if needed)
[updated architecture document or \"{NO_UPDATE_MARKER}\"]",
        sha = details.hash,
        author = details.author_name,
        files = format_files_changed(&details.files_changed),
        architecture = architecture.unwrap_or("No architecture document yet."),
    )
}

fn format_files_changed(files: &[FileChange]) -> String {
    if files.is_empty() {
        return "No files changed".to_string();
    }
    files
        .iter()
        .map(|f| format!("- {} ({})", f.path, f.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for a free-form question about the commit being viewed
pub fn question_prompt(context: &QuestionContext) -> String {
    let files = context
        .details
        .files_changed
        .iter()
        .map(|f| f.path.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Current Context:

Architecture:
{architecture}

Current Commit:
- SHA: {sha}
- Message: {message}
- Files changed: {files}

Recent Explanation:
{explanation}

User Question: {question}

Please provide a clear, educational answer to the user's question based on the \
context above. If you need more information, explain what additional context \
would be helpful.",
        architecture = context
            .architecture
            .as_deref()
            .unwrap_or("No architecture available"),
        sha = context.details.hash,
        message = context.details.message,
        explanation = context
            .last_explanation
            .as_deref()
            .unwrap_or("No recent explanation"),
        question = context.question.trim(),
    )
}

/// Explanation stored for the first commit
pub fn initial_explanation(architecture: &str) -> String {
    format!(
        "# Initial Commit\n\nThis is the first commit of the project. \
The architecture has been analyzed and documented.\n\n{}",
        architecture
    )
}

/// Extract the replacement architecture from a commit analysis response
///
/// Returns `None` when the section is missing, empty, or carries the
/// no-update marker.
pub fn parse_architecture_update(response: &str) -> Option<String> {
    let (_, section) = response.split_once(UPDATE_HEADING)?;
    // Drop the rest of the heading line, e.g. " (if needed)"
    let body = section.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    let body = body.trim();

    if body.is_empty() || body.contains(NO_UPDATE_MARKER) {
        return None;
    }
    Some(body.to_string())
}
