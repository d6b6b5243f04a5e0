use super::size::{self, MAX_COUNTED_FILE_BYTES, SKIPPED_DIRS, SizeEstimate};
use super::{ChangeKind, CommitDetails, FileChange, FileSnapshot, HistorySource};
use crate::error::GitError;
use git2::{Delta, DiffOptions, Oid, Repository, Sort, TreeWalkMode, TreeWalkResult};
use std::path::{Path, PathBuf};

/// File extensions worth showing the analyzer for the first commit
const SNAPSHOT_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "java", "go", "rs", "cpp", "c", "h", "md", "txt", "json", "yaml", "yml",
    "toml",
];

/// Limits applied when extracting commit details
#[derive(Debug, Clone)]
pub struct HistoryOptions {
    /// Diff text beyond this many bytes is cut off
    pub max_diff_bytes: usize,
    /// Files included in the first-commit snapshot
    pub max_snapshot_files: usize,
    /// Files larger than this are left out of the snapshot
    pub max_snapshot_file_bytes: usize,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            max_diff_bytes: 100_000,
            max_snapshot_files: 20,
            max_snapshot_file_bytes: 10_000,
        }
    }
}

/// Oldest-first commit history of a git repository
pub struct GitHistory {
    repo: Repository,
    repo_path: PathBuf,
    commits: Vec<String>,
    options: HistoryOptions,
}

impl GitHistory {
    /// Discover a repository from any path within it and list its commits
    ///
    /// `revision` selects the tip to walk from (branch, tag, `origin/HEAD`,
    /// ...); `None` walks from `HEAD`. A repository without commits yields an
    /// empty history.
    pub fn open<P: AsRef<Path>>(
        path: P,
        revision: Option<&str>,
        options: HistoryOptions,
    ) -> Result<Self, GitError> {
        let path = path.as_ref();

        let discovered = Repository::discover(path)
            .map_err(|e| GitError::RepoNotFound(format!("{}: {}", path.display(), e.message())))?;
        let repo_path = discovered
            .workdir()
            .unwrap_or_else(|| discovered.path())
            .to_path_buf();
        drop(discovered);

        let repo = Repository::open(&repo_path)
            .map_err(|e| GitError::OpenFailed(e.message().to_string()))?;

        tracing::info!("Opened git repository at: {}", repo_path.display());

        let commits = Self::list_commits(&repo, revision)?;
        tracing::info!(
            "Loaded {} commits from {}",
            commits.len(),
            revision.unwrap_or("HEAD")
        );

        Ok(Self {
            repo,
            repo_path,
            commits,
            options,
        })
    }

    fn list_commits(repo: &Repository, revision: Option<&str>) -> Result<Vec<String>, GitError> {
        let walk_err = |e: git2::Error| GitError::WalkFailed(e.message().to_string());

        let tip = match revision {
            Some(rev) => {
                let object = repo
                    .revparse_single(rev)
                    .map_err(|_| GitError::RevisionNotFound(rev.to_string()))?;
                let commit = object
                    .peel_to_commit()
                    .map_err(|_| GitError::RevisionNotFound(rev.to_string()))?;
                commit.id()
            }
            None => match repo.head() {
                Ok(head) => head
                    .peel_to_commit()
                    .map_err(|e| GitError::RevisionNotFound(format!("HEAD: {}", e.message())))?
                    .id(),
                Err(_) => {
                    tracing::warn!("Repository has no commits yet");
                    return Ok(Vec::new());
                }
            },
        };

        let mut revwalk = repo.revwalk().map_err(walk_err)?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)
            .map_err(walk_err)?;
        revwalk.push(tip).map_err(walk_err)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(walk_err)?;
            commits.push(oid.to_string());
            if commits.len() % 500 == 0 {
                tracing::debug!("Listed {} commits", commits.len());
            }
        }
        Ok(commits)
    }

    /// Get the repository root path
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Get the current branch name, or None if detached HEAD
    pub fn current_branch(&self) -> Option<String> {
        self.repo.head().ok()?.shorthand().map(|s| s.to_string())
    }

    /// Estimate the tokens of the newest commit's tree
    ///
    /// Binary and very large files are skipped, as are dependency and build
    /// directories. An empty history gives an empty estimate.
    pub fn estimate_size(&self, context_window: usize) -> Result<SizeEstimate, GitError> {
        let mut estimate = SizeEstimate::new(context_window);
        let Some(tip) = self.commits.last() else {
            return Ok(estimate);
        };
        let read_err = |e: git2::Error| GitError::CommitReadFailed {
            sha: tip.clone(),
            reason: e.message().to_string(),
        };

        let oid = Oid::from_str(tip).map_err(read_err)?;
        let tree = self
            .repo
            .find_commit(oid)
            .and_then(|commit| commit.tree())
            .map_err(read_err)?;

        let mut candidates: Vec<Oid> = Vec::new();
        let mut skipped = 0;
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            let Some(name) = entry.name() else {
                return TreeWalkResult::Ok;
            };
            match entry.kind() {
                Some(git2::ObjectType::Tree) if SKIPPED_DIRS.contains(&name) => {
                    TreeWalkResult::Skip
                }
                Some(git2::ObjectType::Blob) => {
                    if size::is_counted(&format!("{}{}", root, name)) {
                        candidates.push(entry.id());
                    } else {
                        skipped += 1;
                    }
                    TreeWalkResult::Ok
                }
                _ => TreeWalkResult::Ok,
            }
        })
        .map_err(read_err)?;

        for _ in 0..skipped {
            estimate.skip_file();
        }
        for oid in candidates {
            let blob = self.repo.find_blob(oid).map_err(read_err)?;
            if blob.is_binary() || blob.size() > MAX_COUNTED_FILE_BYTES {
                estimate.skip_file();
                continue;
            }
            estimate.count_file(&String::from_utf8_lossy(blob.content()));
        }

        tracing::info!(
            "Repository size: {} files, ~{} tokens ({:.2}% of context window)",
            estimate.file_count,
            estimate.token_count,
            estimate.percentage()
        );
        tracing::debug!("Skipped {} files", estimate.skipped_files);
        Ok(estimate)
    }

    fn extract_details(
        &self,
        index: usize,
        commit: &git2::Commit,
    ) -> Result<CommitDetails, GitError> {
        let hash = commit.id().to_string();
        let author = commit.author();
        let parent_hashes: Vec<String> = commit.parent_ids().map(|id| id.to_string()).collect();

        let (files_changed, diff_content, diff_truncated) = self.extract_diff(commit)?;

        let (file_tree, snapshot) = if index == 0 {
            self.snapshot_tree(commit)?
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(CommitDetails {
            short_hash: hash.chars().take(7).collect(),
            hash,
            message: commit.message().unwrap_or("").trim().to_string(),
            author_name: author.name().unwrap_or("Unknown").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            commit_date: commit.time().seconds(),
            parent_hashes,
            files_changed,
            diff_content,
            diff_truncated,
            file_tree,
            snapshot,
        })
    }

    /// Extract changed files and the unified diff against the first parent
    fn extract_diff(
        &self,
        commit: &git2::Commit,
    ) -> Result<(Vec<FileChange>, String, bool), GitError> {
        let sha = commit.id().to_string();
        let diff_err = |e: git2::Error| GitError::DiffFailed {
            sha: sha.clone(),
            reason: e.message().to_string(),
        };

        let tree = commit.tree().map_err(diff_err)?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0).and_then(|p| p.tree()).map_err(diff_err)?)
        } else {
            None
        };

        let mut diff_opts = DiffOptions::new();
        diff_opts
            .context_lines(3)
            .interhunk_lines(0)
            .ignore_whitespace(false);

        // Root commits diff against the empty tree
        let mut diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut diff_opts))
            .map_err(diff_err)?;
        diff.find_similar(None).map_err(diff_err)?;

        let mut files_changed = Vec::new();
        for delta in diff.deltas() {
            let kind = match delta.status() {
                Delta::Added | Delta::Copied | Delta::Untracked => ChangeKind::Added,
                Delta::Deleted => ChangeKind::Deleted,
                Delta::Renamed => ChangeKind::Renamed,
                _ => ChangeKind::Modified,
            };
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.display().to_string());
            if let Some(path) = path {
                files_changed.push(FileChange { path, kind });
            }
        }

        let max_bytes = self.options.max_diff_bytes;
        let mut diff_content = String::new();
        let mut diff_truncated = false;

        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            if diff_truncated {
                return true;
            }
            // Skip binary files
            if line.origin() == 'B' {
                return true;
            }
            if diff_content.len() >= max_bytes {
                diff_truncated = true;
                return true;
            }

            let origin = line.origin();
            if let Ok(content) = std::str::from_utf8(line.content()) {
                match origin {
                    '+' | '-' | ' ' => {
                        diff_content.push(origin);
                        diff_content.push_str(content);
                    }
                    'F' | 'H' => diff_content.push_str(content),
                    _ => {}
                }
            } else {
                tracing::debug!("Skipping diff line with invalid UTF-8");
            }
            true
        })
        .map_err(diff_err)?;

        if diff_content.len() > max_bytes {
            truncate_at_char_boundary(&mut diff_content, max_bytes);
            diff_truncated = true;
        }
        if diff_truncated {
            diff_content.push_str("\n\n[... diff truncated ...]");
            tracing::warn!("Truncated large diff for commit {}", sha);
        }

        Ok((files_changed, diff_content, diff_truncated))
    }

    /// All paths of the commit's tree plus a handful of readable source files
    fn snapshot_tree(
        &self,
        commit: &git2::Commit,
    ) -> Result<(Vec<String>, Vec<FileSnapshot>), GitError> {
        let sha = commit.id().to_string();
        let read_err = |e: git2::Error| GitError::CommitReadFailed {
            sha: sha.clone(),
            reason: e.message().to_string(),
        };

        let tree = commit.tree().map_err(read_err)?;
        let mut blobs: Vec<(String, Oid)> = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob)
                && let Some(name) = entry.name()
            {
                blobs.push((format!("{}{}", root, name), entry.id()));
            }
            TreeWalkResult::Ok
        })
        .map_err(read_err)?;
        blobs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut snapshot = Vec::new();
        for (path, oid) in &blobs {
            if snapshot.len() >= self.options.max_snapshot_files {
                break;
            }
            let wanted = Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| SNAPSHOT_EXTENSIONS.contains(&ext));
            if !wanted {
                continue;
            }
            let blob = self.repo.find_blob(*oid).map_err(read_err)?;
            if blob.is_binary() || blob.size() >= self.options.max_snapshot_file_bytes {
                continue;
            }
            if let Ok(content) = std::str::from_utf8(blob.content()) {
                snapshot.push(FileSnapshot {
                    path: path.clone(),
                    content: content.to_string(),
                });
            }
        }

        tracing::debug!(
            "Snapshot of first commit: {} files, {} captured",
            blobs.len(),
            snapshot.len()
        );
        let file_tree = blobs.into_iter().map(|(path, _)| path).collect();
        Ok((file_tree, snapshot))
    }
}

impl HistorySource for GitHistory {
    fn len(&self) -> usize {
        self.commits.len()
    }

    fn commit_id(&self, index: usize) -> Option<&str> {
        self.commits.get(index).map(|s| s.as_str())
    }

    fn commit_details(&self, index: usize) -> Result<CommitDetails, GitError> {
        let sha = self.commit_id(index).ok_or(GitError::IndexOutOfRange {
            index,
            total: self.commits.len(),
        })?;
        let read_err = |reason: String| GitError::CommitReadFailed {
            sha: sha.to_string(),
            reason,
        };

        let oid = Oid::from_str(sha).map_err(|e| read_err(e.message().to_string()))?;
        let commit = self
            .repo
            .find_commit(oid)
            .map_err(|e| read_err(e.message().to_string()))?;
        self.extract_details(index, &commit)
    }
}

/// Cut `text` to at most `max` bytes without splitting a UTF-8 sequence
pub(crate) fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        let file_path = workdir.join(name);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&file_path, content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Test Author", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    fn fixture() -> (TempDir, Vec<Oid>) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let ids = vec![
            commit_file(&repo, "README.md", "# Demo\n", "Initial commit"),
            commit_file(&repo, "src/main.rs", "fn main() {}\n", "Add entry point"),
            commit_file(
                &repo,
                "src/main.rs",
                "fn main() {\n    println!(\"hi\");\n}\n",
                "Print greeting",
            ),
        ];
        (dir, ids)
    }

    #[test]
    fn test_estimate_size_counts_tip_tree() {
        let (dir, _) = fixture();
        let repo = Repository::open(dir.path()).unwrap();
        commit_file(&repo, "node_modules/dep/index.js", &"x".repeat(4000), "Vendor");
        commit_file(&repo, "logo.png", "not really an image", "Add logo");

        let history = GitHistory::open(dir.path(), None, HistoryOptions::default()).unwrap();
        let estimate = history.estimate_size(100).unwrap();

        // README.md (7 chars) and src/main.rs (34 chars)
        assert_eq!(estimate.file_count, 2);
        assert_eq!(estimate.token_count, 1 + 8);
        assert_eq!(estimate.skipped_files, 1);
        assert!(estimate.exceeds(0.05));
        assert!(!estimate.exceeds(0.7));
    }

    #[test]
    fn test_estimate_size_of_empty_history() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();
        let history = GitHistory::open(dir.path(), None, HistoryOptions::default()).unwrap();
        let estimate = history.estimate_size(1_000).unwrap();
        assert_eq!(estimate.file_count, 0);
        assert_eq!(estimate.percentage(), 0.0);
    }

    #[test]
    fn test_commits_are_oldest_first() {
        let (dir, ids) = fixture();
        let history = GitHistory::open(dir.path(), None, HistoryOptions::default()).unwrap();

        assert_eq!(history.len(), 3);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(history.commit_id(i), Some(id.to_string().as_str()));
        }
    }

    #[test]
    fn test_first_commit_has_snapshot() {
        let (dir, _) = fixture();
        let history = GitHistory::open(dir.path(), None, HistoryOptions::default()).unwrap();

        let first = history.commit_details(0).unwrap();
        assert_eq!(first.message, "Initial commit");
        assert_eq!(first.author_name, "Test Author");
        assert!(first.parent_hashes.is_empty());
        assert_eq!(first.file_tree, vec!["README.md".to_string()]);
        assert_eq!(first.snapshot.len(), 1);
        assert_eq!(first.snapshot[0].content, "# Demo\n");
        assert_eq!(
            first.files_changed,
            vec![FileChange {
                path: "README.md".to_string(),
                kind: ChangeKind::Added
            }]
        );
    }

    #[test]
    fn test_later_commit_diff() {
        let (dir, ids) = fixture();
        let history = GitHistory::open(dir.path(), None, HistoryOptions::default()).unwrap();

        let third = history.commit_details(2).unwrap();
        assert_eq!(third.hash.len(), 40);
        assert_eq!(third.short_hash.len(), 7);
        assert_eq!(third.parent_hashes, vec![ids[1].to_string()]);
        assert!(third.snapshot.is_empty());
        assert_eq!(third.files_changed[0].kind, ChangeKind::Modified);
        assert!(third.diff_content.contains("+    println!(\"hi\");"));
        assert!(!third.diff_truncated);
    }

    #[test]
    fn test_diff_truncation() {
        let (dir, _) = fixture();
        let options = HistoryOptions {
            max_diff_bytes: 16,
            ..HistoryOptions::default()
        };
        let history = GitHistory::open(dir.path(), None, options).unwrap();

        let details = history.commit_details(2).unwrap();
        assert!(details.diff_truncated);
        assert!(details.diff_content.ends_with("[... diff truncated ...]"));
    }

    #[test]
    fn test_revision_selects_tip() {
        let (dir, ids) = fixture();
        let rev = ids[1].to_string();
        let history = GitHistory::open(dir.path(), Some(&rev), HistoryOptions::default()).unwrap();
        assert_eq!(history.len(), 2);

        let missing =
            GitHistory::open(dir.path(), Some("no-such-branch"), HistoryOptions::default());
        assert!(matches!(missing, Err(GitError::RevisionNotFound(_))));
    }

    #[test]
    fn test_empty_repository() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();
        let history = GitHistory::open(dir.path(), None, HistoryOptions::default()).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_not_a_repository() {
        let dir = TempDir::new().unwrap();
        let result = GitHistory::open(dir.path(), None, HistoryOptions::default());
        assert!(matches!(result, Err(GitError::RepoNotFound(_))));
    }

    #[test]
    fn test_index_out_of_range() {
        let (dir, _) = fixture();
        let history = GitHistory::open(dir.path(), None, HistoryOptions::default()).unwrap();
        assert!(matches!(
            history.commit_details(3),
            Err(GitError::IndexOutOfRange { index: 3, total: 3 })
        ));
    }

    #[test]
    fn test_truncate_at_char_boundary() {
        let mut text = "héllo".to_string();
        truncate_at_char_boundary(&mut text, 2);
        assert_eq!(text, "h");

        let mut short = "abc".to_string();
        truncate_at_char_boundary(&mut short, 10);
        assert_eq!(short, "abc");
    }
}
