use crate::cache::RepoIdentity;
use crate::error::GitError;
use git2::Repository;
use std::path::{Path, PathBuf};

/// Where the repository to walk comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocator {
    /// Cloned into the workspace, refreshed with a fetch on later runs
    Remote { url: String },
    /// Existing checkout used in place
    Local { path: PathBuf },
}

/// A repository ready to be opened by [`super::GitHistory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRepo {
    pub path: PathBuf,
    /// Revision to walk from; `None` means `HEAD`
    pub revision: Option<String>,
}

impl RepoLocator {
    pub fn remote(url: impl Into<String>) -> Result<Self, GitError> {
        let url = url.into();
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(GitError::InvalidLocator("empty repository URL".to_string()));
        }
        Ok(Self::Remote {
            url: trimmed.to_string(),
        })
    }

    pub fn local(path: impl Into<PathBuf>) -> Result<Self, GitError> {
        let path = path.into();
        if !path.exists() {
            return Err(GitError::InvalidLocator(format!(
                "path does not exist: {}",
                path.display()
            )));
        }
        let path = path.canonicalize().map_err(|e| {
            GitError::InvalidLocator(format!("cannot resolve {}: {}", path.display(), e))
        })?;
        Ok(Self::Local { path })
    }

    /// Repository name: last path segment without a trailing `/` or `.git`
    pub fn repo_name(&self) -> String {
        let raw = match self {
            RepoLocator::Remote { url } => url.clone(),
            RepoLocator::Local { path } => path.display().to_string(),
        };
        let trimmed = raw.trim_end_matches(['/', '\\']);
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        trimmed
            .rsplit(['/', '\\', ':'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("repository")
            .to_string()
    }

    /// Identity used to key the session cache
    pub fn identity(&self) -> RepoIdentity {
        let origin = match self {
            RepoLocator::Remote { url } => url.trim_end_matches('/').to_string(),
            RepoLocator::Local { path } => path.display().to_string(),
        };
        RepoIdentity::new(self.repo_name(), origin)
    }

    /// Origin URL for web links, when there is one
    pub fn origin_url(&self) -> Option<&str> {
        match self {
            RepoLocator::Remote { url } => Some(url),
            RepoLocator::Local { .. } => None,
        }
    }

    /// Make the repository available on disk
    ///
    /// Remote repositories are cloned into `workspace/<name>` on first use.
    /// An existing clone is fetched and walked from `origin/<branch>` (or
    /// `origin/HEAD`), so new upstream commits show up without re-cloning. A
    /// failed fetch is logged and the existing clone is used as is.
    pub fn prepare(
        &self,
        workspace: &Path,
        branch: Option<&str>,
    ) -> Result<PreparedRepo, GitError> {
        match self {
            RepoLocator::Local { path } => Ok(PreparedRepo {
                path: path.clone(),
                revision: branch.map(|b| b.to_string()),
            }),
            RepoLocator::Remote { url } => {
                let target = workspace.join(self.repo_name());
                let repo = if target.exists() {
                    tracing::info!("Repository already exists at {:?}, fetching", target);
                    let repo = Repository::open(&target).map_err(|e| GitError::CloneFailed {
                        url: url.clone(),
                        reason: format!(
                            "{} exists but is not a usable repository: {}",
                            target.display(),
                            e.message()
                        ),
                    })?;
                    if let Err(e) = fetch_origin(&repo) {
                        tracing::warn!("Could not fetch {}, using existing clone: {}", url, e);
                    }
                    repo
                } else {
                    std::fs::create_dir_all(workspace).map_err(|e| GitError::CloneFailed {
                        url: url.clone(),
                        reason: format!("cannot create {}: {}", workspace.display(), e),
                    })?;
                    tracing::info!("Cloning repository from {} into {:?}", url, target);
                    let repo = Repository::clone(url, &target).map_err(|e| GitError::CloneFailed {
                        url: url.clone(),
                        reason: e.message().to_string(),
                    })?;
                    tracing::info!("Successfully cloned repository to {:?}", target);
                    repo
                };

                let revision = remote_revision(&repo, branch);
                tracing::debug!("Walking remote repository from {:?}", revision);
                Ok(PreparedRepo {
                    path: target,
                    revision,
                })
            }
        }
    }
}

fn fetch_origin(repo: &Repository) -> Result<(), GitError> {
    let mut remote = repo
        .find_remote("origin")
        .map_err(|e| GitError::FetchFailed(e.message().to_string()))?;
    remote
        .fetch(&[] as &[&str], None, None)
        .map_err(|e| GitError::FetchFailed(e.message().to_string()))?;
    tracing::debug!("Fetched latest changes from origin");
    Ok(())
}

/// Prefer remote-tracking refs so the walk reflects upstream after a fetch
fn remote_revision(repo: &Repository, branch: Option<&str>) -> Option<String> {
    let candidates: Vec<String> = match branch {
        Some(b) => vec![format!("origin/{}", b), b.to_string()],
        None => vec!["origin/HEAD".to_string()],
    };
    candidates
        .into_iter()
        .find(|rev| repo.revparse_single(rev).is_ok())
        .or_else(|| branch.map(|b| b.to_string()))
}

/// Web URL of a commit's tree on GitHub, `None` for other hosts
pub fn commit_url(origin: &str, sha: &str) -> Option<String> {
    let mut url = origin.trim().trim_end_matches('/').to_string();
    if let Some(rest) = url.strip_prefix("git@github.com:") {
        url = format!("https://github.com/{}", rest);
    }
    if let Some(stripped) = url.strip_suffix(".git") {
        url = stripped.to_string();
    }
    if !url.contains("github.com") {
        return None;
    }
    Some(format!("{}/tree/{}", url, sha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_source_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("a.txt"), "one\n").unwrap();
        {
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("a.txt")).unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let sig = git2::Signature::now("Test", "test@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "first", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_repo_name_from_urls() {
        let cases = [
            ("https://github.com/owner/project", "project"),
            ("https://github.com/owner/project.git", "project"),
            ("https://github.com/owner/project/", "project"),
            ("git@github.com:owner/project.git", "project"),
        ];
        for (url, expected) in cases {
            assert_eq!(RepoLocator::remote(url).unwrap().repo_name(), expected);
        }
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(matches!(
            RepoLocator::remote("  "),
            Err(GitError::InvalidLocator(_))
        ));
    }

    #[test]
    fn test_missing_local_path_rejected() {
        let result = RepoLocator::local("/definitely/not/here");
        assert!(matches!(result, Err(GitError::InvalidLocator(_))));
    }

    #[test]
    fn test_local_identity_uses_canonical_path() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("project");
        std::fs::create_dir(&project).unwrap();

        let locator = RepoLocator::local(&project).unwrap();
        let identity = locator.identity();
        assert_eq!(identity.name, "project");
        assert_eq!(
            identity.origin,
            project.canonicalize().unwrap().display().to_string()
        );
        assert!(locator.origin_url().is_none());
    }

    #[test]
    fn test_local_prepare_passes_branch() {
        let dir = TempDir::new().unwrap();
        let locator = RepoLocator::local(dir.path()).unwrap();
        let prepared = locator.prepare(dir.path(), Some("dev")).unwrap();
        assert_eq!(prepared.revision.as_deref(), Some("dev"));
    }

    #[test]
    fn test_clone_then_reuse() {
        let source_dir = TempDir::new().unwrap();
        let source = source_dir.path().join("upstream");
        std::fs::create_dir(&source).unwrap();
        init_source_repo(&source);

        let workspace = TempDir::new().unwrap();
        let locator = RepoLocator::remote(source.display().to_string()).unwrap();

        let first = locator.prepare(workspace.path(), None).unwrap();
        assert_eq!(first.path, workspace.path().join("upstream"));
        assert!(first.path.join("a.txt").exists());

        // Second run fetches into the existing clone
        let second = locator.prepare(workspace.path(), None).unwrap();
        assert_eq!(second.path, first.path);
    }

    #[test]
    fn test_clone_failure() {
        let workspace = TempDir::new().unwrap();
        let locator = RepoLocator::remote("/no/such/upstream/repo").unwrap();
        let result = locator.prepare(workspace.path(), None);
        assert!(matches!(result, Err(GitError::CloneFailed { .. })));
    }

    #[test]
    fn test_commit_url() {
        assert_eq!(
            commit_url("https://github.com/owner/repo.git", "abc").as_deref(),
            Some("https://github.com/owner/repo/tree/abc")
        );
        assert_eq!(
            commit_url("git@github.com:owner/repo.git", "abc").as_deref(),
            Some("https://github.com/owner/repo/tree/abc")
        );
        assert_eq!(
            commit_url("https://github.com/owner/repo/", "abc").as_deref(),
            Some("https://github.com/owner/repo/tree/abc")
        );
        assert!(commit_url("https://gitlab.com/owner/repo", "abc").is_none());
    }
}
