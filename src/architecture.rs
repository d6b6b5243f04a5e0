//! Living architecture document accumulated while walking the history
//!
//! The analyzer receives the current document as context and may return a
//! replacement. Each replacement bumps a monotonically increasing version;
//! the session cache records which commit produced which version.

use crate::cache::RepoIdentity;
use crate::cache::atomic::write_atomic;
use crate::error::CacheError;
use crate::paths::PlatformPaths;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ArchitectureDocument {
    path: Option<PathBuf>,
    content: Option<String>,
    version: u64,
}

impl ArchitectureDocument {
    /// Document location for a repository inside `dir`
    pub fn path_for(dir: &Path, identity: &RepoIdentity) -> PathBuf {
        dir.join(format!(
            "{}.architecture.md",
            PlatformPaths::repo_file_stem(&identity.name, &identity.origin)
        ))
    }

    /// Document that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the document at `path`, resuming at `version`
    ///
    /// A missing or unreadable file yields an empty document; the next update
    /// recreates it.
    pub fn load(path: impl Into<PathBuf>, version: Option<u64>) -> Self {
        let path = path.into();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => {
                tracing::info!(
                    "Loaded architecture document from {:?} ({} bytes)",
                    path,
                    content.len()
                );
                Some(content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Architecture document does not exist: {:?}", path);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to load architecture document {:?}: {}", path, e);
                None
            }
        };

        Self {
            path: Some(path),
            content,
            version: version.unwrap_or(0),
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Current version; 0 until the first update of this lineage
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the document and return its new version
    ///
    /// The in-memory document is updated even when the write fails, so later
    /// analyses still see the latest architecture.
    pub fn update(&mut self, content: String) -> Result<u64, CacheError> {
        self.version += 1;
        tracing::info!(
            "Updating architecture document to version {} ({} bytes)",
            self.version,
            content.len()
        );

        let write_result = match &self.path {
            Some(path) => write_atomic(path, content.as_bytes()).map_err(|e| {
                CacheError::Persistence {
                    path: path.display().to_string(),
                    source: e,
                }
            }),
            None => Ok(()),
        };
        self.content = Some(content);
        write_result.map(|_| self.version)
    }

    /// Write the current content again, e.g. after a failed update
    pub fn save(&self) -> Result<(), CacheError> {
        let (Some(path), Some(content)) = (&self.path, &self.content) else {
            return Ok(());
        };
        write_atomic(path, content.as_bytes()).map_err(|e| CacheError::Persistence {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Delete the document at `path`; a missing file is not an error
    pub fn remove(path: &Path) -> Result<(), CacheError> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::info!("Removed architecture document {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::RemoveFailed {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempdir().unwrap();
        let doc = ArchitectureDocument::load(dir.path().join("a.md"), None);
        assert!(doc.content().is_none());
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn test_update_persists_and_bumps_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        let mut doc = ArchitectureDocument::load(&path, Some(3));

        assert_eq!(doc.update("# Layers".to_string()).unwrap(), 4);
        assert_eq!(doc.update("# Layers v2".to_string()).unwrap(), 5);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Layers v2");

        let reloaded = ArchitectureDocument::load(&path, Some(5));
        assert_eq!(reloaded.content(), Some("# Layers v2"));
        assert_eq!(reloaded.version(), 5);
    }

    #[test]
    fn test_in_memory_update() {
        let mut doc = ArchitectureDocument::in_memory();
        assert_eq!(doc.update("text".to_string()).unwrap(), 1);
        assert_eq!(doc.content(), Some("text"));
        assert!(doc.path().is_none());
    }

    #[test]
    fn test_failed_write_still_updates_memory() {
        let dir = tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"file").unwrap();

        let mut doc = ArchitectureDocument::load(blocked.join("a.md"), None);
        let result = doc.update("new".to_string());
        assert!(matches!(result, Err(CacheError::Persistence { .. })));
        assert_eq!(doc.content(), Some("new"));
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn test_save_after_failed_update() {
        let dir = tempdir().unwrap();
        let parent = dir.path().join("docs");
        std::fs::write(&parent, b"file").unwrap();

        let mut doc = ArchitectureDocument::load(parent.join("a.md"), None);
        assert!(doc.update("v1".to_string()).is_err());

        std::fs::remove_file(&parent).unwrap();
        std::fs::create_dir(&parent).unwrap();
        doc.save().unwrap();
        assert_eq!(std::fs::read_to_string(parent.join("a.md")).unwrap(), "v1");
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "x").unwrap();

        ArchitectureDocument::remove(&path).unwrap();
        assert!(!path.exists());
        ArchitectureDocument::remove(&path).unwrap();
    }

    #[test]
    fn test_path_for_uses_repo_stem() {
        let identity = RepoIdentity::new("demo", "/src/demo");
        let path = ArchitectureDocument::path_for(Path::new("/data"), &identity);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("demo-"));
        assert!(name.ends_with(".architecture.md"));
    }
}
