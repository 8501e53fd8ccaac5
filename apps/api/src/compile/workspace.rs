//! Per-request compilation workspaces.
//!
//! Every compile gets `<root>/<uuid-v4>/` to itself: the source file, the
//! toolchain's log and auxiliary files, and the PDF all live there. Directory
//! names are the workspace ids, so retrieval by id never touches a path the
//! client controls.

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SOURCE_FILE: &str = "document.tex";
pub const LOG_FILE: &str = "document.log";
pub const ARTIFACT_FILE: &str = "document.pdf";

/// What happens to a workspace once the response no longer needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Remove the directory as soon as its artifact or log has been read.
    DeleteAfterResponse,
    /// Leave directories in place; a background task removes any older than `max_age`.
    Sweep { max_age: Duration },
}

impl FromStr for RetentionPolicy {
    type Err = anyhow::Error;

    /// Accepts `delete` or `sweep:<seconds>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("delete") {
            return Ok(RetentionPolicy::DeleteAfterResponse);
        }
        if let Some(secs) = s.strip_prefix("sweep:") {
            let secs = secs
                .parse::<u64>()
                .with_context(|| format!("invalid sweep age '{secs}' in WORKSPACE_RETENTION"))?;
            return Ok(RetentionPolicy::Sweep {
                max_age: Duration::from_secs(secs),
            });
        }
        bail!("WORKSPACE_RETENTION must be 'delete' or 'sweep:<seconds>', got '{s}'")
    }
}

/// An isolated scratch directory owned by exactly one compile request.
#[derive(Debug, Clone)]
pub struct CompilationWorkspace {
    id: Uuid,
    dir: PathBuf,
}

impl CompilationWorkspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.join(SOURCE_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.dir.join(ARTIFACT_FILE)
    }

    pub async fn write_source(&self, source: &str) -> io::Result<()> {
        tokio::fs::write(self.source_path(), source).await
    }
}

/// Creates, resolves and removes workspaces under a single root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh workspace. `create_dir` (not `create_dir_all`) on the
    /// leaf means an existing directory is an error, never a shared workspace.
    pub async fn create(&self) -> io::Result<CompilationWorkspace> {
        tokio::fs::create_dir_all(&self.root).await?;

        let id = Uuid::new_v4();
        let dir = self.root.join(id.to_string());
        tokio::fs::create_dir(&dir).await?;

        debug!(workspace_id = %id, "Created compilation workspace");
        Ok(CompilationWorkspace { id, dir })
    }

    /// Resolves an existing workspace by id, if it is still on disk.
    pub async fn open(&self, id: Uuid) -> Option<CompilationWorkspace> {
        let dir = self.root.join(id.to_string());
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Some(CompilationWorkspace { id, dir }),
            _ => None,
        }
    }

    pub async fn remove(&self, workspace: &CompilationWorkspace) -> io::Result<()> {
        tokio::fs::remove_dir_all(workspace.dir()).await?;
        debug!(workspace_id = %workspace.id(), "Removed compilation workspace");
        Ok(())
    }

    /// Removes workspaces last modified more than `max_age` ago.
    /// Only directories named by a UUID are considered. Returns how many were removed.
    pub async fn sweep(&self, max_age: Duration) -> io::Result<usize> {
        let max_age = chrono::Duration::from_std(max_age)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        let cutoff = Utc::now() - max_age;

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let is_workspace = entry
                .file_name()
                .to_str()
                .is_some_and(|name| Uuid::parse_str(name).is_ok());
            if !is_workspace {
                continue;
            }

            let meta = entry.metadata().await?;
            if !meta.is_dir() {
                continue;
            }
            let modified: DateTime<Utc> = meta.modified()?.into();
            if modified >= cutoff {
                continue;
            }

            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => removed += 1,
                // Another sweep or a delete-after-response got there first.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to sweep workspace {:?}: {e}", entry.path()),
            }
        }

        Ok(removed)
    }
}

/// Runs `sweep(max_age)` periodically for as long as the returned task lives.
pub fn spawn_sweeper(workspaces: WorkspaceManager, max_age: Duration) -> JoinHandle<()> {
    let period = (max_age / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match workspaces.sweep(max_age).await {
                Ok(0) => {}
                Ok(n) => info!("Swept {n} expired compilation workspaces"),
                Err(e) => warn!("Workspace sweep failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_gives_distinct_directories() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let a = manager.create().await.unwrap();
        let b = manager.create().await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().is_dir());
        assert!(b.dir().starts_with(root.path()));
    }

    #[tokio::test]
    async fn test_create_makes_missing_root() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path().join("nested").join("ws"));
        let ws = manager.create().await.unwrap();
        assert!(ws.dir().is_dir());
    }

    #[tokio::test]
    async fn test_write_source_lands_in_workspace() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let ws = manager.create().await.unwrap();

        ws.write_source("\\documentclass{article}").await.unwrap();

        let written = std::fs::read_to_string(ws.dir().join(SOURCE_FILE)).unwrap();
        assert_eq!(written, "\\documentclass{article}");
    }

    #[tokio::test]
    async fn test_open_and_remove() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let ws = manager.create().await.unwrap();

        assert!(manager.open(ws.id()).await.is_some());
        manager.remove(&ws).await.unwrap();
        assert!(manager.open(ws.id()).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_respects_age_and_skips_foreign_entries() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let ws = manager.create().await.unwrap();
        std::fs::create_dir(root.path().join("not-a-workspace")).unwrap();

        assert_eq!(manager.sweep(Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(ws.dir().exists());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.sweep(Duration::ZERO).await.unwrap(), 1);
        assert!(!ws.dir().exists());
        assert!(root.path().join("not-a-workspace").exists());
    }

    #[tokio::test]
    async fn test_sweep_missing_root_is_noop() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path().join("never-created"));
        assert_eq!(manager.sweep(Duration::ZERO).await.unwrap(), 0);
    }

    #[test]
    fn test_retention_policy_parsing() {
        assert_eq!(
            "delete".parse::<RetentionPolicy>().unwrap(),
            RetentionPolicy::DeleteAfterResponse
        );
        assert_eq!(
            "sweep:90".parse::<RetentionPolicy>().unwrap(),
            RetentionPolicy::Sweep {
                max_age: Duration::from_secs(90)
            }
        );
        assert!("sweep:soon".parse::<RetentionPolicy>().is_err());
        assert!("forever".parse::<RetentionPolicy>().is_err());
    }
}
