//! Temporary resource cleanup.
//!
//! Every temp file or directory created on behalf of a session is
//! registered here under its (workspace, session) scope. Resources are
//! deleted when a session settles, when a workspace closes, on shutdown,
//! or by the background sweeper once they outlive `max_age`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupKind {
    File,
    Directory,
}

#[derive(Debug, Clone)]
struct CleanupEntry {
    path: PathBuf,
    kind: CleanupKind,
    created_at: Instant,
}

type EntryKey = (String, String, PathBuf);

/// Registry of temporary resources with a periodic age-based sweeper.
///
/// Instances are injected wherever temp resources are created; there is no
/// process-global registry. Deletion runs with no lock held, so slow
/// filesystem calls never block new registrations.
pub struct CleanupManager {
    entries: Mutex<HashMap<EntryKey, CleanupEntry>>,
    max_age: Duration,
    sweep_interval: Duration,
    cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupManager {
    pub fn new(sweep_interval: Duration, max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_age,
            sweep_interval,
            cancel: CancellationToken::new(),
            sweeper: Mutex::new(None),
        }
    }

    /// Register a resource for later cleanup. Re-registering the same path
    /// in the same scope refreshes its age.
    pub fn register(
        &self,
        workspace_id: &str,
        session_id: &str,
        path: impl Into<PathBuf>,
        kind: CleanupKind,
    ) {
        let path = path.into();
        debug!("Registering {:?} for cleanup ({}/{})", path, workspace_id, session_id);
        let key = (workspace_id.to_string(), session_id.to_string(), path.clone());
        self.entries.lock().unwrap().insert(
            key,
            CleanupEntry {
                path,
                kind,
                created_at: Instant::now(),
            },
        );
    }

    /// Drop a path from the registry without deleting it.
    pub fn unregister(&self, workspace_id: &str, session_id: &str, path: &Path) {
        let key = (
            workspace_id.to_string(),
            session_id.to_string(),
            path.to_path_buf(),
        );
        self.entries.lock().unwrap().remove(&key);
    }

    pub fn registered_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Delete everything registered for one session. With a workspace id
    /// the scope is exact; without one, all sessions with that id across
    /// workspaces are swept.
    pub async fn cleanup_session(&self, session_id: &str, workspace_id: Option<&str>) -> usize {
        let drained = self.drain(|key| {
            key.1 == session_id && workspace_id.map(|w| key.0 == w).unwrap_or(true)
        });
        self.delete_all(drained).await
    }

    /// Delete everything registered under one workspace.
    pub async fn cleanup_workspace(&self, workspace_id: &str) -> usize {
        let drained = self.drain(|key| key.0 == workspace_id);
        self.delete_all(drained).await
    }

    /// Delete every registered resource. Called on shutdown.
    pub async fn cleanup_all(&self) -> usize {
        let drained = self.drain(|_| true);
        self.delete_all(drained).await
    }

    /// One sweep pass: delete resources older than `max_age`.
    pub async fn sweep_once(&self) -> usize {
        let max_age = self.max_age;
        let drained = {
            let mut entries = self.entries.lock().unwrap();
            let expired: Vec<EntryKey> = entries
                .iter()
                .filter(|(_, e)| e.created_at.elapsed() > max_age)
                .map(|(k, _)| k.clone())
                .collect();
            expired
                .into_iter()
                .filter_map(|k| entries.remove(&k))
                .collect::<Vec<_>>()
        };
        self.delete_all(drained).await
    }

    /// Start the background sweeper. Idempotent; a second call is a no-op.
    pub fn start_sweeper(self: &std::sync::Arc<Self>) {
        let mut slot = self.sweeper.lock().unwrap();
        if slot.is_some() {
            return;
        }
        let manager = std::sync::Arc::clone(self);
        let cancel = self.cancel.clone();
        let interval = self.sweep_interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let swept = manager.sweep_once().await;
                        if swept > 0 {
                            debug!("Sweeper removed {} expired resources", swept);
                        }
                    }
                }
            }
        }));
    }

    /// Stop the sweeper and delete everything still registered.
    pub async fn shutdown(&self) -> usize {
        self.cancel.cancel();
        let handle = self.sweeper.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.cleanup_all().await
    }

    fn drain(&self, keep: impl Fn(&EntryKey) -> bool) -> Vec<CleanupEntry> {
        let mut entries = self.entries.lock().unwrap();
        let matching: Vec<EntryKey> = entries.keys().filter(|k| keep(k)).cloned().collect();
        matching
            .into_iter()
            .filter_map(|k| entries.remove(&k))
            .collect()
    }

    async fn delete_all(&self, drained: Vec<CleanupEntry>) -> usize {
        let mut deleted = 0;
        for entry in drained {
            let result = match entry.kind {
                CleanupKind::File => tokio::fs::remove_file(&entry.path).await,
                CleanupKind::Directory => tokio::fs::remove_dir_all(&entry.path).await,
            };
            match result {
                Ok(()) => {
                    debug!("Deleted {:?}", entry.path);
                    deleted += 1;
                }
                // Already gone counts as cleaned.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => deleted += 1,
                Err(e) => warn!("Could not delete {:?}: {}", entry.path, e),
            }
        }
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn manager() -> CleanupManager {
        CleanupManager::new(Duration::from_secs(60), Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_cleanup_session_scopes_by_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tmp");
        let b = dir.path().join("b.tmp");
        std::fs::write(&a, "").unwrap();
        std::fs::write(&b, "").unwrap();

        let mgr = manager();
        mgr.register("ws1", "sess", &a, CleanupKind::File);
        mgr.register("ws2", "sess", &b, CleanupKind::File);

        let deleted = mgr.cleanup_session("sess", Some("ws1")).await;
        assert_eq!(deleted, 1);
        assert!(!a.exists());
        assert!(b.exists());
        assert_eq!(mgr.registered_count(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_session_without_workspace_sweeps_all() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tmp");
        let b = dir.path().join("b.tmp");
        std::fs::write(&a, "").unwrap();
        std::fs::write(&b, "").unwrap();

        let mgr = manager();
        mgr.register("ws1", "sess", &a, CleanupKind::File);
        mgr.register("ws2", "sess", &b, CleanupKind::File);

        let deleted = mgr.cleanup_session("sess", None).await;
        assert_eq!(deleted, 2);
        assert_eq!(mgr.registered_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_path_counts_as_cleaned() {
        let mgr = manager();
        mgr.register("ws", "sess", "/nowhere/already-gone.tmp", CleanupKind::File);
        let deleted = mgr.cleanup_session("sess", Some("ws")).await;
        assert_eq!(deleted, 1);
    }

    #[tokio::test]
    async fn test_directory_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("scratch");
        std::fs::create_dir_all(target.join("inner")).unwrap();

        let mgr = manager();
        mgr.register("ws", "sess", &target, CleanupKind::Directory);
        mgr.cleanup_workspace("ws").await;
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_reregister_refreshes_single_entry() {
        let mgr = manager();
        mgr.register("ws", "sess", "/tmp/same.tmp", CleanupKind::File);
        mgr.register("ws", "sess", "/tmp/same.tmp", CleanupKind::File);
        assert_eq!(mgr.registered_count(), 1);
    }

    #[tokio::test]
    async fn test_unregister_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let keep = dir.path().join("keep.tmp");
        std::fs::write(&keep, "").unwrap();

        let mgr = manager();
        mgr.register("ws", "sess", &keep, CleanupKind::File);
        mgr.unregister("ws", "sess", &keep);

        mgr.cleanup_all().await;
        assert!(keep.exists());
    }

    #[tokio::test]
    async fn test_sweep_only_removes_expired() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("fresh.tmp");
        std::fs::write(&fresh, "").unwrap();

        // max_age of zero expires everything immediately
        let expiring = CleanupManager::new(Duration::from_secs(60), Duration::from_secs(0));
        expiring.register("ws", "sess", &fresh, CleanupKind::File);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(expiring.sweep_once().await, 1);
        assert!(!fresh.exists());

        let patient = manager();
        let young = dir.path().join("young.tmp");
        std::fs::write(&young, "").unwrap();
        patient.register("ws", "sess", &young, CleanupKind::File);
        assert_eq!(patient.sweep_once().await, 0);
        assert!(young.exists());
    }

    #[tokio::test]
    async fn test_shutdown_stops_sweeper_and_cleans() {
        let dir = tempfile::tempdir().unwrap();
        let leftover = dir.path().join("leftover.tmp");
        std::fs::write(&leftover, "").unwrap();

        let mgr = Arc::new(CleanupManager::new(
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        ));
        mgr.start_sweeper();
        mgr.register("ws", "sess", &leftover, CleanupKind::File);

        let deleted = mgr.shutdown().await;
        assert_eq!(deleted, 1);
        assert!(!leftover.exists());
    }
}
