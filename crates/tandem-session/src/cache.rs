//! Per-session data shared by every open handle on the same session.
//!
//! Several [`SessionFile`](crate::SessionFile)s can be open on one session
//! (an editor and a renderer, say). They share the time of the last save and
//! the last saved snapshot through one [`SessionData`], looked up by session
//! id in a [`SessionCache`]. Entries nobody but the cache holds are
//! collected whenever a handle closes; collecting an entry deletes the
//! session's temp file, since reaching that point means the session was
//! closed cleanly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::file::temp_version_of;
use crate::state::SessionState;

/// Data shared by every handle open on one session.
#[derive(Debug)]
pub struct SessionData {
    session_id: String,
    path: Mutex<Option<PathBuf>>,
    time_of_last_save: Mutex<SystemTime>,
    snapshot: Mutex<Option<Arc<SessionState>>>,
}

impl SessionData {
    fn new(session_id: &str, path: Option<PathBuf>) -> Self {
        Self {
            session_id: session_id.to_string(),
            path: Mutex::new(path),
            time_of_last_save: Mutex::new(SystemTime::now()),
            snapshot: Mutex::new(None),
        }
    }

    /// Returns the session id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns the session's file.
    pub fn path(&self) -> Option<PathBuf> {
        self.path.lock().clone()
    }

    pub(crate) fn set_path(&self, path: Option<PathBuf>) {
        *self.path.lock() = path;
    }

    /// Returns when the session was last written in full.
    pub fn time_of_last_save(&self) -> SystemTime {
        *self.time_of_last_save.lock()
    }

    /// Returns the state as of the last full save.
    pub fn snapshot(&self) -> Option<Arc<SessionState>> {
        self.snapshot.lock().clone()
    }

    pub(crate) fn record_save(&self, state: &SessionState) {
        *self.time_of_last_save.lock() = SystemTime::now();
        *self.snapshot.lock() = Some(Arc::new(state.clone()));
    }
}

impl Drop for SessionData {
    fn drop(&mut self) {
        let Some(path) = self.path.get_mut().as_deref().map(temp_version_of) else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed session temp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "could not remove temp file: {e}"),
        }
    }
}

/// Registry of [`SessionData`] keyed by session id.
///
/// Cloning the cache shares the same registry.
#[derive(Clone, Debug, Default)]
pub struct SessionCache {
    entries: Arc<Mutex<Vec<Arc<SessionData>>>>,
}

impl SessionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the data for `session_id`, creating it if needed.
    pub fn get(&self, session_id: &str, path: Option<&Path>) -> Arc<SessionData> {
        let mut entries = self.entries.lock();
        if let Some(data) = entries.iter().find(|d| d.session_id == session_id) {
            return Arc::clone(data);
        }
        let data = Arc::new(SessionData::new(session_id, path.map(Path::to_path_buf)));
        entries.push(Arc::clone(&data));
        data
    }

    /// Drops every entry only the cache still holds.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&self) -> usize {
        let removed: Vec<Arc<SessionData>> = {
            let mut entries = self.entries.lock();
            let (dead, live): (Vec<_>, Vec<_>) = std::mem::take(&mut *entries)
                .into_iter()
                .partition(|d| Arc::strong_count(d) == 1);
            *entries = live;
            dead
        };
        // Dropped outside the lock: each drop may touch the filesystem.
        let count = removed.len();
        drop(removed);
        count
    }

    /// Returns true if data for `session_id` is cached.
    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.lock().iter().any(|d| d.session_id == session_id)
    }

    /// Returns the number of cached sessions.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_id_shares_data() {
        let cache = SessionCache::new();
        let a = cache.get("s1", None);
        let b = cache.get("s1", None);
        let c = cache.get("s2", None);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cleanup_keeps_held_entries() {
        let cache = SessionCache::new();
        let held = cache.get("held", None);
        drop(cache.get("dropped", None));
        assert_eq!(cache.cleanup(), 1);
        assert!(cache.contains("held"));
        assert!(!cache.contains("dropped"));
        drop(held);
        assert_eq!(cache.cleanup(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_record_save_updates_snapshot() {
        let cache = SessionCache::new();
        let data = cache.get("s", None);
        let before = data.time_of_last_save();
        assert!(data.snapshot().is_none());
        data.record_save(&SessionState::new_session());
        assert!(data.time_of_last_save() >= before);
        assert!(data.snapshot().is_some_and(|s| s.is_session()));
    }

    #[test]
    fn test_collecting_entry_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("song.tdm");
        let temp = temp_version_of(&session);
        std::fs::write(&temp, b"autosave").unwrap();

        let cache = SessionCache::new();
        drop(cache.get("s", Some(&session)));
        assert!(temp.exists());
        cache.cleanup();
        assert!(!temp.exists());
    }
}
