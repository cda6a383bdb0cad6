//! In-process registry of chunked upload sessions.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;

use simplehost_core::types::UploadId;
use simplehost_entity::file::UploadSession;

/// Shared handle to one session. The mutex serializes staging and the
/// transition out of `Collecting`; it is not held while assembling.
pub type SessionHandle = Arc<Mutex<UploadSession>>;

/// Upload sessions keyed by upload id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<UploadId, SessionHandle>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `upload_id`, opening it with `open` if absent.
    ///
    /// The flag is `true` when this call created the session.
    pub fn get_or_open(
        &self,
        upload_id: &UploadId,
        open: impl FnOnce() -> UploadSession,
    ) -> (SessionHandle, bool) {
        match self.sessions.entry(upload_id.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let handle = Arc::new(Mutex::new(open()));
                entry.insert(Arc::clone(&handle));
                (handle, true)
            }
        }
    }

    /// Look up a session.
    pub fn get(&self, upload_id: &UploadId) -> Option<SessionHandle> {
        self.sessions.get(upload_id).map(|h| Arc::clone(h.value()))
    }

    /// Drop a session from the registry.
    pub fn remove(&self, upload_id: &UploadId) -> Option<SessionHandle> {
        self.sessions.remove(upload_id).map(|(_, handle)| handle)
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are tracked.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of every tracked session.
    pub fn ids(&self) -> HashSet<UploadId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Sessions idle for longer than `ttl` as of `now`.
    ///
    /// Sessions that are currently locked are never reported. A session
    /// stuck in `Assembling` is reported like any other once it goes idle.
    pub fn stale(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<UploadId> {
        let handles: Vec<(UploadId, SessionHandle)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        handles
            .into_iter()
            .filter(|(_, handle)| match handle.try_lock() {
                Ok(session) => session.is_stale(now, ttl),
                Err(_) => false,
            })
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use simplehost_core::types::{FolderId, UserId};

    use super::*;

    fn open(id: &str) -> UploadSession {
        UploadSession::new(
            UploadId::from(id),
            UserId::from("u1"),
            FolderId::root(),
            "f",
            2,
            false,
        )
    }

    #[tokio::test]
    async fn test_get_or_open_reuses_session() {
        let registry = SessionRegistry::new();
        let id = UploadId::from("a");
        let (first, created) = registry.get_or_open(&id, || open("a"));
        assert!(created);
        first.lock().await.record_chunk(0).unwrap();

        let (second, created) = registry.get_or_open(&id, || open("a"));
        assert!(!created);
        assert_eq!(second.lock().await.received_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_includes_idle_assembly_but_not_locked() {
        let registry = SessionRegistry::new();
        for id in ["idle", "busy", "locked"] {
            registry.get_or_open(&UploadId::from(id), || open(id));
        }
        registry
            .get(&UploadId::from("busy"))
            .unwrap()
            .lock()
            .await
            .begin_assembly()
            .unwrap();

        let locked = registry.get(&UploadId::from("locked")).unwrap();
        let _guard = locked.lock().await;

        let later = Utc::now() + Duration::hours(2);
        let mut stale = registry.stale(later, Duration::hours(1));
        stale.sort();
        assert_eq!(stale, vec![UploadId::from("busy"), UploadId::from("idle")]);

        assert!(registry.stale(Utc::now(), Duration::hours(1)).is_empty());
        assert!(registry.remove(&UploadId::from("idle")).is_some());
        assert_eq!(registry.ids().len(), 2);
    }
}
