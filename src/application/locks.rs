use crate::domain::session::SessionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-session exclusive regions.
///
/// Each session gets its own `tokio::sync::Mutex`, held across
/// reserve-sequence, submit, record and update-totals. Distinct sessions
/// settle fully in parallel; only callers targeting the same session queue
/// behind each other.
#[derive(Default)]
pub struct SessionLocks {
    inner: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the exclusive region for `id`, creating it on first use.
    /// The registry lock is released before awaiting the session lock, so a
    /// long settlement on one session never blocks lock lookup for another.
    pub async fn acquire(&self, id: &SessionId) -> OwnedMutexGuard<()> {
        let session_lock = {
            let mut map = self.inner.lock().await;
            map.entry(id.clone()).or_default().clone()
        };
        session_lock.lock_owned().await
    }
}
