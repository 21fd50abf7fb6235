//! Per-Talk execution locks shared by the job scheduler and event
//! dispatcher: due jobs run concurrently across Talks but serially within
//! one Talk (§4.7 "Ordering"), and the dispatcher skips firing an event job
//! into a Talk that is already running one (§4.6 "Per-Talk concurrency").

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct TalkLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TalkLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, talk_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(talk_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Block until the per-Talk lock is free, then hold it.
    pub async fn acquire(&self, talk_id: &str) -> OwnedMutexGuard<()> {
        let lock = self.lock_for(talk_id).await;
        lock.lock_owned().await
    }

    /// Take the per-Talk lock only if it is immediately free.
    pub async fn try_acquire(&self, talk_id: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = self.lock_for(talk_id).await;
        lock.try_lock_owned().ok()
    }
}
