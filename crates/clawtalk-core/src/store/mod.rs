//! TalkStore (C1): the durable, process-local, single-writer owner of every
//! Talk. All mutations — from Slack routing, the scheduler, or the bin
//! crate's HTTP surface — go through this module.

mod persistence;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::event_bus::EventBus;
use crate::talk::{
    AffinityObservation, Behavior, Binding, ChangeEvent, ChangeKind, Directive, ExecutionMode,
    FilesystemAccess, Job, JobReport, JobStatus, MessageRole, NetworkAccess, Talk, TalkAgent,
    TalkMessage, ToolMode,
};

const DEFAULT_CONTEXT_TTL: Duration = Duration::from_secs(30);

/// Failure modes surfaced by [`TalkStore`].
#[derive(Debug, Error)]
pub enum TalkStoreError {
    #[error("talk not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("validation error: {0}")]
    Validation(String),
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The whitelisted set of fields `update()` is allowed to change (§4.1).
/// Every field is optional; absent fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct TalkPatch {
    pub topic_title: Option<String>,
    pub objective: Option<String>,
    pub model: Option<String>,
    pub agents: Option<Vec<TalkAgent>>,
    pub directives: Option<Vec<Directive>>,
    pub platform_bindings: Option<Vec<Binding>>,
    pub platform_behaviors: Option<Vec<Behavior>>,
    pub tool_mode: Option<ToolMode>,
    pub execution_mode: Option<ExecutionMode>,
    pub filesystem_access: Option<FilesystemAccess>,
    pub network_access: Option<NetworkAccess>,
    pub tools_allow: Option<Vec<String>>,
    pub tools_deny: Option<Vec<String>>,
    pub google_auth_profile: Option<String>,
}

struct CachedContext {
    fetched_at: Instant,
    content: String,
}

/// Durable, process-local, single-writer Talk store.
///
/// Holds the authoritative in-memory map; every mutation is written through
/// to disk (temp-file-then-rename for `talk.json`, append-only for the
/// JSONL logs) before the in-memory state is considered committed.
pub struct TalkStore {
    root: PathBuf,
    talks: RwLock<HashMap<String, Talk>>,
    list_cache: RwLock<Option<Vec<Talk>>>,
    context_cache: Mutex<HashMap<String, CachedContext>>,
    context_ttl: Duration,
    events: EventBus,
}

impl TalkStore {
    /// Construct a store rooted at `root` (one subdirectory per Talk). Does
    /// no I/O; call [`TalkStore::init`] to load existing Talks.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            talks: RwLock::new(HashMap::new()),
            list_cache: RwLock::new(None),
            context_cache: Mutex::new(HashMap::new()),
            context_ttl: DEFAULT_CONTEXT_TTL,
            events: EventBus::default(),
        }
    }

    /// Subscribe to `ChangeEvent`s published by this store.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn talk_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
    fn talk_json_path(&self, id: &str) -> PathBuf {
        self.talk_dir(id).join("talk.json")
    }
    fn history_path(&self, id: &str) -> PathBuf {
        self.talk_dir(id).join("history.jsonl")
    }
    fn reports_path(&self, id: &str) -> PathBuf {
        self.talk_dir(id).join("reports.jsonl")
    }
    fn context_path(&self, id: &str) -> PathBuf {
        self.talk_dir(id).join("context.md")
    }
    fn observations_path(&self, id: &str) -> PathBuf {
        self.talk_dir(id).join("affinity").join("observations.jsonl")
    }
    fn snapshot_path(&self, id: &str) -> PathBuf {
        self.talk_dir(id).join("affinity").join("snapshot.json")
    }

    /// Rewrite a Talk's `affinity/snapshot.json` for debuggability. Best
    /// effort: the learner caches the snapshot in memory regardless.
    pub async fn write_affinity_snapshot(
        &self,
        id: &str,
        bytes: &[u8],
    ) -> Result<(), TalkStoreError> {
        persistence::atomic_write(&self.snapshot_path(id), bytes).await
    }

    /// Startup recovery (§4.1): load every Talk directory under `root`,
    /// normalize it, clear any stale `processing = true`, and log a warning
    /// naming how many were cleared.
    pub async fn init(&self) -> Result<(), TalkStoreError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut loaded = HashMap::new();
        let mut stale_processing = 0usize;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            let talk_json = self.talk_json_path(&id);
            let bytes = match tokio::fs::read(&talk_json).await {
                Ok(b) => b,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let mut talk: Talk = match serde_json::from_slice(&bytes) {
                Ok(t) => t,
                Err(e) => {
                    warn!(talk_id = %id, error = %e, "skipping corrupt talk.json");
                    continue;
                }
            };
            talk.normalize_in_place();
            if talk.processing {
                talk.processing = false;
                stale_processing += 1;
                if let Err(e) = self.write_talk_json(&talk).await {
                    warn!(talk_id = %id, error = %e, "failed to persist cleared processing flag");
                }
            }
            loaded.insert(id, talk);
        }

        if stale_processing > 0 {
            warn!(
                count = stale_processing,
                "cleared stale processing flags on startup"
            );
        }

        *self.talks.write().await = loaded;
        self.invalidate_list_cache().await;
        Ok(())
    }

    async fn invalidate_list_cache(&self) {
        *self.list_cache.write().await = None;
    }

    async fn write_talk_json(&self, talk: &Talk) -> Result<(), TalkStoreError> {
        let bytes = serde_json::to_vec_pretty(talk)?;
        persistence::atomic_write(&self.talk_json_path(&talk.id), &bytes).await
    }

    fn publish(&self, kind: ChangeKind, talk: &Talk) {
        self.events.publish(ChangeEvent {
            kind,
            talk_id: talk.id.clone(),
            talk_version: talk.talk_version,
            change_id: talk.change_id.clone(),
            timestamp: talk.last_modified_at,
            last_modified_by: talk.last_modified_by.clone(),
        });
    }

    /// Bump `talk_version`/`change_id`/`last_modified_at` (I3) and persist.
    async fn commit(
        &self,
        talk: &mut Talk,
        kind: ChangeKind,
        modified_by: Option<String>,
    ) -> Result<(), TalkStoreError> {
        talk.talk_version += 1;
        talk.change_id = Uuid::new_v4().to_string();
        talk.last_modified_at = now_ms();
        talk.last_modified_by = modified_by;
        talk.updated_at = talk.last_modified_at;
        self.write_talk_json(talk).await?;
        self.publish(kind, talk);
        Ok(())
    }

    /// Create a new Talk with an optional model override.
    pub async fn create(&self, model: Option<String>) -> Result<Talk, TalkStoreError> {
        let id = Uuid::new_v4().to_string();
        let talk = Talk::new(id.clone(), model.unwrap_or_else(|| "default".into()), now_ms(), Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(self.talk_dir(&id)).await?;
        self.write_talk_json(&talk).await?;
        {
            let mut talks = self.talks.write().await;
            talks.insert(id.clone(), talk.clone());
        }
        self.invalidate_list_cache().await;
        self.publish(ChangeKind::Created, &talk);
        Ok(talk)
    }

    /// Fetch a Talk by id.
    pub async fn get(&self, id: &str) -> Option<Talk> {
        self.talks.read().await.get(id).cloned()
    }

    fn not_found(id: &str) -> TalkStoreError {
        TalkStoreError::NotFound(id.to_string())
    }

    /// List every Talk sorted by `updatedAt` descending. The result is
    /// memoized and invalidated on any mutation.
    pub async fn list(&self) -> Vec<Talk> {
        if let Some(cached) = self.list_cache.read().await.as_ref() {
            return cached.clone();
        }
        let mut all: Vec<Talk> = self.talks.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        *self.list_cache.write().await = Some(all.clone());
        all
    }

    /// Apply a whitelisted patch to a Talk (§4.1 mutable-fields list).
    pub async fn update(
        &self,
        id: &str,
        patch: TalkPatch,
        modified_by: Option<String>,
    ) -> Result<Talk, TalkStoreError> {
        let mut talks = self.talks.write().await;
        let talk = talks.get_mut(id).ok_or_else(|| Self::not_found(id))?;

        if let Some(v) = patch.topic_title {
            talk.topic_title = v;
        }
        if let Some(v) = patch.objective {
            talk.objective = v;
        }
        if let Some(v) = patch.model {
            talk.model = v;
        }
        if let Some(v) = patch.agents {
            talk.agents = v;
        }
        if let Some(v) = patch.directives {
            talk.directives = v;
        }
        if let Some(v) = patch.platform_bindings {
            talk.platform_bindings = v;
        }
        if let Some(v) = patch.platform_behaviors {
            talk.platform_behaviors = v;
        }
        if let Some(v) = patch.tool_mode {
            talk.tool_mode = v;
        }
        if let Some(v) = patch.execution_mode {
            talk.execution_mode = v;
        }
        if let Some(v) = patch.filesystem_access {
            talk.filesystem_access = v;
        }
        if let Some(v) = patch.network_access {
            talk.network_access = v;
        }
        if let Some(v) = patch.tools_allow {
            talk.tools_allow = v;
        }
        if let Some(v) = patch.tools_deny {
            talk.tools_deny = v;
        }
        if let Some(v) = patch.google_auth_profile {
            talk.google_auth_profile = Some(v);
        }
        talk.normalize_in_place();

        self.commit(talk, ChangeKind::Updated, modified_by).await?;
        let result = talk.clone();
        drop(talks);
        self.invalidate_list_cache().await;
        Ok(result)
    }

    /// Delete a Talk and every file under its directory. Never re-emerges
    /// after restart (I4) since the directory is gone from disk.
    pub async fn delete(&self, id: &str) -> Result<(), TalkStoreError> {
        let removed = { self.talks.write().await.remove(id) };
        let Some(talk) = removed else {
            return Err(Self::not_found(id));
        };
        match tokio::fs::remove_dir_all(self.talk_dir(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.context_cache.lock().await.remove(id);
        self.invalidate_list_cache().await;
        self.events.publish(ChangeEvent {
            kind: ChangeKind::Deleted,
            talk_id: talk.id,
            talk_version: talk.talk_version + 1,
            change_id: Uuid::new_v4().to_string(),
            timestamp: now_ms(),
            last_modified_by: None,
        });
        Ok(())
    }

    /// Set the `processing` flag without bumping `talkVersion`.
    pub async fn set_processing(&self, id: &str, processing: bool) -> Result<(), TalkStoreError> {
        let mut talks = self.talks.write().await;
        let talk = talks.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        talk.processing = processing;
        self.write_talk_json(talk).await
    }

    /// Append a message to the Talk's history log.
    pub async fn append_message(
        &self,
        id: &str,
        role: MessageRole,
        content: String,
    ) -> Result<TalkMessage, TalkStoreError> {
        if self.get(id).await.is_none() {
            return Err(Self::not_found(id));
        }
        let msg = TalkMessage {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: now_ms(),
        };
        let line = serde_json::to_string(&msg)?;
        persistence::append_line(&self.history_path(id), &line).await?;

        let mut talks = self.talks.write().await;
        let talk = talks.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        self.commit(talk, ChangeKind::MessageAppended, None).await?;
        Ok(msg)
    }

    /// Read the full message log.
    pub async fn get_messages(&self, id: &str) -> Result<Vec<TalkMessage>, TalkStoreError> {
        persistence::read_jsonl_all(&self.history_path(id)).await
    }

    /// Read the most recent `n` messages using the tail-read discipline.
    pub async fn get_recent_messages(
        &self,
        id: &str,
        n: usize,
    ) -> Result<Vec<TalkMessage>, TalkStoreError> {
        persistence::read_jsonl_tail(&self.history_path(id), n).await
    }

    /// Find a single message by id.
    pub async fn get_message(
        &self,
        id: &str,
        msg_id: &str,
    ) -> Result<Option<TalkMessage>, TalkStoreError> {
        let all = self.get_messages(id).await?;
        Ok(all.into_iter().find(|m| m.id == msg_id))
    }

    /// Delete messages by id, rewriting the log and dropping any pin that
    /// now dangles, atomically with the rewrite (I2).
    pub async fn delete_messages(
        &self,
        id: &str,
        ids: &[String],
    ) -> Result<(), TalkStoreError> {
        let all = self.get_messages(id).await?;
        let remaining: Vec<TalkMessage> = all.into_iter().filter(|m| !ids.contains(&m.id)).collect();
        persistence::rewrite_jsonl(&self.history_path(id), &remaining).await?;

        let remaining_ids: std::collections::HashSet<&str> =
            remaining.iter().map(|m| m.id.as_str()).collect();

        let mut talks = self.talks.write().await;
        let talk = talks.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        talk.pinned_message_ids
            .retain(|pin| remaining_ids.contains(pin.as_str()));
        self.commit(talk, ChangeKind::MessagesDeleted, None).await?;
        Ok(())
    }

    /// Pin a message id, deduplicating.
    pub async fn pin_message(&self, id: &str, msg_id: String) -> Result<(), TalkStoreError> {
        let mut talks = self.talks.write().await;
        let talk = talks.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        if !talk.pinned_message_ids.contains(&msg_id) {
            talk.pinned_message_ids.push(msg_id);
        }
        self.commit(talk, ChangeKind::Updated, None).await
    }

    /// Unpin a message id.
    pub async fn unpin_message(&self, id: &str, msg_id: &str) -> Result<(), TalkStoreError> {
        let mut talks = self.talks.write().await;
        let talk = talks.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        talk.pinned_message_ids.retain(|m| m != msg_id);
        self.commit(talk, ChangeKind::Updated, None).await
    }

    /// Add a job to a Talk.
    pub async fn add_job(&self, id: &str, job: Job) -> Result<(), TalkStoreError> {
        let mut talks = self.talks.write().await;
        let talk = talks.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        talk.jobs.push(job);
        self.commit(talk, ChangeKind::Updated, None).await
    }

    /// Replace a job in place by id.
    pub async fn update_job(&self, id: &str, job: Job) -> Result<(), TalkStoreError> {
        let mut talks = self.talks.write().await;
        let talk = talks.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        let Some(slot) = talk.jobs.iter_mut().find(|j| j.id == job.id) else {
            return Err(TalkStoreError::NotFound(job.id));
        };
        *slot = job;
        self.commit(talk, ChangeKind::Updated, None).await
    }

    /// Remove a job by id.
    pub async fn delete_job(&self, id: &str, job_id: &str) -> Result<(), TalkStoreError> {
        let mut talks = self.talks.write().await;
        let talk = talks.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        talk.jobs.retain(|j| j.id != job_id);
        self.commit(talk, ChangeKind::Updated, None).await
    }

    /// List a Talk's jobs.
    pub async fn list_jobs(&self, id: &str) -> Result<Vec<Job>, TalkStoreError> {
        self.get(id)
            .await
            .map(|t| t.jobs)
            .ok_or_else(|| Self::not_found(id))
    }

    /// Every `(talk_id, job)` pair across all Talks where the job is active.
    pub async fn get_all_active_jobs(&self) -> Vec<(String, Job)> {
        self.talks
            .read()
            .await
            .values()
            .flat_map(|t| {
                t.jobs
                    .iter()
                    .filter(|j| j.active)
                    .map(|j| (t.id.clone(), j.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Read a Talk's `context.md`, TTL-cached (default 30 s).
    pub async fn get_context(&self, id: &str) -> Result<String, TalkStoreError> {
        {
            let cache = self.context_cache.lock().await;
            if let Some(entry) = cache.get(id) {
                if entry.fetched_at.elapsed() <= self.context_ttl {
                    return Ok(entry.content.clone());
                }
            }
        }
        let content = match tokio::fs::read_to_string(self.context_path(id)).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        self.context_cache.lock().await.insert(
            id.to_string(),
            CachedContext {
                fetched_at: Instant::now(),
                content: content.clone(),
            },
        );
        Ok(content)
    }

    /// Rewrite a Talk's `context.md` whole and refresh the TTL cache.
    pub async fn set_context(&self, id: &str, content: String) -> Result<(), TalkStoreError> {
        persistence::atomic_write(&self.context_path(id), content.as_bytes()).await?;
        self.context_cache.lock().await.insert(
            id.to_string(),
            CachedContext {
                fetched_at: Instant::now(),
                content,
            },
        );
        Ok(())
    }

    /// Append a job run report.
    pub async fn append_report(&self, id: &str, report: JobReport) -> Result<(), TalkStoreError> {
        let line = serde_json::to_string(&report)?;
        persistence::append_line(&self.reports_path(id), &line).await
    }

    /// Read every report for a Talk.
    pub async fn get_reports(&self, id: &str) -> Result<Vec<JobReport>, TalkStoreError> {
        persistence::read_jsonl_all(&self.reports_path(id)).await
    }

    /// Read reports optionally filtered by `since` (epoch ms) and/or `job_id`.
    pub async fn get_recent_reports(
        &self,
        id: &str,
        since: Option<i64>,
        job_id: Option<&str>,
    ) -> Result<Vec<JobReport>, TalkStoreError> {
        let all = self.get_reports(id).await?;
        Ok(all
            .into_iter()
            .filter(|r| since.map(|s| r.run_at >= s).unwrap_or(true))
            .filter(|r| job_id.map(|j| r.job_id == j).unwrap_or(true))
            .collect())
    }

    /// Append an affinity observation (consumed by the tool-affinity learner).
    pub async fn append_observation(
        &self,
        id: &str,
        observation: AffinityObservation,
    ) -> Result<(), TalkStoreError> {
        let line = serde_json::to_string(&observation)?;
        persistence::append_line(&self.observations_path(id), &line).await
    }

    /// Read every affinity observation for a Talk.
    pub async fn get_observations(
        &self,
        id: &str,
    ) -> Result<Vec<AffinityObservation>, TalkStoreError> {
        persistence::read_jsonl_all(&self.observations_path(id)).await
    }

    /// Mark every run's final status for bookkeeping (used by the scheduler
    /// after a job finishes, outside the whitelisted `update()` path).
    pub async fn record_job_run(
        &self,
        id: &str,
        job_id: &str,
        status: JobStatus,
        run_at: i64,
    ) -> Result<(), TalkStoreError> {
        let mut talks = self.talks.write().await;
        let talk = talks.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        if let Some(job) = talk.jobs.iter_mut().find(|j| j.id == job_id) {
            job.last_run_at = Some(run_at);
            job.last_status = Some(status);
        }
        self.commit(talk, ChangeKind::Updated, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, TalkStore) {
        let dir = TempDir::new().unwrap();
        let store = TalkStore::new(dir.path().to_path_buf());
        store.init().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn p1_talk_version_strictly_increases() {
        let (_dir, store) = store().await;
        let talk = store.create(None).await.unwrap();
        let v0 = talk.talk_version;

        store
            .append_message(&talk.id, MessageRole::User, "hi".into())
            .await
            .unwrap();
        let after = store.get(&talk.id).await.unwrap();
        assert!(after.talk_version > v0);

        store
            .update(&talk.id, TalkPatch::default(), None)
            .await
            .unwrap();
        let after2 = store.get(&talk.id).await.unwrap();
        assert!(after2.talk_version > after.talk_version);
    }

    #[tokio::test]
    async fn p2_delete_messages_leaves_no_dangling_pins() {
        let (_dir, store) = store().await;
        let talk = store.create(None).await.unwrap();
        let m1 = store
            .append_message(&talk.id, MessageRole::User, "one".into())
            .await
            .unwrap();
        store.pin_message(&talk.id, m1.id.clone()).await.unwrap();

        store
            .delete_messages(&talk.id, &[m1.id.clone()])
            .await
            .unwrap();

        let after = store.get(&talk.id).await.unwrap();
        assert!(!after.pinned_message_ids.contains(&m1.id));
    }

    #[tokio::test]
    async fn i4_deleted_talk_never_reemerges_after_restart() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();

        let store = TalkStore::new(root.clone());
        store.init().await.unwrap();
        let talk = store.create(None).await.unwrap();
        store.delete(&talk.id).await.unwrap();

        let store2 = TalkStore::new(root);
        store2.init().await.unwrap();
        assert!(store2.get(&talk.id).await.is_none());
    }

    #[tokio::test]
    async fn startup_recovery_clears_stale_processing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();

        let store = TalkStore::new(root.clone());
        store.init().await.unwrap();
        let talk = store.create(None).await.unwrap();
        store.set_processing(&talk.id, true).await.unwrap();

        let store2 = TalkStore::new(root);
        store2.init().await.unwrap();
        let recovered = store2.get(&talk.id).await.unwrap();
        assert!(!recovered.processing);
    }

    #[tokio::test]
    async fn list_is_sorted_by_updated_at_desc() {
        let (_dir, store) = store().await;
        let t1 = store.create(None).await.unwrap();
        store
            .append_message(&t1.id, MessageRole::User, "bump".into())
            .await
            .unwrap();
        let t2 = store.create(None).await.unwrap();

        let listed = store.list().await;
        assert_eq!(listed[0].id, t2.id);
        assert_eq!(listed[1].id, t1.id);
    }

    #[tokio::test]
    async fn recent_messages_returns_last_n() {
        let (_dir, store) = store().await;
        let talk = store.create(None).await.unwrap();
        for i in 0..5 {
            store
                .append_message(&talk.id, MessageRole::User, format!("m{i}"))
                .await
                .unwrap();
        }
        let recent = store.get_recent_messages(&talk.id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].content, "m4");
    }
}
