//! EventDispatcher (C6): bound to the host's `message_received` hook, fires
//! `type=event` jobs whose schedule scope matches the event.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::store::TalkStore;
use crate::talk::{JobType, Permission};

use super::due::parse_event_trigger;
use super::executor::JobExecutor;
use super::locks::TalkLocks;
use super::types::{RunSource, TriggerContext};

const DEBOUNCE_PRUNE_FACTOR: i64 = 10;

/// An inbound event from the host: `ctx.channelId` is a platform name
/// (e.g. `"slack"`), never a channel id (§4.6).
#[derive(Debug, Clone)]
pub struct HostEvent {
    pub platform: String,
    pub scope: String,
    pub from: Option<String>,
    pub content: Option<String>,
    pub can_reply: bool,
}

/// Invoked with `(talk_id, full_output)` when a job's owning binding is
/// write-permitted and the triggering event allows a reply.
pub type ReplyCallback = Arc<dyn Fn(String, String) + Send + Sync>;

pub struct EventDispatcher {
    store: Arc<TalkStore>,
    executor: Arc<JobExecutor>,
    talk_locks: Arc<TalkLocks>,
    debounce_ms: i64,
    last_fired: Mutex<HashMap<(String, String), i64>>,
    reply: Option<ReplyCallback>,
}

impl EventDispatcher {
    pub fn new(
        store: Arc<TalkStore>,
        executor: Arc<JobExecutor>,
        talk_locks: Arc<TalkLocks>,
        debounce_ms: i64,
        reply: Option<ReplyCallback>,
    ) -> Self {
        Self {
            store,
            executor,
            talk_locks,
            debounce_ms,
            last_fired: Mutex::new(HashMap::new()),
            reply,
        }
    }

    /// Handle one `message_received` callback from the host.
    pub async fn dispatch(&self, event: HostEvent) {
        let talks = self.store.list().await;

        for talk in talks {
            let has_matching_binding = talk.platform_bindings.iter().any(|b| {
                b.platform.eq_ignore_ascii_case(&event.platform)
                    && crate::talk::canonicalize_slack_scope(&b.scope)
                        == crate::talk::canonicalize_slack_scope(&event.scope)
            });
            if !has_matching_binding {
                continue;
            }

            for job in talk.jobs.iter().filter(|j| j.job_type == JobType::Event && j.active) {
                let Some(scope) = parse_event_trigger(&job.schedule) else {
                    continue;
                };
                if crate::talk::canonicalize_slack_scope(&scope)
                    != crate::talk::canonicalize_slack_scope(&event.scope)
                {
                    continue;
                }

                if !self.debounce_ok(&talk.id, &job.id).await {
                    continue;
                }

                let Some(_guard) = self.talk_locks.try_acquire(&talk.id).await else {
                    info!(talk_id = %talk.id, job_id = %job.id, "skipping event job: talk busy");
                    continue;
                };

                let can_reply = event.can_reply
                    && talk
                        .platform_bindings
                        .iter()
                        .any(|b| b.permission == Permission::Write || b.permission == Permission::ReadWrite);

                let trigger = TriggerContext {
                    platform: Some(event.platform.clone()),
                    source_scope: Some(event.scope.clone()),
                    from: event.from.clone(),
                    time: Some(Utc::now().to_rfc3339()),
                    content: event.content.clone(),
                };

                let executor = self.executor.clone();
                let talk_clone = talk.clone();
                let job_clone = job.clone();
                let reply = self.reply.clone();
                tokio::spawn(async move {
                    let _guard = _guard;
                    match executor
                        .run(&talk_clone, &job_clone, RunSource::Event, Some(trigger))
                        .await
                    {
                        Ok(report) if can_reply => {
                            if let Some(reply) = reply {
                                reply(talk_clone.id.clone(), report.full_output.clone());
                            }
                            info!(talk_id = %talk_clone.id, job_id = %job_clone.id, "event job delivered reply");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(talk_id = %talk_clone.id, job_id = %job_clone.id, error = %e, "event job run failed");
                        }
                    }
                });
            }
        }

        self.prune_debounce().await;
    }

    async fn debounce_ok(&self, talk_id: &str, job_id: &str) -> bool {
        let key = (talk_id.to_string(), job_id.to_string());
        let now = Utc::now().timestamp_millis();
        let mut last_fired = self.last_fired.lock().await;
        match last_fired.get(&key) {
            Some(&last) if now - last < self.debounce_ms => false,
            _ => {
                last_fired.insert(key, now);
                true
            }
        }
    }

    async fn prune_debounce(&self) {
        let now = Utc::now().timestamp_millis();
        let horizon = self.debounce_ms * DEBOUNCE_PRUNE_FACTOR;
        self.last_fired
            .lock()
            .await
            .retain(|_, last_fired_at| now - *last_fired_at < horizon);
    }
}
