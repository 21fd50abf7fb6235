//! JobScheduler (C7): ticks every `tick_interval_secs`, computes the due
//! set across every Talk's active jobs, and runs each through the shared
//! executor. Cooperative: always selects against the shutdown signal so it
//! never blocks process exit.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::store::TalkStore;
use crate::talk::JobType;

use super::due::is_due;
use super::executor::JobExecutor;
use super::locks::TalkLocks;
use super::types::{RunSource, SchedulerConfig};

pub struct JobScheduler {
    store: Arc<TalkStore>,
    executor: Arc<JobExecutor>,
    config: SchedulerConfig,
    last_tick: Mutex<chrono::DateTime<Utc>>,
    talk_locks: Arc<TalkLocks>,
}

impl JobScheduler {
    pub fn new(
        store: Arc<TalkStore>,
        executor: Arc<JobExecutor>,
        config: SchedulerConfig,
        talk_locks: Arc<TalkLocks>,
    ) -> Self {
        Self {
            store,
            executor,
            config,
            last_tick: Mutex::new(Utc::now()),
            talk_locks,
        }
    }

    /// Run the tick loop until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("job scheduler starting");
        let interval = tokio::time::Duration::from_secs(self.config.tick_interval_secs);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.tick().await;
                }
                _ = shutdown.cancelled() => {
                    info!("job scheduler shutting down");
                    break;
                }
            }
        }
    }

    async fn tick(&self) {
        let now = Utc::now();
        let last_tick = {
            let mut guard = self.last_tick.lock().await;
            let previous = *guard;
            *guard = now;
            previous
        };

        let active = self.store.get_all_active_jobs().await;

        for (talk_id, job) in active {
            if job.job_type == JobType::Event {
                continue;
            }
            if !is_due(&job, last_tick, now) {
                continue;
            }

            let store = self.store.clone();
            let executor = self.executor.clone();
            let talk_locks = self.talk_locks.clone();

            // Detached: a slow run must never delay the next tick. The
            // per-Talk lock serializes a Talk's own jobs against each other
            // while different Talks still run concurrently.
            tokio::spawn(async move {
                let _guard = talk_locks.acquire(&talk_id).await;
                let Some(talk) = store.get(&talk_id).await else {
                    return;
                };
                if let Err(e) = executor.run(&talk, &job, RunSource::Schedule, None).await {
                    error!(talk_id = %talk_id, job_id = %job.id, error = %e, "scheduled job run failed");
                }
            });
        }
    }
}
