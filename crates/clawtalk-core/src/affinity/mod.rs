//! ToolAffinityStore (C8): per-Talk, per-intent tool-affinity learner.
//!
//! Observations accumulate in `affinity/observations.jsonl`; a cached
//! snapshot and a small phase machine (warmup / exploration / learned)
//! decide, for a given intent, which policy-allowed tools actually get
//! offered to the model.

mod phase;
mod snapshot;

pub use phase::{compute_affinity_timeout, compute_cold_start_baseline, Phase, StateBackend};
pub use snapshot::{AffinitySnapshot, IntentStats};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::store::{TalkStore, TalkStoreError};
use crate::talk::AffinityObservation;

const SLIDING_WINDOW_SIZE: usize = 50;
const SNAPSHOT_TTL: Duration = Duration::from_secs(60);
pub const WARMUP_THRESHOLD: u32 = 3;
pub const EXPLORATION_RATE: u32 = 20;
pub const MIN_AFFINITY_THRESHOLD: f64 = 0.1;

/// Intents exempt from the normal warmup gate (§4.8 `COLD`).
pub fn is_cold_intent(intent: &str) -> bool {
    matches!(intent, "study" | "state_tracking" | "conversation" | "model_meta")
}

struct CachedSnapshot {
    fetched_at: Instant,
    snapshot: AffinitySnapshot,
}

/// Learns, per (Talk, intent), which tools are worth offering.
pub struct ToolAffinityStore {
    store: Arc<TalkStore>,
    cache: Mutex<HashMap<String, CachedSnapshot>>,
}

impl ToolAffinityStore {
    pub fn new(store: Arc<TalkStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Record one observation and invalidate the cached snapshot for this Talk.
    pub async fn observe(
        &self,
        talk_id: &str,
        observation: AffinityObservation,
    ) -> Result<(), TalkStoreError> {
        self.store.append_observation(talk_id, observation).await?;
        self.cache.lock().await.remove(talk_id);
        Ok(())
    }

    /// Build (or return the cached) per-intent snapshot for a Talk.
    pub async fn snapshot(&self, talk_id: &str) -> Result<AffinitySnapshot, TalkStoreError> {
        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(talk_id) {
                if entry.fetched_at.elapsed() <= SNAPSHOT_TTL {
                    return Ok(entry.snapshot.clone());
                }
            }
        }

        let observations = self.store.get_observations(talk_id).await?;
        let snapshot = snapshot::build(&observations, SLIDING_WINDOW_SIZE);

        self.cache.lock().await.insert(
            talk_id.to_string(),
            CachedSnapshot {
                fetched_at: Instant::now(),
                snapshot: snapshot.clone(),
            },
        );

        // Persisted for debuggability; failure never blocks the caller.
        if let Ok(json) = serde_json::to_vec_pretty(&snapshot) {
            if let Err(e) = self.store.write_affinity_snapshot(talk_id, &json).await {
                tracing::warn!(talk_id, error = %e, "failed to persist affinity snapshot");
            }
        }

        Ok(snapshot)
    }

    /// Select the tool subset to offer for `intent`, given the full
    /// policy-allowed set and an optional cold-start baseline.
    pub async fn select_tools(
        &self,
        talk_id: &str,
        intent: &str,
        policy_allowed: &[String],
        cold_start_baseline: Option<&[String]>,
    ) -> Result<(Phase, Vec<String>), TalkStoreError> {
        let snapshot = self.snapshot(talk_id).await?;
        let stats = snapshot.intents.get(intent);

        let total = stats.map(|s| s.total_observations).unwrap_or(0);
        let phase = phase::classify_phase(total, intent, cold_start_baseline.is_some());

        let selected = match phase {
            Phase::Warmup | Phase::Exploration => policy_allowed.to_vec(),
            Phase::Learned => phase::select_learned(
                stats,
                policy_allowed,
                cold_start_baseline,
                is_cold_intent(intent),
            ),
        };

        Ok((phase, selected))
    }
}
