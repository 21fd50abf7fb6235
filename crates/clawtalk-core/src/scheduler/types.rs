//! Shared scheduler types: configuration, errors, and the request/response
//! shapes passed to the host LLM.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

/// Failure modes surfaced by the scheduler and event dispatcher.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("talk store error: {0}")]
    Store(#[from] crate::store::TalkStoreError),

    #[error(transparent)]
    RoutingGuard(#[from] crate::routing::RoutingGuardError),

    #[error("invalid job schedule expression: {0}")]
    InvalidSchedule(String),

    #[error("host request failed: {0}")]
    HostRequest(#[from] reqwest::Error),

    #[error("host returned {status}: {body}")]
    HostStatus { status: u16, body: String },

    #[error("job run timed out after {0}ms")]
    Timeout(u64),

    #[error("slack delivery failed: {0}")]
    Delivery(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Tunables for the tick loop and per-job execution.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval_secs: u64,
    pub base_timeout_ms: u64,
    pub min_timeout_ms: Option<u64>,
    pub host_base_url: String,
    pub event_job_debounce_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            base_timeout_ms: 300_000,
            min_timeout_ms: None,
            host_base_url: "http://127.0.0.1:3000".to_string(),
            event_job_debounce_ms: 30_000,
        }
    }
}

/// Why a particular run was triggered; carried through to the `source`
/// field of the resulting [`crate::talk::AffinityObservation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSource {
    Schedule,
    Event,
}

impl RunSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Event => "event",
        }
    }
}

/// Context describing an event-triggered run (§4.6 `triggerContext`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TriggerContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The body posted to the host's LLM endpoint for a single job run.
#[derive(Debug, Clone, Serialize)]
pub struct HostRunRequest {
    pub talk_id: String,
    pub job_id: String,
    pub prompt: String,
    pub tools: Vec<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerContext>,
}

/// Job runs always use the `job:` session-key prefix, regardless of the
/// owning Talk's execution mode (§4.7 step 6).
pub fn session_key(talk_id: &str, job_id: &str) -> String {
    format!("job:{talk_id}:{job_id}")
}

pub fn build_headers(session_key: String) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("x-openclaw-session-key".to_string(), session_key);
    headers
}
