//! Server-wide configuration, loaded from the environment.

use std::path::PathBuf;

/// Runtime configuration for the gateway process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory the TalkStore persists Talks and message logs under.
    pub data_dir: PathBuf,
    /// Path to the host's own agent-routing config file, reconciled at
    /// startup (§4.10).
    pub openclaw_config_path: PathBuf,
    /// Port this process listens on for the Slack webhook.
    pub http_port: u16,
    /// Default model assigned to newly-provisioned managed agents.
    pub default_model: String,
    /// Scheduler tick interval, in seconds.
    pub tick_interval_secs: u64,
    /// Per-(talk, job) debounce window for event-triggered jobs, in ms.
    pub event_debounce_ms: i64,
    /// Base timeout for a single job run against the host, in ms.
    pub job_timeout_ms: u64,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = std::env::var("CLAWTALK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .or_else(dirs::home_dir)
                    .map(|p| p.join(".clawtalk"))
                    .unwrap_or_else(|| PathBuf::from(".clawtalk"))
            });

        let openclaw_config_path = std::env::var("OPENCLAW_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("openclaw.json"));

        let http_port = std::env::var("CLAWTALK_HTTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4455);

        let default_model =
            std::env::var("CLAWTALK_DEFAULT_MODEL").unwrap_or_else(|_| "default".to_string());

        let tick_interval_secs = std::env::var("CLAWTALK_TICK_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let event_debounce_ms = std::env::var("CLAWTALK_EVENT_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2_000);

        let job_timeout_ms = std::env::var("CLAWTALK_JOB_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60_000);

        Ok(Self {
            data_dir,
            openclaw_config_path,
            http_port,
            default_model,
            tick_interval_secs,
            event_debounce_ms,
            job_timeout_ms,
        })
    }
}
