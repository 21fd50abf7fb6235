//! Process bootstrap: wire the store, scheduler, reconciler and HTTP
//! surface, run the startup reconciliation pass, then serve until shutdown.

use std::sync::Arc;

use tracing::{info, warn};

use clawtalk_channels::slack::{ProxyState, SlackChannelsConfig, SlackIngress, SlackSenderImpl};
use clawtalk_core::reconcile::{reconcile_once, OpenClawConfig};
use clawtalk_core::scheduler::{
    EventDispatcher, JobExecutor, JobScheduler, SchedulerConfig, SlackSender, TalkLocks,
};
use clawtalk_core::{DedupTable, ShutdownController, ToolAffinityStore};

use super::config::ServerConfig;

pub async fn run() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(clawtalk_core::TalkStore::new(config.data_dir.join("talks")));
    store.init().await?;
    info!(talks = store.list().await.len(), "talk store loaded");

    ensure_openclaw_config_exists(&config.openclaw_config_path)?;
    let talks = store.list().await;
    match reconcile_once(&talks, &config.openclaw_config_path, &config.default_model).await {
        Ok(changed) => info!(changed, "startup routing reconciliation complete"),
        Err(e) => warn!(error = %e, "startup routing reconciliation failed, continuing with stale host config"),
    }

    let slack_config = load_slack_channels_config(&config);
    let http_client = reqwest::Client::new();
    let affinity = Arc::new(ToolAffinityStore::new(store.clone()));
    let slack_sender: Arc<dyn SlackSender> = Arc::new(SlackSenderImpl::new(slack_config.clone()));

    let scheduler_config = SchedulerConfig {
        tick_interval_secs: config.tick_interval_secs,
        base_timeout_ms: config.job_timeout_ms,
        min_timeout_ms: None,
        host_base_url: slack_config.host_webhook_url(None),
        event_job_debounce_ms: config.event_debounce_ms,
    };

    let executor = Arc::new(JobExecutor {
        store: store.clone(),
        affinity: affinity.clone(),
        http: http_client.clone(),
        config: scheduler_config.clone(),
        slack: Some(slack_sender.clone()),
        available_tools: default_available_tools(),
    });

    let talk_locks = Arc::new(TalkLocks::new());
    let scheduler = Arc::new(JobScheduler::new(
        store.clone(),
        executor.clone(),
        scheduler_config,
        talk_locks.clone(),
    ));

    let reply_slack_sender = slack_sender.clone();
    let reply_store = store.clone();
    let reply: clawtalk_core::scheduler::ReplyCallback = Arc::new(move |talk_id, output| {
        let slack_sender = reply_slack_sender.clone();
        let store = reply_store.clone();
        tokio::spawn(async move {
            let Some(talk) = store.get(&talk_id).await else { return };
            let Some(binding) = talk
                .platform_bindings
                .iter()
                .find(|b| b.platform == "slack" && b.permission.can_write())
            else {
                return;
            };
            let channel_id = clawtalk_core::talk::canonicalize_slack_scope(&binding.scope);
            if let Err(e) = slack_sender
                .send_message(binding.account_id.as_deref(), &channel_id, None, &output)
                .await
            {
                warn!(talk_id, error = %e, "failed to deliver event-triggered reply to slack");
            }
        });
    });

    let dispatcher = Arc::new(EventDispatcher::new(
        store.clone(),
        executor.clone(),
        talk_locks.clone(),
        config.event_debounce_ms,
        Some(reply),
    ));

    let dedup = Arc::new(DedupTable::new());
    let ingress = Arc::new(SlackIngress::new(store.clone(), dedup));

    let shutdown = ShutdownController::new();

    let scheduler_for_tick = scheduler.clone();
    let scheduler_cancel = shutdown.token();
    tokio::spawn(async move {
        scheduler_for_tick.run(scheduler_cancel).await;
    });

    let proxy_state = Arc::new(ProxyState {
        config: slack_config,
        http: http_client,
        ingress,
        dispatcher,
    });

    let app = axum::Router::new()
        .merge(crate::api::routes())
        .merge(clawtalk_channels::slack::routes(proxy_state));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    info!(port = config.http_port, "clawtalk listening");

    let shutdown_for_signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            clawtalk_core::shutdown_signal_with_controller(shutdown_for_signal).await;
        })
        .await?;

    Ok(())
}

fn load_slack_channels_config(config: &ServerConfig) -> SlackChannelsConfig {
    let mut slack_config = SlackChannelsConfig::from_env();
    slack_config.openclaw_http_port = Some(config.http_port);

    for (idx, token) in std::env::var("CLAWTALK_SLACK_BOT_TOKENS")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .enumerate()
    {
        slack_config.accounts.push(clawtalk_channels::slack::SlackAccount {
            id: format!("account-{idx}"),
            bot_token: token.to_string(),
            signing_secret: std::env::var(format!("CLAWTALK_SLACK_SIGNING_SECRET_ACCOUNT-{idx}")).ok(),
            webhook_path: None,
        });
    }

    slack_config
}

fn ensure_openclaw_config_exists(path: &std::path::Path) -> anyhow::Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let empty = OpenClawConfig::default();
    std::fs::write(path, serde_json::to_vec_pretty(&empty)?)?;
    info!(path = %path.display(), "created empty host config (no prior openclaw.json found)");
    Ok(())
}

fn default_available_tools() -> Vec<String> {
    vec![
        "search".to_string(),
        "browser".to_string(),
        "code".to_string(),
        "memory".to_string(),
    ]
}
