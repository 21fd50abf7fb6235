//! Diagnostics: loads the current Talks and host config and reports any
//! Slack channel a non-clawtalk agent and a Talk both claim to own (S5).
//! Read-only — never mutates either side.

use clawtalk_core::reconcile::{check_ownership, managed_agent_id, OpenClawConfig};

use crate::server::ServerConfig;

pub async fn run() -> anyhow::Result<()> {
    println!("🩺 ClawTalk Doctor\n");

    let config = ServerConfig::from_env()?;
    let store = clawtalk_core::TalkStore::new(config.data_dir.join("talks"));
    store.init().await?;
    let talks = store.list().await;
    println!("Loaded {} talk(s) from {}", talks.len(), config.data_dir.display());

    let raw = match std::fs::read_to_string(&config.openclaw_config_path) {
        Ok(raw) => raw,
        Err(e) => {
            println!("⚠️  could not read {}: {e}", config.openclaw_config_path.display());
            return Ok(());
        }
    };
    let host_config: OpenClawConfig = serde_json::from_str(&raw)?;

    let managed_ids: Vec<String> = talks.iter().map(|t| managed_agent_id(&t.id)).collect();
    let conflicts = check_ownership(&talks, &host_config, &managed_ids);

    if conflicts.is_empty() {
        println!("✅ No ownership conflicts found.");
        return Ok(());
    }

    println!("⚠️  {} ownership conflict(s) found:\n", conflicts.len());
    for conflict in &conflicts {
        println!(
            "  talk {} ({}) and host agent {} both claim {} on account {}",
            conflict.talk_id,
            conflict.talk_scope,
            conflict.open_claw_agent_id,
            conflict.open_claw_scope,
            conflict.open_claw_account_id.as_deref().unwrap_or("default"),
        );
    }

    Ok(())
}
