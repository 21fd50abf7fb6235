//! Writes a starter `.env` covering every variable the gateway reads. Not
//! interactive — values are placeholders the operator fills in by hand,
//! matching how the host itself expects secrets to be supplied.

use std::path::Path;

const TEMPLATE: &str = r#"# ClawTalk configuration
# Fill in the placeholders below, then run `clawtalk serve`.

# Where Talks and message logs are persisted.
CLAWTALK_DATA_DIR=.clawtalk

# Path to the host's own agent-routing config (read and reconciled at startup).
OPENCLAW_CONFIG_PATH=.clawtalk/openclaw.json

# Port this process listens on for the Slack event webhook.
CLAWTALK_HTTP_PORT=4455

# The host's own HTTP port, used when forwarding Slack events onward.
OPENCLAW_HTTP_PORT=3000

# Default model assigned to newly-provisioned managed agents.
CLAWTALK_DEFAULT_MODEL=default

# Comma-separated bot tokens (xoxb-...), one per configured Slack account.
CLAWTALK_SLACK_BOT_TOKENS=

# Slack request signing secret. Per-account overrides use
# CLAWTALK_SLACK_SIGNING_SECRET_ACCOUNT-<n>.
SLACK_SIGNING_SECRET=
"#;

pub async fn run() -> anyhow::Result<()> {
    if Path::new(super::ENV_FILE_PATH).exists() {
        println!("⚠️  .env already exists, not overwriting.");
        return Ok(());
    }

    std::fs::write(super::ENV_FILE_PATH, TEMPLATE)?;
    println!("✅ Wrote {} — fill in the placeholders, then run `clawtalk serve`.", super::ENV_FILE_PATH);
    Ok(())
}
