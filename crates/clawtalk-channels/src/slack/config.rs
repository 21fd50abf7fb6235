//! Per-account Slack configuration: signing secrets, bot tokens, and the
//! host webhook this adapter forwards every event to.

/// One configured Slack account/workspace.
#[derive(Debug, Clone)]
pub struct SlackAccount {
    pub id: String,
    #[allow(dead_code)]
    pub bot_token: String,
    pub signing_secret: Option<String>,
    pub webhook_path: Option<String>,
}

/// Adapter-wide configuration: known accounts plus the fallback secrets and
/// webhook target used when an event can't be attributed to a named account.
#[derive(Debug, Clone, Default)]
pub struct SlackChannelsConfig {
    pub accounts: Vec<SlackAccount>,
    pub base_signing_secret: Option<String>,
    pub host_webhook_override: Option<String>,
    pub openclaw_http_port: Option<u16>,
}

impl SlackChannelsConfig {
    /// Load account-agnostic fallbacks from the environment: base signing
    /// secret and the two legacy env var names, plus an explicit webhook
    /// override and the host's HTTP port (§4.4 "Forwarding").
    pub fn from_env() -> Self {
        let base_signing_secret = std::env::var("GATEWAY_SLACK_SIGNING_SECRET")
            .ok()
            .or_else(|| std::env::var("SLACK_SIGNING_SECRET").ok());
        let host_webhook_override = std::env::var("CLAWTALK_HOST_SLACK_WEBHOOK").ok();
        let openclaw_http_port = std::env::var("OPENCLAW_HTTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok());

        Self {
            accounts: Vec::new(),
            base_signing_secret,
            host_webhook_override,
            openclaw_http_port,
        }
    }

    /// Assemble the ordered, de-duplicated set of candidate signing secrets:
    /// per-account secrets first (most specific), then the base secret,
    /// each tagged with the account id it would resolve to.
    pub fn signing_secret_candidates(&self) -> Vec<(String, String)> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        for account in &self.accounts {
            if let Some(secret) = &account.signing_secret {
                if seen.insert(secret.clone()) {
                    out.push((account.id.clone(), secret.clone()));
                }
            }
        }
        if let Some(secret) = &self.base_signing_secret {
            if seen.insert(secret.clone()) {
                out.push(("default".to_string(), secret.clone()));
            }
        }
        out
    }

    /// Resolve the host webhook URL an event should be forwarded to.
    pub fn host_webhook_url(&self, account_id: Option<&str>) -> String {
        if let Some(url) = &self.host_webhook_override {
            return url.clone();
        }
        if let Some(account) = account_id.and_then(|id| self.accounts.iter().find(|a| a.id == id)) {
            if let Some(path) = &account.webhook_path {
                return path.clone();
            }
        }
        let port = self.openclaw_http_port.unwrap_or(3000);
        format!("http://127.0.0.1:{port}/slack/events")
    }

    pub fn bot_token_for(&self, account_id: Option<&str>) -> Option<&str> {
        let id = account_id.unwrap_or("default");
        self.accounts
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.bot_token.as_str())
    }
}
