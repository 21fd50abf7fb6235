//! The host's own config file shapes, as understood by the reconciler and
//! the ownership doctor. The host owns this file's schema; these are the
//! subset of fields clawtalk reads and writes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// `match.peer` on a host binding row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRef {
    pub kind: String,
    pub id: String,
}

/// `match` on a host binding row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMatch {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<PeerRef>,
}

/// One routing row in the host's config: which agent owns which peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBinding {
    pub agent_id: String,
    #[serde(rename = "match")]
    pub match_: HostMatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_mention: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sandbox {
    pub mode: String,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self { mode: "off".to_string() }
    }
}

/// One agent definition in the host's config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAgent {
    pub id: String,
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub sandbox: Sandbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    Http,
    Socket,
}

/// One Slack account entry; `signing_secret` is propagated onto it by the
/// reconciler when the account is in HTTP mode and the field is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAccount {
    pub id: String,
    pub mode: AccountMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<String>,
}

/// The slice of the host's config file clawtalk reads and rewrites.
/// `extra` preserves every field the host owns that clawtalk does not
/// model, so a round-trip through this type never drops unrelated config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenClawConfig {
    #[serde(default)]
    pub bindings: Vec<HostBinding>,
    #[serde(default)]
    pub agents: Vec<HostAgent>,
    #[serde(default)]
    pub accounts: Vec<HostAccount>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
