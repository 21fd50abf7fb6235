//! RoutingReconciler (C10): projects every Talk's Slack write bindings onto
//! the host's own config file, so the host's agent never double-handles a
//! channel clawtalk already owns.
//!
//! Runs once at startup (§9 "Routing reconciliation runs only at startup").

use std::path::Path;

use tracing::info;

use crate::talk::{Behavior, Binding, ResponseMode, Talk};

use super::types::{
    AccountMode, HostAccount, HostAgent, HostBinding, HostMatch, OpenClawConfig, PeerRef,
    ReconcileError, Sandbox,
};

const MANAGED_PREFIX: &str = "ct-";
const LEGACY_MANAGED_AGENT_ID: &str = "clawtalk";

/// Derive the stable, prefix-unique managed agent id for a Talk.
pub fn managed_agent_id(talk_id: &str) -> String {
    format!("{MANAGED_PREFIX}{}", talk_id.chars().take(8).collect::<String>())
}

fn is_managed_agent_id(agent_id: &str) -> bool {
    agent_id.starts_with(MANAGED_PREFIX) || agent_id == LEGACY_MANAGED_AGENT_ID
}

/// Parse a binding's scope into the host's `{kind, id}` peer shape.
/// Returns `None` for wildcard/unparseable scopes (`slack:*`, bare names).
fn parse_peer(scope: &str) -> Option<PeerRef> {
    let canonical = crate::talk::canonicalize_slack_scope(scope);
    let (kind, id) = canonical.split_once(':')?;
    if kind != "channel" && kind != "user" {
        return None;
    }
    if id.is_empty() || id == "*" {
        return None;
    }
    Some(PeerRef {
        kind: kind.to_string(),
        id: id.to_ascii_uppercase(),
    })
}

struct DesiredRow {
    binding: HostBinding,
    talk: String,
}

fn desired_rows(talks: &[Talk]) -> Vec<DesiredRow> {
    let mut rows = Vec::new();
    for talk in talks {
        for binding in &talk.platform_bindings {
            if binding.platform != "slack" || !binding.permission.can_write() {
                continue;
            }
            let Some(peer) = parse_peer(&binding.scope) else {
                continue;
            };
            let require_mention = find_behavior(talk, &binding.id)
                .map(|b| b.response_mode == Some(ResponseMode::Mentions));
            rows.push(DesiredRow {
                binding: HostBinding {
                    agent_id: managed_agent_id(&talk.id),
                    match_: HostMatch {
                        channel: "slack".to_string(),
                        account_id: binding.account_id.clone(),
                        peer: Some(peer),
                    },
                    require_mention,
                },
                talk: talk.id.clone(),
            });
        }
    }
    rows
}

fn find_behavior<'a>(talk: &'a Talk, binding_id: &str) -> Option<&'a Behavior> {
    talk.platform_behaviors
        .iter()
        .find(|b| b.platform_binding_id == binding_id)
}

fn row_key(m: &HostMatch) -> Option<(String, String, String)> {
    let peer = m.peer.as_ref()?;
    Some((
        m.account_id.clone().unwrap_or_default(),
        peer.kind.clone(),
        peer.id.to_ascii_uppercase(),
    ))
}

fn desired_talk_model(talk: &Talk, default_model: &str) -> String {
    if talk.model.is_empty() {
        default_model.to_string()
    } else {
        talk.model.clone()
    }
}

fn desired_agent_name(talk: &Talk, agent_id: &str) -> String {
    if talk.topic_title.trim().is_empty() {
        format!("ClawTalk {agent_id}")
    } else {
        talk.topic_title.clone()
    }
}

/// Pure computation of the next config given the current one. Returns the
/// next config and whether it differs from the input.
pub fn compute_next_config(
    talks: &[Talk],
    current: OpenClawConfig,
    default_model: &str,
) -> (OpenClawConfig, bool) {
    let desired = desired_rows(talks);
    let desired_keys: std::collections::HashSet<_> = desired
        .iter()
        .filter_map(|row| row_key(&row.binding.match_))
        .collect();

    let mut bindings: Vec<HostBinding> = desired.iter().map(|row| row.binding.clone()).collect();
    for existing in &current.bindings {
        if existing.match_.channel != "slack" {
            bindings.push(existing.clone());
            continue;
        }
        let key = row_key(&existing.match_);
        let is_desired = key.as_ref().is_some_and(|k| desired_keys.contains(k));
        if is_desired {
            continue;
        }
        if is_managed_agent_id(&existing.agent_id) {
            continue;
        }
        bindings.push(existing.clone());
    }

    let mut agents = current.agents.clone();
    for row in &desired {
        let talk = talks.iter().find(|t| &t.id == &row.talk);
        let Some(talk) = talk else { continue };
        let agent_id = row.binding.agent_id.clone();
        let wanted = HostAgent {
            id: agent_id.clone(),
            name: desired_agent_name(talk, &agent_id),
            model: desired_talk_model(talk, default_model),
            sandbox: Sandbox::default(),
        };
        match agents.iter_mut().find(|a| a.id == agent_id) {
            Some(slot) => *slot = wanted,
            None => agents.push(wanted),
        }
    }

    let mut accounts = current.accounts.clone();
    for account in accounts.iter_mut() {
        if account.mode == AccountMode::Http && account.signing_secret.as_deref().unwrap_or("").is_empty() {
            if let Some(secret) = signing_secret_for(&account.id) {
                account.signing_secret = Some(secret);
            }
        }
    }

    let next = OpenClawConfig {
        bindings,
        agents,
        accounts,
        extra: current.extra.clone(),
    };
    let changed = next != current;
    (next, changed)
}

/// Resolve a signing secret for an HTTP-mode account from the environment.
/// Socket-mode accounts never need this (§4.10 step 7).
fn signing_secret_for(account_id: &str) -> Option<String> {
    std::env::var(format!("CLAWTALK_SLACK_SIGNING_SECRET_{}", account_id.to_ascii_uppercase()))
        .ok()
        .or_else(|| std::env::var("CLAWTALK_SLACK_SIGNING_SECRET").ok())
}

/// Read the host's config, reconcile it against `talks`, and write it back
/// only if it changed. Returns whether a write happened.
pub async fn reconcile_once(
    talks: &[Talk],
    config_path: &Path,
    default_model: &str,
) -> Result<bool, ReconcileError> {
    let raw = tokio::fs::read_to_string(config_path).await?;
    let current: OpenClawConfig = serde_json::from_str(&raw)?;
    let (next, changed) = compute_next_config(talks, current, default_model);
    if !changed {
        info!("routing reconciler: host config already up to date");
        return Ok(false);
    }

    let serialized = serde_json::to_vec_pretty(&next)?;
    let tmp_path = config_path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &serialized).await?;
    tokio::fs::rename(&tmp_path, config_path).await?;
    info!(path = %config_path.display(), "routing reconciler: host config updated");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::talk::{Permission, Talk};

    fn write_binding(scope: &str) -> Binding {
        Binding {
            id: "b1".into(),
            platform: "slack".into(),
            scope: scope.into(),
            account_id: Some("kimfamily".into()),
            display_scope: None,
            permission: Permission::Write,
            created_at: 0,
        }
    }

    fn talk(id: &str, scope: &str) -> Talk {
        let mut t = Talk::new(id.into(), "gpt-4".into(), 0, "c1".into());
        t.platform_bindings.push(write_binding(scope));
        t
    }

    fn empty_config() -> OpenClawConfig {
        OpenClawConfig {
            bindings: Vec::new(),
            agents: Vec::new(),
            accounts: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn managed_agent_id_is_stable_and_prefixed() {
        assert_eq!(managed_agent_id("abcdefghij"), "ct-abcdefgh");
        assert_eq!(managed_agent_id("ab"), "ct-ab");
    }

    #[test]
    fn emits_desired_binding_and_agent() {
        let t = talk("talk-0001", "channel:C01CL1PU022");
        let (next, changed) = compute_next_config(&[t], empty_config(), "gpt-4");
        assert!(changed);
        assert_eq!(next.bindings.len(), 1);
        let row = &next.bindings[0];
        assert_eq!(row.agent_id, "ct-talk-000");
        assert_eq!(row.match_.peer.as_ref().unwrap().id, "C01CL1PU022");
        assert_eq!(next.agents.len(), 1);
        assert_eq!(next.agents[0].id, "ct-talk-000");
    }

    #[test]
    fn retains_non_managed_slack_rows_not_desired() {
        let t = talk("talk-0001", "channel:C999");
        let mut cfg = empty_config();
        cfg.bindings.push(HostBinding {
            agent_id: "user-agent".into(),
            match_: HostMatch {
                channel: "slack".into(),
                account_id: Some("kimfamily".into()),
                peer: Some(PeerRef { kind: "channel".into(), id: "COTHER".into() }),
            },
            require_mention: None,
        });
        let (next, _) = compute_next_config(&[t], cfg, "gpt-4");
        assert!(next.bindings.iter().any(|b| b.agent_id == "user-agent"));
    }

    #[test]
    fn drops_stale_managed_rows_no_longer_desired() {
        let mut cfg = empty_config();
        cfg.bindings.push(HostBinding {
            agent_id: "ct-stalexxx".into(),
            match_: HostMatch {
                channel: "slack".into(),
                account_id: Some("kimfamily".into()),
                peer: Some(PeerRef { kind: "channel".into(), id: "CSTALE".into() }),
            },
            require_mention: None,
        });
        let (next, changed) = compute_next_config(&[], cfg, "gpt-4");
        assert!(changed);
        assert!(next.bindings.is_empty());
    }

    #[test]
    fn idempotent_second_pass_reports_unchanged() {
        let t = talk("talk-0001", "channel:C01CL1PU022");
        let (next, _) = compute_next_config(&[t.clone()], empty_config(), "gpt-4");
        let (next2, changed2) = compute_next_config(&[t], next.clone(), "gpt-4");
        assert!(!changed2);
        assert_eq!(next, next2);
    }
}
