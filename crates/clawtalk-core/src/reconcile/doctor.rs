//! OwnershipDoctor (C11): detects, but never remediates, overlap between a
//! Talk's Slack write bindings and the host's own agent routing table.

use serde::{Deserialize, Serialize};

use crate::talk::{Permission, Talk};

use super::types::OpenClawConfig;

/// One detected overlap between a clawtalk Talk and a host-owned binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub talk_id: String,
    pub talk_scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talk_account_id: Option<String>,
    pub open_claw_agent_id: String,
    pub open_claw_scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_claw_account_id: Option<String>,
}

fn normalize(account_id: Option<&str>, scope: &str) -> (String, String) {
    (
        account_id.unwrap_or("").to_ascii_lowercase(),
        crate::talk::canonicalize_slack_scope(scope),
    )
}

fn matches_wildcard(talk_scope: &str, host_scope: &str) -> bool {
    talk_scope == host_scope || talk_scope == "slack:*" || host_scope == "slack:*"
}

/// Run the conflict scan. Pure; performs no mutation of either input.
pub fn check_ownership(
    talks: &[Talk],
    config: &OpenClawConfig,
    claw_talk_agent_ids: &[String],
) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for row in &config.bindings {
        if row.match_.channel != "slack" {
            continue;
        }
        let Some(peer) = &row.match_.peer else {
            continue;
        };
        if claw_talk_agent_ids.iter().any(|id| id == &row.agent_id) {
            continue;
        }
        let host_scope = format!("{}:{}", peer.kind, peer.id);
        let (host_account, host_scope_norm) = normalize(row.match_.account_id.as_deref(), &host_scope);

        for talk in talks {
            for binding in &talk.platform_bindings {
                if binding.platform != "slack" || !binding.permission.can_write() {
                    continue;
                }
                let (talk_account, talk_scope_norm) =
                    normalize(binding.account_id.as_deref(), &binding.scope);
                if talk_account != host_account {
                    continue;
                }
                if !matches_wildcard(&talk_scope_norm, &host_scope_norm) {
                    continue;
                }
                conflicts.push(Conflict {
                    talk_id: talk.id.clone(),
                    talk_scope: talk_scope_norm.clone(),
                    talk_account_id: binding.account_id.clone(),
                    open_claw_agent_id: row.agent_id.clone(),
                    open_claw_scope: host_scope_norm.clone(),
                    open_claw_account_id: row.match_.account_id.clone(),
                });
            }
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::types::{HostBinding, HostMatch, PeerRef};
    use crate::talk::Binding;

    fn config_with_binding(agent_id: &str, account_id: &str, peer_id: &str) -> OpenClawConfig {
        OpenClawConfig {
            bindings: vec![HostBinding {
                agent_id: agent_id.to_string(),
                match_: HostMatch {
                    channel: "slack".into(),
                    account_id: Some(account_id.to_string()),
                    peer: Some(PeerRef { kind: "channel".into(), id: peer_id.to_string() }),
                },
                require_mention: None,
            }],
            agents: Vec::new(),
            accounts: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    fn talk_with(account_id: &str, scope: &str) -> Talk {
        let mut t = Talk::new("t1".into(), "gpt".into(), 0, "c1".into());
        t.platform_bindings.push(Binding {
            id: "b1".into(),
            platform: "slack".into(),
            scope: scope.into(),
            account_id: Some(account_id.into()),
            display_scope: None,
            permission: Permission::Write,
            created_at: 0,
        });
        t
    }

    #[test]
    fn s5_ownership_doctor_reports_one_conflict() {
        let talks = vec![talk_with("kimfamily", "channel:C01CL1PU022")];
        let config = config_with_binding("silent", "kimfamily", "C01CL1PU022");
        let claw_talk_agent_ids = vec!["mobileclaw".to_string(), "clawtalk".to_string()];

        let conflicts = check_ownership(&talks, &config, &claw_talk_agent_ids);
        assert_eq!(conflicts.len(), 1);
        let c = &conflicts[0];
        assert_eq!(c.talk_id, "t1");
        assert_eq!(c.open_claw_agent_id, "silent");
        assert_eq!(c.talk_scope, "channel:c01cl1pu022");
    }

    #[test]
    fn claw_talk_owned_rows_are_skipped() {
        let talks = vec![talk_with("kimfamily", "channel:C1")];
        let config = config_with_binding("clawtalk", "kimfamily", "C1");
        let claw_talk_agent_ids = vec!["clawtalk".to_string()];
        assert!(check_ownership(&talks, &config, &claw_talk_agent_ids).is_empty());
    }

    #[test]
    fn wildcard_host_binding_matches_any_channel_in_account() {
        let talks = vec![talk_with("kimfamily", "channel:C1")];
        let mut config = config_with_binding("other-agent", "kimfamily", "*");
        config.bindings[0].match_.peer = Some(PeerRef { kind: "slack".into(), id: "*".into() });
        let conflicts = check_ownership(&talks, &config, &[]);
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn different_account_does_not_conflict() {
        let talks = vec![talk_with("kimfamily", "channel:C1")];
        let config = config_with_binding("other-agent", "other-family", "C1");
        assert!(check_ownership(&talks, &config, &[]).is_empty());
    }
}
