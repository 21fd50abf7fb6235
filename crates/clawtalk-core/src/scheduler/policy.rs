//! Policy-allowed tool set computation (§4.7 step 3): execution mode,
//! allow/deny lists, and capability flags narrowed down to the tools a job
//! run for a given Talk is permitted to use.

use std::collections::HashSet;

use crate::talk::{NetworkAccess, Talk, ToolMode};

/// Tools that require outbound network access; withheld unless the Talk
/// grants `NetworkAccess::FullOutbound`.
const NETWORK_TOOLS: &[&str] = &["web_search", "web_fetch", "web_research"];

/// Narrow `available_tools` (the host's full catalog) down to what this
/// Talk's policy permits.
pub fn compute_policy_allowed_tools(talk: &Talk, available_tools: &[String]) -> Vec<String> {
    if talk.tool_mode == ToolMode::Off {
        return Vec::new();
    }

    let deny: HashSet<String> = talk
        .tools_deny
        .iter()
        .map(|t| t.to_ascii_lowercase())
        .collect();
    let allow: HashSet<String> = talk
        .tools_allow
        .iter()
        .map(|t| t.to_ascii_lowercase())
        .collect();

    available_tools
        .iter()
        .filter(|t| {
            let lower = t.to_ascii_lowercase();
            if deny.contains(&lower) {
                return false;
            }
            if !allow.is_empty() && !allow.contains(&lower) {
                return false;
            }
            if talk.network_access != NetworkAccess::FullOutbound
                && NETWORK_TOOLS.contains(&lower.as_str())
            {
                return false;
            }
            true
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn talk() -> Talk {
        Talk::new("t1".into(), "gpt".into(), 0, "c1".into())
    }

    #[test]
    fn tool_mode_off_returns_nothing() {
        let mut t = talk();
        t.tool_mode = ToolMode::Off;
        let allowed = compute_policy_allowed_tools(&t, &["search".to_string()]);
        assert!(allowed.is_empty());
    }

    #[test]
    fn deny_list_wins_over_allow_list() {
        let mut t = talk();
        t.tool_mode = ToolMode::Auto;
        t.tools_allow = vec!["search".into()];
        t.tools_deny = vec!["search".into()];
        let allowed = compute_policy_allowed_tools(&t, &["search".to_string()]);
        assert!(allowed.is_empty());
    }

    #[test]
    fn network_tools_withheld_without_full_outbound() {
        let mut t = talk();
        t.tool_mode = ToolMode::Auto;
        let allowed = compute_policy_allowed_tools(
            &t,
            &["web_search".to_string(), "read_file".to_string()],
        );
        assert_eq!(allowed, vec!["read_file".to_string()]);
    }

    #[test]
    fn full_outbound_allows_network_tools() {
        let mut t = talk();
        t.tool_mode = ToolMode::Auto;
        t.network_access = NetworkAccess::FullOutbound;
        let allowed = compute_policy_allowed_tools(&t, &["web_search".to_string()]);
        assert_eq!(allowed, vec!["web_search".to_string()]);
    }
}
