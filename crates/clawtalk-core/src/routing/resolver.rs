//! RoutingResolver (C2): pure function mapping a Slack event and the set of
//! known Talks to a routing decision. No I/O, no mutation — see P5.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::talk::{Behavior, Binding, ResponseMode, Talk, TriggerPolicy};

use super::intent::{classify, Intent};

/// The inbound Slack event shape the resolver scores against. Built by
/// `clawtalk-channels` from the raw Slack payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_target: Option<String>,
    pub text: String,
}

/// The resolver's output: either `handled` (own it, the core replies) or
/// `pass` with a documented reason (the host's managed agent replies, or
/// nobody does).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The matched (Talk, binding) Behavior, if one exists. Carried through
    /// so the ingress layer can gate mirroring on `mirrorToTalk` without
    /// re-resolving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<Behavior>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Handled,
    Pass,
}

impl Decision {
    fn pass(reason: &str) -> Self {
        Self {
            decision: DecisionKind::Pass,
            talk_id: None,
            binding_id: None,
            reason: Some(reason.to_string()),
            behavior: None,
        }
    }
}

fn mention_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"<@[A-Za-z0-9]+>|@\w+").unwrap())
}

/// Score a single binding against an event. Returns `-1` if excluded.
fn score_binding(binding: &Binding, event: &SlackEvent) -> i32 {
    if binding.platform != "slack" || !binding.permission.can_write() {
        return -1;
    }
    if let (Some(want), Some(got)) = (&binding.account_id, &event.account_id) {
        if want != got {
            return -1;
        }
    }
    if binding.account_id.is_some() && event.account_id.is_none() {
        return -1;
    }

    let scope = crate::talk::canonicalize_slack_scope(&binding.scope);
    let channel_lower = event.channel_id.to_ascii_lowercase();

    let direct_forms = [
        channel_lower.clone(),
        format!("channel:{channel_lower}"),
        format!("user:{channel_lower}"),
        format!("slack:{channel_lower}"),
    ];
    if direct_forms.contains(&scope) {
        return 100;
    }

    if let Some(outbound) = &event.outbound_target {
        if scope == outbound.to_ascii_lowercase() {
            return 95;
        }
    }

    if let Some(name) = &event.channel_name {
        let name_lower = name.to_ascii_lowercase();
        if scope == format!("#{name_lower}") || scope == name_lower {
            return 90;
        }
        if scope.ends_with(&format!(" #{name_lower}")) {
            return 80;
        }
    }

    if scope == "*" || scope == "all" || scope == "slack:*" {
        return 10;
    }

    -1
}

struct OwnerMatch<'a> {
    talk: &'a Talk,
    binding: &'a Binding,
    score: i32,
}

/// Find the owning Talk for an event by scope score; ties at the top are
/// ambiguous and never resolved arbitrarily.
fn find_owner<'a>(event: &SlackEvent, talks: &'a [Talk]) -> Result<Option<OwnerMatch<'a>>, Decision> {
    let mut best: Option<OwnerMatch<'a>> = None;
    let mut best_count = 0usize;

    for talk in talks {
        let mut talk_best: Option<(&Binding, i32)> = None;
        for binding in &talk.platform_bindings {
            let s = score_binding(binding, event);
            if s < 0 {
                continue;
            }
            if talk_best.map(|(_, bs)| s > bs).unwrap_or(true) {
                talk_best = Some((binding, s));
            }
        }
        let Some((binding, score)) = talk_best else {
            continue;
        };
        match &best {
            None => {
                best = Some(OwnerMatch { talk, binding, score });
                best_count = 1;
            }
            Some(current) if score > current.score => {
                best = Some(OwnerMatch { talk, binding, score });
                best_count = 1;
            }
            Some(current) if score == current.score => {
                best_count += 1;
            }
            _ => {}
        }
    }

    if best_count >= 2 {
        return Err(Decision::pass("ambiguous-binding"));
    }
    Ok(best)
}

fn find_behavior<'a>(talk: &'a Talk, binding_id: &str) -> Option<&'a Behavior> {
    talk.platform_behaviors
        .iter()
        .find(|b| b.platform_binding_id == binding_id)
}

/// Run the behavior gate for an owned (Talk, Binding, Behavior?) triple.
fn apply_behavior_gate(event: &SlackEvent, behavior: Option<&Behavior>) -> Result<(), &'static str> {
    let Some(behavior) = behavior else {
        return Err("no-platform-behavior");
    };

    if let Some(policy) = &behavior.response_policy {
        if let Some(allowed) = &policy.allowed_senders {
            let sender = event
                .user_name
                .as_deref()
                .or(event.user_id.as_deref())
                .unwrap_or("")
                .to_ascii_lowercase();
            let ok = allowed.iter().any(|a| a.to_ascii_lowercase() == sender);
            if !ok {
                return Err("sender-not-allowed");
            }
        }
    }

    match behavior.response_mode.unwrap_or(ResponseMode::Off) {
        ResponseMode::Off => return Err("on-message-disabled"),
        ResponseMode::Mentions => {
            if !mention_re().is_match(&event.text) {
                return Err("mention-required");
            }
        }
        ResponseMode::All => {}
    }

    if let Some(policy) = &behavior.response_policy {
        if let Some(trigger_policy) = policy.trigger_policy {
            let intent = classify(&event.text);
            let advice_like = matches!(intent, Intent::Advice | Intent::Study);
            let ok = match trigger_policy {
                TriggerPolicy::Judgment => true,
                TriggerPolicy::StudyEntriesOnly => intent == Intent::Study,
                TriggerPolicy::AdviceOrStudy => advice_like,
            };
            if !ok {
                return Err("trigger-policy-not-met");
            }
        }
    }

    Ok(())
}

/// Resolve a single Slack event against the known Talks (§4.2). Pure: the
/// same inputs always produce the same output (P5).
pub fn resolve(event: &SlackEvent, talks: &[Talk]) -> Decision {
    let owner = match find_owner(event, talks) {
        Ok(owner) => owner,
        Err(ambiguous) => return ambiguous,
    };

    let Some(owner) = owner else {
        return Decision::pass("no-binding");
    };

    let behavior = find_behavior(owner.talk, &owner.binding.id);
    match apply_behavior_gate(event, behavior) {
        Ok(()) => Decision {
            decision: DecisionKind::Handled,
            talk_id: Some(owner.talk.id.clone()),
            binding_id: Some(owner.binding.id.clone()),
            reason: None,
            behavior: behavior.cloned(),
        },
        Err(reason) => Decision {
            decision: DecisionKind::Pass,
            talk_id: Some(owner.talk.id.clone()),
            binding_id: Some(owner.binding.id.clone()),
            reason: Some(reason.to_string()),
            behavior: behavior.cloned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::talk::Permission;

    fn binding(scope: &str) -> Binding {
        Binding {
            id: "b1".into(),
            platform: "slack".into(),
            scope: scope.into(),
            account_id: None,
            display_scope: None,
            permission: Permission::Write,
            created_at: 0,
        }
    }

    fn talk_with(binding: Binding) -> Talk {
        let mut t = Talk::new("t1".into(), "gpt".into(), 0, "c1".into());
        t.platform_bindings.push(binding);
        t
    }

    fn event(channel: &str, text: &str) -> SlackEvent {
        SlackEvent {
            event_id: Some("e1".into()),
            account_id: None,
            channel_id: channel.into(),
            channel_name: None,
            thread_ts: None,
            message_ts: None,
            user_id: None,
            user_name: None,
            outbound_target: None,
            text: text.into(),
        }
    }

    #[test]
    fn owner_found_without_behavior_is_pass_no_platform_behavior() {
        // The resolver's own raw reason for an owned binding with zero
        // Behaviors. SlackIngress wraps any owner-found pass into
        // `delegated-to-agent` before recording (S1) — this test covers
        // only the resolver's half of that pipeline.
        let talk = talk_with(binding("channel:C123"));
        let decision = resolve(&event("C123", "hello"), std::slice::from_ref(&talk));
        assert_eq!(decision.decision, DecisionKind::Pass);
        assert_eq!(decision.talk_id.as_deref(), Some("t1"));
        assert_eq!(decision.reason.as_deref(), Some("no-platform-behavior"));
        assert!(decision.behavior.is_none());
    }

    #[test]
    fn s3_unbound_channel() {
        let talk = talk_with(binding("channel:C123"));
        let decision = resolve(&event("C999", "hello"), std::slice::from_ref(&talk));
        assert_eq!(decision.decision, DecisionKind::Pass);
        assert_eq!(decision.talk_id, None);
        assert_eq!(decision.reason.as_deref(), Some("no-binding"));
    }

    #[test]
    fn wildcard_scope_scores_low_but_matches() {
        let talk = talk_with(binding("slack:*"));
        let decision = resolve(&event("C999", "hello"), std::slice::from_ref(&talk));
        assert_eq!(decision.talk_id.as_deref(), Some("t1"));
    }

    #[test]
    fn ambiguous_tie_never_picks_arbitrarily() {
        let talk_a = talk_with(binding("channel:C123"));
        let mut talk_b = talk_with(binding("channel:C123"));
        talk_b.id = "t2".into();
        let decision = resolve(&event("C123", "hello"), &[talk_a, talk_b]);
        assert_eq!(decision.decision, DecisionKind::Pass);
        assert_eq!(decision.reason.as_deref(), Some("ambiguous-binding"));
        assert_eq!(decision.talk_id, None);
    }

    #[test]
    fn resolve_is_pure() {
        let talk = talk_with(binding("channel:C123"));
        let e = event("C123", "hello");
        let d1 = resolve(&e, std::slice::from_ref(&talk));
        let d2 = resolve(&e, std::slice::from_ref(&talk));
        assert_eq!(d1, d2);
    }
}
