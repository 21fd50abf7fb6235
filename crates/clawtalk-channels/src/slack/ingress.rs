//! SlackIngress (C5, §4.5): dedup + routing record + optional mirror of an
//! inbound Slack message into its owning Talk's history.
//!
//! The gateway never answers a Slack message itself — whatever the resolver
//! decides, the reply (if any) comes from the host's own managed agent or
//! from a scheduled/event job. Any time an owner Talk is found, the raw
//! resolver reason is folded into `pass/delegated-to-agent`: ownership alone
//! is what routes the message to the host's managed agent, regardless of
//! why the core itself declined to answer. This pipeline exists to keep the
//! dedup table, the per-Talk pass counter, and Talk history honest — never
//! to gate delivery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use clawtalk_core::routing::{resolve, Decision, DecisionKind, SlackEvent};
use clawtalk_core::store::TalkStore;
use clawtalk_core::talk::MessageRole;
use clawtalk_core::DedupTable;

pub struct SlackIngress {
    store: Arc<TalkStore>,
    dedup: Arc<DedupTable>,
    pass_counts: Mutex<HashMap<String, u64>>,
}

/// Outcome of running one event through the pipeline, surfaced to the proxy
/// for its diagnostic `routed` ack field.
#[derive(Debug, Clone)]
pub struct IngressOutcome {
    pub duplicate: bool,
    pub decision: Decision,
}

impl SlackIngress {
    pub fn new(store: Arc<TalkStore>, dedup: Arc<DedupTable>) -> Self {
        Self { store, dedup, pass_counts: Mutex::new(HashMap::new()) }
    }

    /// Run one inbound Slack event through dedup, resolution, and mirroring.
    pub async fn handle(&self, event: &SlackEvent, event_id: &str) -> IngressOutcome {
        let talks = self.store.list().await;
        let decision = resolve(event, &talks);
        let decision = delegate_if_owned(decision);
        let (recorded, duplicate) = self.dedup.insert_or_get(event_id, decision);

        if duplicate {
            return IngressOutcome { duplicate: true, decision: recorded };
        }

        if let Some(talk_id) = &recorded.talk_id {
            self.record_pass(talk_id);

            let mirrors = recorded
                .behavior
                .as_ref()
                .and_then(|b| b.mirror_to_talk)
                .is_some_and(|m| m.mirrors_inbound());
            if mirrors {
                self.mirror_inbound(talk_id, event).await;
            }
        }

        IngressOutcome { duplicate: false, decision: recorded }
    }

    fn record_pass(&self, talk_id: &str) {
        let mut counts = self.pass_counts.lock().unwrap();
        *counts.entry(talk_id.to_string()).or_insert(0) += 1;
    }

    /// Pass counter for a Talk, per §4.5 step 2/S1. Process-local, reset on restart.
    pub fn pass_count(&self, talk_id: &str) -> u64 {
        self.pass_counts.lock().unwrap().get(talk_id).copied().unwrap_or(0)
    }

    async fn mirror_inbound(&self, talk_id: &str, event: &SlackEvent) {
        let header = match &event.thread_ts {
            Some(thread_ts) => format!(
                "[Slack #{} (thread {}) from {}]",
                event.channel_id,
                thread_ts,
                event.user_name.as_deref().or(event.user_id.as_deref()).unwrap_or("unknown")
            ),
            None => format!(
                "[Slack #{} from {}]",
                event.channel_id,
                event.user_name.as_deref().or(event.user_id.as_deref()).unwrap_or("unknown")
            ),
        };
        let content = format!("{header}\n{}", event.text);

        if let Err(e) = self.store.append_message(talk_id, MessageRole::User, content).await {
            warn!(talk_id, error = %e, "failed to mirror inbound slack message to talk history");
        }
    }
}

/// Any decision that found an owner Talk is delegated to the host's managed
/// agent for that Talk (§4.10) — the core itself never replies, so the raw
/// resolver reason (`no-platform-behavior`, `sender-not-allowed`, or an
/// outright `handled`) is collapsed into the single recorded reason
/// `delegated-to-agent`. Only decisions with no owner (`no-binding`,
/// `ambiguous-binding`) keep their original reason.
fn delegate_if_owned(decision: Decision) -> Decision {
    if decision.talk_id.is_none() {
        return decision;
    }
    Decision {
        decision: DecisionKind::Pass,
        talk_id: decision.talk_id,
        binding_id: decision.binding_id,
        reason: Some("delegated-to-agent".to_string()),
        behavior: decision.behavior,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawtalk_core::talk::{Behavior, Binding, MirrorToTalk, Permission};
    use tempfile::tempdir;

    fn event(channel: &str, text: &str) -> SlackEvent {
        SlackEvent {
            event_id: Some("e1".into()),
            account_id: None,
            channel_id: channel.into(),
            channel_name: None,
            thread_ts: None,
            message_ts: Some("1.1".into()),
            user_id: Some("U1".into()),
            user_name: None,
            outbound_target: None,
            text: text.into(),
        }
    }

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

    async fn store_with_talk(binding: Binding) -> (Arc<TalkStore>, String) {
        store_with_talk_and_behavior(binding, None).await
    }

    async fn store_with_talk_and_behavior(
        binding: Binding,
        behavior: Option<Behavior>,
    ) -> (Arc<TalkStore>, String) {
        let dir = tempdir().unwrap();
        let store = Arc::new(TalkStore::new(dir.path().to_path_buf()));
        let talk = store.create(Some("gpt".into())).await.unwrap();
        store
            .update(&talk.id, clawtalk_core::store::TalkPatch {
                platform_bindings: Some(vec![binding]),
                platform_behaviors: behavior.map(|b| vec![b]),
                ..Default::default()
            })
            .await
            .unwrap();
        // Leak dir so the tempdir survives the test; fine in #[cfg(test)].
        std::mem::forget(dir);
        (store, talk.id)
    }

    #[tokio::test]
    async fn s1_delegated_channel_no_mirror() {
        let (store, talk_id) = store_with_talk(binding("channel:C123")).await;
        let ingress = SlackIngress::new(store.clone(), Arc::new(DedupTable::new()));

        let outcome = ingress.handle(&event("C123", "hello"), "e1").await;
        assert!(!outcome.duplicate);
        assert_eq!(outcome.decision.talk_id.as_deref(), Some(talk_id.as_str()));
        assert_eq!(outcome.decision.reason.as_deref(), Some("delegated-to-agent"));
        assert_eq!(ingress.pass_count(&talk_id), 1);

        let history = store.get_messages(&talk_id).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn s2_delegated_with_inbound_mirror() {
        let behavior = Behavior {
            id: "beh1".into(),
            platform_binding_id: "b1".into(),
            response_mode: None,
            mirror_to_talk: Some(MirrorToTalk::Inbound),
            agent_name: None,
            on_message_prompt: None,
            delivery_mode: None,
            response_policy: None,
        };
        let (store, talk_id) =
            store_with_talk_and_behavior(binding("channel:C456"), Some(behavior)).await;
        let ingress = SlackIngress::new(store.clone(), Arc::new(DedupTable::new()));

        let outcome = ingress.handle(&event("C456", "study update: 30 minutes"), "e2").await;
        assert!(!outcome.duplicate);
        assert_eq!(outcome.decision.reason.as_deref(), Some("delegated-to-agent"));

        let history = store.get_messages(&talk_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::User);
        assert!(history[0].content.contains("study update"));
        assert!(history[0].content.starts_with("[Slack #"));
    }

    #[tokio::test]
    async fn mirror_off_behavior_never_writes_history() {
        let behavior = Behavior {
            id: "beh1".into(),
            platform_binding_id: "b1".into(),
            response_mode: None,
            mirror_to_talk: Some(MirrorToTalk::Off),
            agent_name: None,
            on_message_prompt: None,
            delivery_mode: None,
            response_policy: None,
        };
        let (store, talk_id) =
            store_with_talk_and_behavior(binding("channel:C123"), Some(behavior)).await;
        let ingress = SlackIngress::new(store.clone(), Arc::new(DedupTable::new()));

        ingress.handle(&event("C123", "hello"), "e1").await;
        let history = store.get_messages(&talk_id).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn s3_unbound_channel_no_mirror() {
        let (store, _talk_id) = store_with_talk(binding("channel:C123")).await;
        let ingress = SlackIngress::new(store.clone(), Arc::new(DedupTable::new()));

        let outcome = ingress.handle(&event("C999", "hello"), "e1").await;
        assert!(!outcome.duplicate);
        assert_eq!(outcome.decision.talk_id, None);
        assert_eq!(outcome.decision.reason.as_deref(), Some("no-binding"));
    }

    #[tokio::test]
    async fn p3_duplicate_event_id_is_not_remirrored() {
        let behavior = Behavior {
            id: "beh1".into(),
            platform_binding_id: "b1".into(),
            response_mode: None,
            mirror_to_talk: Some(MirrorToTalk::Inbound),
            agent_name: None,
            on_message_prompt: None,
            delivery_mode: None,
            response_policy: None,
        };
        let (store, talk_id) =
            store_with_talk_and_behavior(binding("channel:C123"), Some(behavior)).await;
        let ingress = SlackIngress::new(store.clone(), Arc::new(DedupTable::new()));

        ingress.handle(&event("C123", "hello"), "e1").await;
        let outcome = ingress.handle(&event("C123", "hello again"), "e1").await;
        assert!(outcome.duplicate);

        let history = store.get_messages(&talk_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(ingress.pass_count(&talk_id), 1);
    }
}
