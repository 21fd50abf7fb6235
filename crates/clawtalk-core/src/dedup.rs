//! DedupTable (C3): process-local at-least-once → exactly-once dedup with TTL.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::routing::Decision;

const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

struct Entry {
    inserted_at: Instant,
    decision: Decision,
}

/// Build a dedup key from Slack event coordinates: `slack:<account>:<channel>:<ts>:<user>`.
pub fn event_id(
    account_id: Option<&str>,
    channel_id: &str,
    message_ts: Option<&str>,
    thread_ts: Option<&str>,
    user_id: Option<&str>,
) -> String {
    let account = account_id.unwrap_or("default");
    let ts = message_ts.or(thread_ts).unwrap_or("unknown");
    let user = user_id.unwrap_or("unknown");
    format!("slack:{account}:{channel_id}:{ts}:{user}")
}

/// In-memory `eventId → decision` memo, TTL-bounded, pruned on every insert.
pub struct DedupTable {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl DedupTable {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up an event id. Returns the previously recorded decision if
    /// present and not yet expired.
    pub fn lookup(&self, event_id: &str) -> Option<Decision> {
        let entries = self.entries.lock().unwrap();
        entries.get(event_id).and_then(|e| {
            if e.inserted_at.elapsed() <= self.ttl {
                Some(e.decision.clone())
            } else {
                None
            }
        })
    }

    /// Record a decision for an event id, pruning expired entries. If the
    /// event id was already recorded (and not expired) the previous
    /// decision is returned without overwriting it (P3).
    pub fn insert_or_get(&self, event_id: &str, decision: Decision) -> (Decision, bool) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, e| e.inserted_at.elapsed() <= self.ttl);

        if let Some(existing) = entries.get(event_id) {
            if existing.inserted_at.elapsed() <= self.ttl {
                return (existing.decision.clone(), true);
            }
        }

        entries.insert(
            event_id.to_string(),
            Entry {
                inserted_at: Instant::now(),
                decision: decision.clone(),
            },
        );
        (decision, false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::DecisionKind;

    fn decision(reason: &str) -> Decision {
        Decision {
            decision: DecisionKind::Pass,
            talk_id: Some("t1".into()),
            binding_id: None,
            reason: Some(reason.to_string()),
            behavior: None,
        }
    }

    #[test]
    fn p3_replay_returns_original_decision() {
        let table = DedupTable::new();
        let (d1, dup1) = table.insert_or_get("e1", decision("delegated-to-agent"));
        assert!(!dup1);
        let (d2, dup2) = table.insert_or_get("e1", decision("something-else"));
        assert!(dup2);
        assert_eq!(d1, d2);
        assert_eq!(d2.reason.as_deref(), Some("delegated-to-agent"));
    }

    #[test]
    fn expired_entries_are_pruned_and_treated_as_new() {
        let table = DedupTable::with_ttl(Duration::from_millis(1));
        let (_, dup1) = table.insert_or_get("e1", decision("delegated-to-agent"));
        assert!(!dup1);
        std::thread::sleep(Duration::from_millis(5));
        let (_, dup2) = table.insert_or_get("e1", decision("delegated-to-agent"));
        assert!(!dup2);
    }

    #[test]
    fn event_id_format() {
        let id = event_id(Some("acct"), "C123", Some("ts1"), None, Some("U1"));
        assert_eq!(id, "slack:acct:C123:ts1:U1");
        let id2 = event_id(None, "C123", None, None, None);
        assert_eq!(id2, "slack:default:C123:unknown:unknown");
    }
}
