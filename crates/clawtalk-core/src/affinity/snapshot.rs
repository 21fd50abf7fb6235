//! Snapshot aggregation: group observations by intent, keep a sliding
//! window, compute per-tool counts (§4.8 "Snapshot").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::talk::AffinityObservation;

/// Aggregated stats for a single intent within one Talk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentStats {
    pub total_observations: u32,
    pub no_tool_count: u32,
    /// Lower-cased tool name → usage count within the sliding window.
    pub tool_counts: HashMap<String, u32>,
}

/// A Talk's affinity snapshot: one [`IntentStats`] per intent seen so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffinitySnapshot {
    pub intents: HashMap<String, IntentStats>,
}

pub fn build(observations: &[AffinityObservation], window: usize) -> AffinitySnapshot {
    let mut by_intent: HashMap<String, Vec<&AffinityObservation>> = HashMap::new();
    for obs in observations {
        by_intent.entry(obs.intent.clone()).or_default().push(obs);
    }

    let mut intents = HashMap::new();
    for (intent, mut obs) in by_intent {
        obs.sort_by_key(|o| o.timestamp);
        let start = obs.len().saturating_sub(window);
        let windowed = &obs[start..];

        let mut stats = IntentStats::default();
        stats.total_observations = windowed.len() as u32;
        for o in windowed {
            if o.used_tools.is_empty() {
                stats.no_tool_count += 1;
            }
            for tool in &o.used_tools {
                *stats.tool_counts.entry(tool.to_ascii_lowercase()).or_insert(0) += 1;
            }
        }
        intents.insert(intent, stats);
    }

    AffinitySnapshot { intents }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(intent: &str, ts: i64, used: &[&str]) -> AffinityObservation {
        AffinityObservation {
            timestamp: ts,
            intent: intent.to_string(),
            available_tools: vec![],
            used_tools: used.iter().map(|s| s.to_string()).collect(),
            tools_offered: vec![],
            model: "gpt".into(),
            source: "job".into(),
        }
    }

    #[test]
    fn groups_by_intent_and_counts_tools() {
        let observations = vec![
            obs("study", 1, &["Search"]),
            obs("study", 2, &["search"]),
            obs("automation", 3, &[]),
        ];
        let snap = build(&observations, 50);
        let study = &snap.intents["study"];
        assert_eq!(study.total_observations, 2);
        assert_eq!(study.tool_counts["search"], 2);

        let automation = &snap.intents["automation"];
        assert_eq!(automation.no_tool_count, 1);
    }

    #[test]
    fn keeps_only_the_sliding_window() {
        let observations: Vec<_> = (0..10).map(|i| obs("study", i, &["x"])).collect();
        let snap = build(&observations, 5);
        assert_eq!(snap.intents["study"].total_observations, 5);
    }
}
