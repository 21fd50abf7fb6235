//! The warmup / exploration / learned phase machine and the adaptive
//! timeout/cold-start-baseline helpers (§4.8).

use super::snapshot::IntentStats;
use super::{is_cold_intent, EXPLORATION_RATE, MIN_AFFINITY_THRESHOLD, WARMUP_THRESHOLD};

/// Which regime selected the tool set for a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Warmup,
    Exploration,
    Learned,
}

/// Backend powering a Talk's working-state storage, used to compute the
/// cold-start tool baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackend {
    StreamStore,
    WorkspaceFiles,
}

pub(super) fn classify_phase(total_observations: u32, intent: &str, has_cold_start: bool) -> Phase {
    if total_observations < WARMUP_THRESHOLD && !is_cold_intent(intent) && !has_cold_start {
        return Phase::Warmup;
    }
    if rand::random::<u32>() % EXPLORATION_RATE == 0 {
        return Phase::Exploration;
    }
    Phase::Learned
}

pub(super) fn select_learned(
    stats: Option<&IntentStats>,
    policy_allowed: &[String],
    cold_start_baseline: Option<&[String]>,
    intent_is_cold: bool,
) -> Vec<String> {
    // "Data exists and covers the intent" requires at least WARMUP_THRESHOLD
    // observations; below that a lone `usedTools=[]` sample must not starve
    // the baseline (the death-spiral regression in §4.8).
    if let Some(stats) = stats {
        if stats.total_observations >= WARMUP_THRESHOLD {
            return policy_allowed
                .iter()
                .filter(|t| {
                    let count = stats
                        .tool_counts
                        .get(&t.to_ascii_lowercase())
                        .copied()
                        .unwrap_or(0);
                    (count as f64) / (stats.total_observations as f64) >= MIN_AFFINITY_THRESHOLD
                })
                .cloned()
                .collect();
        }
    }

    if let Some(baseline) = cold_start_baseline {
        return policy_allowed
            .iter()
            .filter(|t| baseline.iter().any(|b| b == *t))
            .cloned()
            .collect();
    }

    if intent_is_cold {
        return Vec::new();
    }

    // No data, no baseline, non-cold intent: fall back to warmup behavior.
    policy_allowed.to_vec()
}

/// The intersection of `policy_allowed_tools` with the `state_`-prefixed
/// tool family, or empty for `workspace_files` (§4.8).
pub fn compute_cold_start_baseline(
    state_backend: Option<StateBackend>,
    policy_allowed_tools: &[String],
) -> Vec<String> {
    match state_backend {
        Some(StateBackend::WorkspaceFiles) => Vec::new(),
        Some(StateBackend::StreamStore) | None => policy_allowed_tools
            .iter()
            .filter(|t| t.starts_with("state_"))
            .cloned()
            .collect(),
    }
}

/// `warmup`/`exploration` → `baseTimeoutMs`; `learned` → capped by
/// `minTimeoutMs` and scaled by tool count.
pub fn compute_affinity_timeout(
    phase: Phase,
    tool_count: usize,
    base_timeout_ms: u64,
    min_timeout_ms: Option<u64>,
) -> u64 {
    match phase {
        Phase::Warmup | Phase::Exploration => base_timeout_ms,
        Phase::Learned => {
            let scaled = 60_000 + 20_000 * tool_count as u64;
            let floor = min_timeout_ms.unwrap_or(0).max(scaled);
            base_timeout_ms.min(floor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn stats(total: u32, counts: &[(&str, u32)]) -> IntentStats {
        IntentStats {
            total_observations: total,
            no_tool_count: 0,
            tool_counts: counts.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn death_spiral_regression_baseline_wins_before_warmup_crossed() {
        let s = stats(1, &[]);
        let baseline = vec!["state_read".to_string()];
        let policy = vec!["state_read".to_string(), "web_search".to_string()];
        let selected = select_learned(Some(&s), &policy, Some(&baseline), false);
        assert_eq!(selected, vec!["state_read".to_string()]);
    }

    #[test]
    fn cold_start_baseline_used_when_no_observations_yet() {
        let baseline = vec!["state_read".to_string()];
        let policy = vec!["state_read".to_string(), "web_search".to_string()];
        let selected = select_learned(None, &policy, Some(&baseline), false);
        assert_eq!(selected, vec!["state_read".to_string()]);
    }

    #[test]
    fn cold_intent_with_no_data_and_no_baseline_selects_nothing() {
        let selected = select_learned(None, &["x".to_string()], None, true);
        assert!(selected.is_empty());
    }

    #[test]
    fn cold_start_baseline_excludes_workspace_files() {
        let policy = vec!["state_read".to_string()];
        assert!(compute_cold_start_baseline(Some(StateBackend::WorkspaceFiles), &policy).is_empty());
        assert_eq!(
            compute_cold_start_baseline(Some(StateBackend::StreamStore), &policy),
            policy
        );
    }

    #[test]
    fn learned_timeout_scales_with_tool_count() {
        let t = compute_affinity_timeout(Phase::Learned, 4, 300_000, None);
        assert_eq!(t, 140_000);
        let capped = compute_affinity_timeout(Phase::Learned, 4, 100_000, None);
        assert_eq!(capped, 100_000);
    }
}
