//! RoutingHeaderGuard (C9): pure assertion enforcing execution-mode header
//! invariants on outbound requests to the host.

use std::collections::HashMap;
use thiserror::Error;

use crate::talk::ExecutionMode;

/// The lane issuing an outbound request, carried for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    TalkChat,
    SlackIngress,
    JobScheduler,
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TalkChat => write!(f, "talk-chat"),
            Self::SlackIngress => write!(f, "slack-ingress"),
            Self::JobScheduler => write!(f, "job-scheduler"),
        }
    }
}

/// Violation of the `full_control` header invariants (P6).
#[derive(Debug, Error)]
pub enum RoutingGuardError {
    #[error("ROUTING_GUARD_FORBIDDEN_AGENT_HEADER: flow={flow} mode=full_control forbids x-openclaw-agent-id")]
    ForbiddenAgentHeader { flow: Flow },

    #[error("ROUTING_GUARD_FORBIDDEN_SESSION_KEY: flow={flow} mode=full_control forbids agent:-prefixed x-openclaw-session-key")]
    ForbiddenSessionKey { flow: Flow },
}

impl RoutingGuardError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ForbiddenAgentHeader { .. } => "ROUTING_GUARD_FORBIDDEN_AGENT_HEADER",
            Self::ForbiddenSessionKey { .. } => "ROUTING_GUARD_FORBIDDEN_SESSION_KEY",
        }
    }
}

/// Assert that `headers` are safe to send for the given flow and execution
/// mode. Never auto-strips a forbidden header — the caller must fix the
/// request and retry (§7 "Guard violation").
pub fn assert_routing_headers(
    flow: Flow,
    execution_mode: ExecutionMode,
    headers: &HashMap<String, String>,
) -> Result<(), RoutingGuardError> {
    if execution_mode != ExecutionMode::FullControl {
        return Ok(());
    }

    if headers.contains_key("x-openclaw-agent-id") {
        return Err(RoutingGuardError::ForbiddenAgentHeader { flow });
    }

    if let Some(session_key) = headers.get("x-openclaw-session-key") {
        if session_key.starts_with("agent:") {
            return Err(RoutingGuardError::ForbiddenSessionKey { flow });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn s4_forbidden_agent_header() {
        let h = headers(&[("x-openclaw-agent-id", "a1")]);
        let err = assert_routing_headers(Flow::TalkChat, ExecutionMode::FullControl, &h)
            .expect_err("should reject");
        assert_eq!(err.code(), "ROUTING_GUARD_FORBIDDEN_AGENT_HEADER");
    }

    #[test]
    fn s4_forbidden_session_key() {
        let h = headers(&[("x-openclaw-session-key", "agent:main:foo")]);
        let err = assert_routing_headers(Flow::TalkChat, ExecutionMode::FullControl, &h)
            .expect_err("should reject");
        assert_eq!(err.code(), "ROUTING_GUARD_FORBIDDEN_SESSION_KEY");
    }

    #[test]
    fn s4_talk_prefixed_session_key_allowed() {
        let h = headers(&[(
            "x-openclaw-session-key",
            "talk:clawtalk:talk:abc:slack:channel:C123",
        )]);
        assert!(assert_routing_headers(Flow::TalkChat, ExecutionMode::FullControl, &h).is_ok());
    }

    #[test]
    fn openclaw_mode_allows_agent_headers() {
        let h = headers(&[("x-openclaw-agent-id", "a1")]);
        assert!(assert_routing_headers(Flow::SlackIngress, ExecutionMode::Openclaw, &h).is_ok());
    }

    #[test]
    fn job_prefixed_session_key_allowed() {
        let h = headers(&[("x-openclaw-session-key", "job:nightly-digest")]);
        assert!(assert_routing_headers(Flow::JobScheduler, ExecutionMode::FullControl, &h).is_ok());
    }
}
