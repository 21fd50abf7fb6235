//! Validating normalizers applied to every Talk loaded from disk.
//!
//! The source accepts loosely shaped JSON for bindings, behaviors, jobs,
//! and tool-name lists. Rather than trust upstream shapes at call sites,
//! every enum and list is pushed through one of these normalizers, each of
//! which maps unknown input to a documented default and is idempotent:
//! `normalize(normalize(x)) == normalize(x)` for every enum (P4).

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::model::{ExecutionMode, FilesystemAccess, NetworkAccess, ToolMode};

fn tool_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap())
}

fn talk_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap())
}

/// Returns `true` if `id` is path-safe per the Talk id contract.
pub fn is_valid_talk_id(id: &str) -> bool {
    !id.is_empty() && talk_id_re().is_match(id)
}

/// Parse an execution-mode string, migrating legacy values.
///
/// `unsandboxed` → `full_control`; `sandboxed`/`inherit` → `openclaw`;
/// anything else unrecognized falls back to the documented default
/// (`openclaw`).
pub fn normalize_execution_mode(raw: &str) -> ExecutionMode {
    match raw.to_ascii_lowercase().as_str() {
        "full_control" | "unsandboxed" => ExecutionMode::FullControl,
        "openclaw" | "sandboxed" | "inherit" => ExecutionMode::Openclaw,
        _ => ExecutionMode::Openclaw,
    }
}

pub fn normalize_filesystem_access(raw: &str) -> FilesystemAccess {
    match raw.to_ascii_lowercase().as_str() {
        "full_host_access" => FilesystemAccess::FullHostAccess,
        _ => FilesystemAccess::WorkspaceSandbox,
    }
}

pub fn normalize_network_access(raw: &str) -> NetworkAccess {
    match raw.to_ascii_lowercase().as_str() {
        "full_outbound" => NetworkAccess::FullOutbound,
        _ => NetworkAccess::Restricted,
    }
}

pub fn normalize_tool_mode(raw: &str) -> ToolMode {
    match raw.to_ascii_lowercase().as_str() {
        "off" => ToolMode::Off,
        "auto" => ToolMode::Auto,
        _ => ToolMode::Confirm,
    }
}

/// Filter a tool-name list by the validating regex and deduplicate
/// case-insensitively, preserving first-seen order.
pub fn normalize_tool_names(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in raw {
        if !tool_name_re().is_match(name) {
            continue;
        }
        let key = name.to_ascii_lowercase();
        if seen.insert(key) {
            out.push(name.clone());
        }
    }
    out
}

/// Canonicalize a Slack scope string to lowercase, normalizing
/// `channel:<ID>` / `user:<ID>` to `kind:lowercased-id`.
pub fn canonicalize_slack_scope(scope: &str) -> String {
    let lower = scope.trim().to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("channel:") {
        return format!("channel:{}", rest.to_ascii_lowercase());
    }
    if let Some(rest) = lower.strip_prefix("user:") {
        return format!("user:{}", rest.to_ascii_lowercase());
    }
    lower
}
