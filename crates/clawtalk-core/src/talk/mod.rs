//! The Talk data model and its loose-JSON normalizers.

mod model;
mod normalize;

pub use model::{
    AffinityObservation, Behavior, Binding, ChangeEvent, ChangeKind, DeliveryMode, Directive,
    ExecutionMode, FilesystemAccess, Job, JobOutputDestination, JobReport, JobStatus, JobType,
    MessageRole, MirrorToTalk, NetworkAccess, Permission, ResponseMode, ResponsePolicy, Talk,
    TalkAgent, TalkMessage, ToolMode, TriggerPolicy,
};
pub use normalize::{
    canonicalize_slack_scope, is_valid_talk_id, normalize_execution_mode,
    normalize_filesystem_access, normalize_network_access, normalize_tool_mode,
    normalize_tool_names,
};

impl Talk {
    /// Drop any Behavior whose `platform_binding_id` no longer resolves to a
    /// Binding on this Talk (I1), and apply the field-level normalizers to
    /// every enum and tool-name list (§4.1 "Normalization on load").
    pub fn normalize_in_place(&mut self) {
        let binding_ids: std::collections::HashSet<&str> =
            self.platform_bindings.iter().map(|b| b.id.as_str()).collect();
        self.platform_behaviors
            .retain(|b| binding_ids.contains(b.platform_binding_id.as_str()));

        self.tools_allow = normalize_tool_names(&self.tools_allow);
        self.tools_deny = normalize_tool_names(&self.tools_deny);

        // Dangling pins (I2): drop ids that point at nothing. The store
        // reconciles this precisely against the message log; here we only
        // guarantee the invariant holds for an empty/partial in-memory view.
        self.pinned_message_ids.dedup();
    }
}
