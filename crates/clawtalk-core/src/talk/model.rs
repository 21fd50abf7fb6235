//! The Talk data model: the unit of conversational state the gateway owns.

use serde::{Deserialize, Serialize};

/// Execution mode governing how requests for a Talk reach the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Requests flow through a host-managed agent (`agent:` session-key prefix).
    Openclaw,
    /// Transparent LLM proxy; `agent:` session-key prefix is forbidden.
    FullControl,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Openclaw
    }
}

/// Filesystem access scope for a Talk's managed agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilesystemAccess {
    WorkspaceSandbox,
    FullHostAccess,
}

impl Default for FilesystemAccess {
    fn default() -> Self {
        Self::WorkspaceSandbox
    }
}

/// Network access scope for a Talk's managed agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkAccess {
    Restricted,
    FullOutbound,
}

impl Default for NetworkAccess {
    fn default() -> Self {
        Self::Restricted
    }
}

/// Tool invocation confirmation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    Off,
    Confirm,
    Auto,
}

impl Default for ToolMode {
    fn default() -> Self {
        Self::Confirm
    }
}

/// Read/write permission carried by a [`Binding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    #[serde(rename = "read+write")]
    ReadWrite,
}

impl Permission {
    pub fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// A platform attachment: this Talk is bound to a (platform, scope, account) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub id: String,
    pub platform: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_scope: Option<String>,
    pub permission: Permission,
    pub created_at: i64,
}

/// Response mode for an incoming message on a bound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Off,
    Mentions,
    All,
}

/// How inbound/outbound traffic on a binding mirrors into the Talk history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorToTalk {
    Off,
    Inbound,
    Full,
}

impl MirrorToTalk {
    pub fn mirrors_inbound(self) -> bool {
        matches!(self, Self::Inbound | Self::Full)
    }
}

/// Where a reply is delivered relative to the triggering message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Thread,
    Channel,
    Adaptive,
}

/// Gate on which intents are allowed to trigger a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    Judgment,
    StudyEntriesOnly,
    AdviceOrStudy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePolicy {
    #[serde(default)]
    pub trigger_policy: Option<TriggerPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_senders: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
}

/// Per-binding policy: response mode, mirroring, triggers, delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    pub id: String,
    pub platform_binding_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<ResponseMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_to_talk: Option<MirrorToTalk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_message_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<DeliveryMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_policy: Option<ResponsePolicy>,
}

/// A named agent participating in a Talk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkAgent {
    pub name: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

/// A standing instruction injected into the Talk's system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub id: String,
    pub text: String,
    pub active: bool,
    pub created_at: i64,
}

/// Job cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Once,
    Recurring,
    Event,
}

/// Where a job's full output is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobOutputDestination {
    ReportOnly,
    Talk,
    Slack {
        channel_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_ts: Option<String>,
    },
}

/// Outcome of the most recent run of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failure,
    Skipped,
}

/// A cron / one-shot / event-triggered Talk-scoped job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    /// Cron expression for `recurring`, ISO timestamp or cron for `once`,
    /// `"on <scope>"` for `event`.
    pub schedule: String,
    pub prompt: String,
    pub output: JobOutputDestination,
    pub active: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<JobStatus>,
}

/// A role in a Talk's message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One entry in a Talk's append-only message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
}

/// One entry in a Talk's append-only job-report log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub run_at: i64,
    pub status: JobStatus,
    pub full_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One observation of tool usage for a given Talk/intent, feeding the
/// tool-affinity learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityObservation {
    pub timestamp: i64,
    pub intent: String,
    pub available_tools: Vec<String>,
    pub used_tools: Vec<String>,
    pub tools_offered: Vec<String>,
    pub model: String,
    pub source: String,
}

/// The top-level Talk record persisted as `talk.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Talk {
    pub id: String,
    pub talk_version: u64,
    pub change_id: String,
    pub last_modified_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,

    #[serde(default)]
    pub topic_title: String,
    #[serde(default)]
    pub objective: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_auth_profile: Option<String>,

    #[serde(default)]
    pub agents: Vec<TalkAgent>,
    #[serde(default)]
    pub pinned_message_ids: Vec<String>,
    #[serde(default)]
    pub directives: Vec<Directive>,
    #[serde(default)]
    pub platform_bindings: Vec<Binding>,
    #[serde(default)]
    pub platform_behaviors: Vec<Behavior>,
    #[serde(default)]
    pub jobs: Vec<Job>,

    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub filesystem_access: FilesystemAccess,
    #[serde(default)]
    pub network_access: NetworkAccess,
    #[serde(default)]
    pub tool_mode: ToolMode,
    #[serde(default)]
    pub tools_allow: Vec<String>,
    #[serde(default)]
    pub tools_deny: Vec<String>,

    #[serde(default)]
    pub processing: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Talk {
    /// A fresh Talk, as returned by `TalkStore::create`.
    pub fn new(id: String, model: String, now_ms: i64, change_id: String) -> Self {
        Self {
            id,
            talk_version: 1,
            change_id,
            last_modified_at: now_ms,
            last_modified_by: None,
            topic_title: String::new(),
            objective: String::new(),
            model,
            google_auth_profile: None,
            agents: Vec::new(),
            pinned_message_ids: Vec::new(),
            directives: Vec::new(),
            platform_bindings: Vec::new(),
            platform_behaviors: Vec::new(),
            jobs: Vec::new(),
            execution_mode: ExecutionMode::default(),
            filesystem_access: FilesystemAccess::default(),
            network_access: NetworkAccess::default(),
            tool_mode: ToolMode::default(),
            tools_allow: Vec::new(),
            tools_deny: Vec::new(),
            processing: false,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }
}

/// A change-notification emitted by the store on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub talk_id: String,
    pub talk_version: u64,
    pub change_id: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    MessageAppended,
    MessagesDeleted,
}
