//! Job scheduling: the tick-driven `JobScheduler` (C7), the host-hook-driven
//! `EventDispatcher` (C6), and the executor/policy/locking machinery they
//! share.

mod delivery;
mod dispatcher;
mod due;
mod engine;
mod executor;
mod locks;
mod policy;
mod types;

pub use delivery::SlackSender;
pub use dispatcher::{EventDispatcher, HostEvent, ReplyCallback};
pub use due::{is_due, parse_event_trigger};
pub use engine::JobScheduler;
pub use executor::JobExecutor;
pub use locks::TalkLocks;
pub use policy::compute_policy_allowed_tools;
pub use types::{
    HostRunRequest, RunSource, SchedulerConfig, SchedulerError, TriggerContext,
};
