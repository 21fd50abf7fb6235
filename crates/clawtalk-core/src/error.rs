//! Error types for clawtalk-core

use thiserror::Error;

/// Top-level error type.
///
/// Each module owns its own `thiserror` enum scoped to its failure modes
/// (`TalkStoreError`, `RoutingGuardError`, `SchedulerError`, ...); this type
/// composes them via `#[from]` so callers outside the crate can use a single
/// `Result` alias. `anyhow` is reserved for the process boundary (the
/// `clawtalk` binary), never used inside this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Talk store read/write/validation failure
    #[error("talk store error: {0}")]
    TalkStore(#[from] crate::store::TalkStoreError),

    /// Outbound request violates the execution-mode header invariants
    #[error("routing guard error: {0}")]
    RoutingGuard(#[from] crate::routing::RoutingGuardError),

    /// Scheduler or job-execution failure
    #[error("scheduler error: {0}")]
    Scheduler(#[from] crate::scheduler::SchedulerError),

    /// Rejected input that never reached persistence
    #[error("validation error: {0}")]
    Validation(String),

    /// Anything else, usually a bug surface rather than an expected failure mode
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
