//! Error types for clawtalk-channels

use thiserror::Error;

/// Channel error type
#[derive(Debug, Error)]
pub enum Error {
    /// Slack request failed signature verification
    #[error("slack signature verification failed: {0}")]
    Signature(String),

    /// Forwarding the event to the host webhook failed after retries
    #[error("forward to host failed: {0}")]
    Forward(String),

    /// Slack Web API call failed
    #[error("slack api error: {0}")]
    Slack(String),

    /// Malformed inbound payload
    #[error("malformed slack payload: {0}")]
    Payload(String),

    /// Underlying core error
    #[error("core error: {0}")]
    Core(#[from] clawtalk_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
