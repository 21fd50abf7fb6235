//! Ambient utilities shared by the rest of the crate.
//!
//! - retry: bounded retry with exponential backoff, used by outbound I/O
//!   (host LLM calls, Slack forwarding) that can hit transient failures.

mod retry;

pub use retry::{retry_with_backoff, RetryConfig, RetryError};
