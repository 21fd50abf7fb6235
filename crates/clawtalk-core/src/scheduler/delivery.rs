//! Output delivery for a finished job run (§4.7 step 8).

use async_trait::async_trait;

use super::types::Result;

/// Sends a message to Slack on behalf of a finished job. Implemented by
/// `clawtalk-channels`, which owns the Slack Web API client; `clawtalk-core`
/// only depends on this trait so the scheduler never depends on a platform
/// adapter.
#[async_trait]
pub trait SlackSender: Send + Sync {
    async fn send_message(
        &self,
        account_id: Option<&str>,
        channel_id: &str,
        thread_ts: Option<&str>,
        message: &str,
    ) -> Result<()>;
}
