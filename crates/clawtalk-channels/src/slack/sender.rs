//! Outbound Slack delivery (§4.7 step 8): implements `clawtalk_core`'s
//! `SlackSender` trait with slack-morphism's `chat.postMessage`.
//!
//! Grounded in the teacher's `SlackAdapter::send_message`, generalized to
//! pick the bot token for the account the job's Talk binding names.

use async_trait::async_trait;
use slack_morphism::prelude::*;

use clawtalk_core::scheduler::{SchedulerError, SlackSender};

use super::config::SlackChannelsConfig;

pub struct SlackSenderImpl {
    config: SlackChannelsConfig,
}

impl SlackSenderImpl {
    pub fn new(config: SlackChannelsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SlackSender for SlackSenderImpl {
    async fn send_message(
        &self,
        account_id: Option<&str>,
        channel_id: &str,
        thread_ts: Option<&str>,
        message: &str,
    ) -> Result<(), SchedulerError> {
        let token = self
            .config
            .bot_token_for(account_id)
            .ok_or_else(|| SchedulerError::Delivery(format!("no bot token for account {account_id:?}")))?;

        let connector = SlackClientHyperConnector::new()
            .map_err(|e| SchedulerError::Delivery(format!("failed to create http connector: {e}")))?;
        let client = SlackClient::new(connector);
        let session = client.open_session(&SlackApiToken::new(token.into()));

        let content = SlackMessageContent::new().with_text(message.to_string());
        let mut request = SlackApiChatPostMessageRequest::new(channel_id.into(), content);
        if let Some(ts) = thread_ts {
            request = request.with_thread_ts(ts.to_string().into());
        }

        session
            .chat_post_message(&request)
            .await
            .map_err(|e| SchedulerError::Delivery(format!("chat.postMessage failed: {e}")))?;

        Ok(())
    }
}
