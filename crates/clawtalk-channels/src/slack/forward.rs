//! Forwarding raw Slack payloads to the host webhook (§4.4 "Forwarding",
//! B4). Fire-and-forget from the caller's perspective: Slack's ack never
//! waits on this.

use tracing::{info, warn};

const MAX_RETRIES: u32 = 2;
const BASE_DELAY_MS: u64 = 500;

/// POST `body` to `url`, preserving the three Slack headers the host needs
/// to perform its own signature check. Retries up to [`MAX_RETRIES`] times
/// on a transport error or 5xx, with linear backoff (`attempt * 500ms`).
pub async fn forward_to_host(
    client: &reqwest::Client,
    url: &str,
    content_type: Option<&str>,
    slack_signature: Option<&str>,
    slack_timestamp: Option<&str>,
    body: &[u8],
) -> bool {
    for attempt in 0..=MAX_RETRIES {
        let mut request = client.post(url).body(body.to_vec());
        if let Some(ct) = content_type {
            request = request.header("content-type", ct);
        }
        if let Some(sig) = slack_signature {
            request = request.header("x-slack-signature", sig);
        }
        if let Some(ts) = slack_timestamp {
            request = request.header("x-slack-request-timestamp", ts);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                if attempt > 0 {
                    info!(attempt, "forward to host succeeded after retry");
                }
                return true;
            }
            Ok(response) if response.status().is_server_error() && attempt < MAX_RETRIES => {
                warn!(attempt, status = %response.status(), "forward to host got 5xx, retrying");
            }
            Ok(response) => {
                warn!(attempt, status = %response.status(), "forward to host failed, giving up");
                return false;
            }
            Err(e) if attempt < MAX_RETRIES => {
                warn!(attempt, error = %e, "forward to host transport error, retrying");
            }
            Err(e) => {
                warn!(attempt, error = %e, "forward to host transport error, giving up");
                return false;
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(
            BASE_DELAY_MS * (attempt as u64 + 1),
        ))
        .await;
    }
    false
}
