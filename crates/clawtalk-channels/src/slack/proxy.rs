//! SlackEventProxy (C4, §4.4): the HTTP surface Slack calls. Verifies the
//! request signature, acks fast, and fans the payload out to the dedup/
//! routing pipeline and the host forward — both fire-and-forget so Slack's
//! 3-second ack window is never at risk.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::{info, warn};

use clawtalk_core::dedup::event_id;
use clawtalk_core::EventDispatcher;

use super::config::SlackChannelsConfig;
use super::forward::forward_to_host;
use super::ingress::SlackIngress;
use super::types::{is_bot_message, is_message_like, parse_payload, to_routing_event, Payload};

const MAX_BODY_BYTES: usize = 512 * 1024;

/// Shared state the proxy handler closes over.
pub struct ProxyState {
    pub config: SlackChannelsConfig,
    pub http: reqwest::Client,
    pub ingress: Arc<SlackIngress>,
    pub dispatcher: Arc<EventDispatcher>,
}

pub fn routes(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/slack/events", post(handle_event))
        .layer(Extension(state))
}

async fn handle_event(
    Extension(state): Extension<Arc<ProxyState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if body.len() > MAX_BODY_BYTES {
        warn!(len = body.len(), "slack payload exceeds size cap, rejecting");
        return (StatusCode::PAYLOAD_TOO_LARGE, "payload too large").into_response();
    }

    let signature = headers.get("x-slack-signature").and_then(|v| v.to_str().ok());
    let timestamp = headers.get("x-slack-request-timestamp").and_then(|v| v.to_str().ok());
    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());

    let account_id = match (signature, timestamp) {
        (Some(sig), Some(ts)) => {
            let candidates = state.config.signing_secret_candidates();
            match super::signature::verify(&candidates, ts, &body, sig) {
                Ok(account_id) => Some(account_id),
                Err(e) => {
                    warn!(error = %e, "rejecting slack event: signature verification failed");
                    return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
                }
            }
        }
        _ => {
            warn!("rejecting slack event: missing signature headers");
            return (StatusCode::UNAUTHORIZED, "missing signature headers").into_response();
        }
    };

    let Some(payload) = parse_payload(&body) else {
        warn!("rejecting slack event: malformed json");
        return (StatusCode::BAD_REQUEST, "malformed payload").into_response();
    };

    match payload {
        // B1: url_verification is answered directly, never forwarded or
        // fanned out — it carries no user data.
        Payload::UrlVerification { challenge } => {
            Json(json!({ "challenge": challenge })).into_response()
        }

        Payload::EventCallback { event_id: slack_event_id, team_id: _, event } => {
            spawn_forward(&state, content_type, signature, timestamp, body.to_vec());

            if is_bot_message(&event) {
                return Json(json!({ "ok": true, "skipped": "bot_message" })).into_response();
            }

            if !is_message_like(&event) {
                return Json(json!({ "ok": true, "routed": "openclaw" })).into_response();
            }

            let Some(routing_event) = to_routing_event(account_id.clone(), slack_event_id, &event) else {
                warn!("slack message event missing channel id, skipping ingress");
                return Json(json!({ "ok": true, "routed": "openclaw" })).into_response();
            };

            let dedup_key = event_id(
                routing_event.account_id.as_deref(),
                &routing_event.channel_id,
                routing_event.message_ts.as_deref(),
                routing_event.thread_ts.as_deref(),
                routing_event.user_id.as_deref(),
            );

            let outcome = state.ingress.handle(&routing_event, &dedup_key).await;
            if outcome.duplicate {
                info!(dedup_key, "duplicate slack event, not re-dispatched");
                return Json(json!({ "ok": true, "duplicate": true })).into_response();
            }

            spawn_dispatch(&state, &routing_event);

            // The gateway never answers a Slack message itself, so an owner
            // Talk always means "delegated-to-agent" (see SlackIngress) —
            // `routed` is diagnostic, not a gate on whether the host replies.
            let routed = if outcome.decision.talk_id.is_some() { "clawtalk" } else { "openclaw" };
            Json(json!({ "ok": true, "routed": routed, "reason": outcome.decision.reason }))
                .into_response()
        }

        // Any other callback shape (reactions, rate-limit notices, etc.):
        // forward and ack, no domain processing.
        Payload::Other(_) => {
            spawn_forward(&state, content_type, signature, timestamp, body.to_vec());
            Json(json!({ "ok": true })).into_response()
        }
    }
}

fn spawn_forward(
    state: &Arc<ProxyState>,
    content_type: Option<&str>,
    signature: Option<&str>,
    timestamp: Option<&str>,
    body: Vec<u8>,
) {
    let state = state.clone();
    let content_type = content_type.map(str::to_string);
    let signature = signature.map(str::to_string);
    let timestamp = timestamp.map(str::to_string);
    let url = state.config.host_webhook_url(None);
    tokio::spawn(async move {
        let ok = forward_to_host(
            &state.http,
            &url,
            content_type.as_deref(),
            signature.as_deref(),
            timestamp.as_deref(),
            &body,
        )
        .await;
        if !ok {
            warn!(url, "giving up forwarding slack event to host after retries");
        }
    });
}

fn spawn_dispatch(state: &Arc<ProxyState>, event: &clawtalk_core::routing::SlackEvent) {
    let dispatcher = state.dispatcher.clone();
    let host_event = clawtalk_core::scheduler::HostEvent {
        platform: "slack".to_string(),
        scope: event.channel_id.clone(),
        from: event.user_name.clone().or_else(|| event.user_id.clone()),
        content: Some(event.text.clone()),
        can_reply: true,
    };
    tokio::spawn(async move {
        dispatcher.dispatch(host_event).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_body_bytes_matches_spec_cap() {
        assert_eq!(MAX_BODY_BYTES, 512 * 1024);
    }
}
