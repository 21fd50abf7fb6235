//! Loosely-shaped Slack webhook payloads, parsed defensively (§9 "Dynamic
//! object shapes → validating parsers"): nothing here trusts the upstream
//! JSON beyond what it needs for dispatch.

use serde_json::Value;

/// The three payload shapes the proxy distinguishes (§4.4 "Payload dispatch").
pub enum Payload {
    UrlVerification { challenge: String },
    EventCallback { event_id: Option<String>, team_id: Option<String>, event: Value },
    Other(Value),
}

pub fn parse_payload(raw: &[u8]) -> Option<Payload> {
    let value: Value = serde_json::from_slice(raw).ok()?;
    match value.get("type").and_then(Value::as_str) {
        Some("url_verification") => {
            let challenge = value.get("challenge")?.as_str()?.to_string();
            Some(Payload::UrlVerification { challenge })
        }
        Some("event_callback") => {
            let event = value.get("event")?.clone();
            Some(Payload::EventCallback {
                event_id: value.get("event_id").and_then(Value::as_str).map(str::to_string),
                team_id: value.get("team_id").and_then(Value::as_str).map(str::to_string),
                event,
            })
        }
        _ => Some(Payload::Other(value)),
    }
}

/// `bot_id` set or `subtype == "bot_message"` (B3).
pub fn is_bot_message(event: &Value) -> bool {
    event.get("bot_id").and_then(Value::as_str).is_some()
        || event.get("subtype").and_then(Value::as_str) == Some("bot_message")
}

pub fn is_message_like(event: &Value) -> bool {
    matches!(
        event.get("type").and_then(Value::as_str),
        Some("message") | Some("app_mention")
    )
}

fn text_of(event: &Value) -> String {
    event.get("text").and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Project a raw Slack `message`/`app_mention` event into the core's
/// [`clawtalk_core::SlackEvent`] resolver input.
pub fn to_routing_event(
    account_id: Option<String>,
    event_id: Option<String>,
    event: &Value,
) -> Option<clawtalk_core::SlackEvent> {
    let channel_id = event.get("channel").and_then(Value::as_str)?.to_string();
    Some(clawtalk_core::SlackEvent {
        event_id,
        account_id,
        channel_id,
        channel_name: None,
        thread_ts: event.get("thread_ts").and_then(Value::as_str).map(str::to_string),
        message_ts: event.get("ts").and_then(Value::as_str).map(str::to_string),
        user_id: event.get("user").and_then(Value::as_str).map(str::to_string),
        user_name: None,
        outbound_target: None,
        text: text_of(event),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn b1_url_verification_parses_challenge() {
        let raw = json!({"type": "url_verification", "challenge": "abc123"}).to_string();
        match parse_payload(raw.as_bytes()) {
            Some(Payload::UrlVerification { challenge }) => assert_eq!(challenge, "abc123"),
            _ => panic!("expected url_verification"),
        }
    }

    #[test]
    fn b3_bot_message_detected() {
        let event = json!({"type": "message", "bot_id": "B1", "channel": "C1"});
        assert!(is_bot_message(&event));
        let event2 = json!({"type": "message", "subtype": "bot_message", "channel": "C1"});
        assert!(is_bot_message(&event2));
        let event3 = json!({"type": "message", "channel": "C1"});
        assert!(!is_bot_message(&event3));
    }

    #[test]
    fn event_callback_parses_nested_event() {
        let raw = json!({
            "type": "event_callback",
            "event_id": "e1",
            "team_id": "T1",
            "event": {"type": "message", "channel": "C1", "text": "hi", "user": "U1", "ts": "1.1"}
        })
        .to_string();
        match parse_payload(raw.as_bytes()) {
            Some(Payload::EventCallback { event_id, team_id, event }) => {
                assert_eq!(event_id.as_deref(), Some("e1"));
                assert_eq!(team_id.as_deref(), Some("T1"));
                assert!(is_message_like(&event));
            }
            _ => panic!("expected event_callback"),
        }
    }
}
