use super::*;
use crate::talk::ChangeKind;

fn event(talk_id: &str, version: u64) -> ChangeEvent {
    ChangeEvent {
        kind: ChangeKind::Updated,
        talk_id: talk_id.to_string(),
        talk_version: version,
        change_id: format!("c{version}"),
        timestamp: 0,
        last_modified_by: None,
    }
}

#[tokio::test]
async fn test_publish_subscribe() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();

    bus.publish(event("t1", 2));

    let received = rx.recv().await.unwrap();
    assert_eq!(received.talk_id, "t1");
    assert_eq!(received.talk_version, 2);
}

#[tokio::test]
async fn test_multiple_subscribers() {
    let bus = EventBus::new(16);
    let mut rx1 = bus.subscribe();
    let mut rx2 = bus.subscribe();

    assert_eq!(bus.subscriber_count(), 2);

    let count = bus.publish(event("t1", 3));
    assert_eq!(count, 2);

    let e1 = rx1.recv().await.unwrap();
    let e2 = rx2.recv().await.unwrap();
    assert_eq!(e1.talk_version, 3);
    assert_eq!(e2.talk_version, 3);
}

#[test]
fn test_event_serialization() {
    let e = event("t1", 1);
    let json = serde_json::to_string(&e).unwrap();
    assert!(json.contains("\"type\":\"updated\""));
    assert!(json.contains("\"talk_id\":\"t1\""));
}
