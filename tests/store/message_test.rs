//! Tests for the `Message` wire shape.

use receiver::store::{Message, NewMessage};
use serde_json::json;

#[test]
fn message_serializes_as_flat_object() {
    let message = Message {
        id: 1,
        recipient: Some("alice".to_owned()),
        source: 7,
        status: "new".to_owned(),
        body: Some("hello".to_owned()),
    };

    let value = serde_json::to_value(&message).expect("serialize");

    assert_eq!(
        value,
        json!({"id": 1, "recipient": "alice", "source": 7, "status": "new", "body": "hello"})
    );
}

#[test]
fn message_json_round_trip_preserves_all_fields() {
    let message = Message {
        id: 9_007_199_254_740_993,
        recipient: None,
        source: -4,
        status: "new".to_owned(),
        body: Some("line one\nline \"two\" ✓".to_owned()),
    };

    let text = serde_json::to_string(&message).expect("serialize");
    let back: Message = serde_json::from_str(&text).expect("deserialize");

    assert_eq!(back, message);
}

#[test]
fn routing_key_is_decimal_source() {
    let message = Message {
        id: 3,
        recipient: None,
        source: 1234,
        status: "new".to_owned(),
        body: None,
    };

    assert_eq!(message.routing_key(), "1234");
}

#[test]
fn new_message_fields_are_optional() {
    let parsed: NewMessage = serde_json::from_str("{}").expect("empty object");
    assert_eq!(parsed, NewMessage::default());

    let parsed: NewMessage =
        serde_json::from_str(r#"{"source": 7, "extra": true}"#).expect("unknown fields ignored");
    assert_eq!(parsed.source, Some(7));
    assert!(parsed.recipient.is_none());
}
