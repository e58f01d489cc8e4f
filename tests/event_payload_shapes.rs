use feedpulse::broker::events::{new_event_id, CommentAction, CommentEvent, LikeAction, LikeEvent, PopularityEvent};

#[test]
fn like_event_serializes_with_documented_field_names() {
    let event = LikeEvent {
        event_id: new_event_id(),
        action: LikeAction::Like,
        user_id: 7,
        video_id: 42,
        occurred_at: chrono::Utc::now(),
    };
    let json: serde_json::Value = serde_json::to_value(&event).unwrap();
    for field in ["event_id", "action", "user_id", "video_id", "occurred_at"] {
        assert!(json.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(json["action"], "like");
}

#[test]
fn comment_event_serializes_optional_fields_as_documented() {
    let event = CommentEvent {
        event_id: new_event_id(),
        action: CommentAction::Publish,
        comment_id: Some(1),
        username: Some("alice".to_string()),
        video_id: Some(42),
        author_id: Some(9),
        content: Some("nice video".to_string()),
        occurred_at: chrono::Utc::now(),
    };
    let json: serde_json::Value = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "publish");
    assert_eq!(json["video_id"], 42);
    assert_eq!(json["content"], "nice video");
}

#[test]
fn popularity_event_amount_is_signed() {
    let event = PopularityEvent::update(42, -1, chrono::Utc::now());
    let json: serde_json::Value = serde_json::to_value(&event).unwrap();
    assert_eq!(json["amount"], -1);
    assert_eq!(json["action"], "update");
}

#[test]
fn event_ids_are_unique_across_calls() {
    let a = new_event_id();
    let b = new_event_id();
    assert_ne!(a, b);
    assert_eq!(a.len(), 32);
}
