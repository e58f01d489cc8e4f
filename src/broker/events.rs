use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mints a 128-bit random hex `event_id`, independent of any entity id so
/// that duplicate detection at the consumer (where applicable) never
/// collides with business data.
pub fn new_event_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeAction {
    Like,
    Unlike,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeEvent {
    pub event_id: String,
    pub action: LikeAction,
    pub user_id: u64,
    pub video_id: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentAction {
    Publish,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentEvent {
    pub event_id: String,
    pub action: CommentAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularityEvent {
    pub event_id: String,
    pub action: String,
    pub video_id: u64,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

impl PopularityEvent {
    pub fn update(video_id: u64, amount: i64, occurred_at: DateTime<Utc>) -> Self {
        PopularityEvent {
            event_id: new_event_id(),
            action: "update".to_string(),
            video_id,
            amount,
            occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_event_round_trips_through_json() {
        let ev = LikeEvent {
            event_id: new_event_id(),
            action: LikeAction::Like,
            user_id: 7,
            video_id: 42,
            occurred_at: Utc::now(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: LikeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.video_id, 42);
        assert_eq!(back.user_id, 7);
    }

    #[test]
    fn comment_event_omits_absent_optionals() {
        let ev = CommentEvent {
            event_id: new_event_id(),
            action: CommentAction::Delete,
            comment_id: Some(9),
            username: None,
            video_id: None,
            author_id: None,
            content: None,
            occurred_at: Utc::now(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(!json.contains("username"));
        assert!(json.contains("comment_id"));
    }

    #[test]
    fn popularity_update_has_fixed_action() {
        let ev = PopularityEvent::update(1, -1, Utc::now());
        assert_eq!(ev.action, "update");
        assert_eq!(ev.amount, -1);
    }
}
