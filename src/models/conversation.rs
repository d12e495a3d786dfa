use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::BookingSession;

/// How long an idle conversation (and its booking session) survives.
const CONVERSATION_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// One chat-widget conversation: transcript plus the booking session the
/// reducer threads through it. Expired rows are lazily cleaned up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub business_id: String,
    pub messages: Vec<ChatMessage>,
    pub session: BookingSession,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl Conversation {
    pub fn new(id: &str, business_id: &str) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: id.to_string(),
            business_id: business_id.to_string(),
            messages: vec![],
            session: BookingSession::Idle,
            last_activity: now,
            expires_at: now + Duration::minutes(CONVERSATION_TTL_MINUTES),
        }
    }

    /// Slide the expiry window after activity.
    pub fn touch(&mut self) {
        let now = Utc::now().naive_utc();
        self.last_activity = now;
        self.expires_at = now + Duration::minutes(CONVERSATION_TTL_MINUTES);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_starts_idle() {
        let conv = Conversation::new("c1", "default");
        assert_eq!(conv.session, BookingSession::Idle);
        assert!(conv.messages.is_empty());
        assert!(conv.expires_at > conv.last_activity);
    }

    #[test]
    fn test_touch_slides_expiry() {
        let mut conv = Conversation::new("c1", "default");
        let old_expiry = conv.expires_at;
        conv.touch();
        assert!(conv.expires_at >= old_expiry);
    }
}
