use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Audio,
    Image,
    Video,
    File,
}

impl MessageKind {
    pub fn is_media(&self) -> bool {
        !matches!(self, MessageKind::Text)
    }
}

/// Reference to an uploaded media object. `duration_secs` is only present for
/// audio/video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

/// One entry of a conversation's message list.
///
/// Optimistic sends start life with `pending == true` and a client-generated
/// `temp_id` (doubling as the provisional `id`); both are replaced by the
/// canonical server identity when the echo reconciles. `placeholder` marks
/// rows the server materializes as conversation padding; they are dropped
/// from pages unless they carry displayable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from_me: bool,
    pub kind: MessageKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub temp_id: Option<String>,
    #[serde(default)]
    pub placeholder: bool,
}

impl Message {
    /// Locally-created message awaiting its server echo.
    pub fn optimistic(kind: MessageKind, text: impl Into<String>, attachment: Option<Attachment>) -> Self {
        let temp_id = new_temp_id();
        Self {
            id: temp_id.clone(),
            from_me: true,
            kind,
            text: text.into(),
            timestamp: Some(Utc::now()),
            attachment,
            pending: true,
            temp_id: Some(temp_id),
            placeholder: false,
        }
    }

    pub fn is_displayable(&self) -> bool {
        !self.text.trim().is_empty() || self.attachment.is_some() || self.kind.is_media()
    }

    /// Millisecond position on the pagination axis; rows without a timestamp
    /// sort to the beginning of history.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.map(|t| t.timestamp_millis()).unwrap_or(0)
    }
}

pub fn new_temp_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("temp_{suffix}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participant_id: String,
    #[serde(default)]
    pub participant_name: Option<String>,
    #[serde(default)]
    pub last_message_text: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub connected_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}
