use crate::types::message::Conversation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeEventKind {
    NewMessage,
    MessageEcho,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeAttachment {
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

/// Payload of one realtime message event, as delivered by the server channel.
/// Optional fields stay optional here; mapping into a canonical [`Message`]
/// happens in the reconciliation helpers.
///
/// [`Message`]: crate::types::message::Message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeMessageData {
    pub sender_id: String,
    pub recipient_id: String,
    pub conversation_id: String,
    pub message_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<RealtimeAttachment>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub from_me: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub kind: RealtimeEventKind,
    pub timestamp: DateTime<Utc>,
    pub data: RealtimeMessageData,
}

impl RealtimeEvent {
    /// Whether this event describes something the local user sent, i.e. a
    /// candidate for optimistic-message reconciliation.
    pub fn is_outgoing(&self) -> bool {
        self.data
            .from_me
            .unwrap_or(self.kind == RealtimeEventKind::MessageEcho)
    }
}

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus: one broadcast channel per event type, consumed by
        /// both the UI and the cache/reconciliation logic.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    (new_message, Arc<RealtimeEvent>),
    (message_echo, Arc<RealtimeEvent>),
    (conversation_updated, Arc<Conversation>),
}

impl EventBus {
    /// Routes a raw realtime event to its channel. Send errors just mean no
    /// subscriber is currently listening.
    pub fn publish(&self, event: RealtimeEvent) {
        let event = Arc::new(event);
        let _ = match event.kind {
            RealtimeEventKind::NewMessage => self.new_message.send(event),
            RealtimeEventKind::MessageEcho => self.message_echo.send(event),
        };
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
