pub mod events;
pub mod message;

pub use events::{EventBus, RealtimeEvent, RealtimeEventKind, RealtimeMessageData};
pub use message::{Attachment, Conversation, Message, MessageKind, SessionRecord, Tag};
