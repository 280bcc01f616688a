//! Opaque pagination watermark.
//!
//! A cursor encodes the `(timestamp, id)` position of the oldest row already
//! handed out, so the next page admits only rows strictly before it in
//! `(timestamp desc, id desc)` order. The token is base64url-of-JSON and
//! decoding is deliberately forgiving: a corrupted or stale token degrades to
//! "start of history" instead of failing the caller.

use crate::types::message::Message;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCursor {
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub id: String,
}

impl MessageCursor {
    pub fn new(timestamp: i64, id: impl Into<String>) -> Self {
        Self {
            timestamp,
            id: id.into(),
        }
    }

    pub fn for_message(message: &Message) -> Self {
        Self::new(message.timestamp_millis(), message.id.clone())
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(self).unwrap_or_default())
    }

    /// `None` for any token that does not decode to a cursor; the caller
    /// restarts from the newest message rather than erroring.
    pub fn decode(token: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Whether a row at `(timestamp, id)` lies strictly before this cursor in
    /// `(timestamp desc, id desc)` order. A row equal to the cursor is never
    /// admitted.
    pub fn admits(&self, timestamp: i64, id: &str) -> bool {
        timestamp < self.timestamp || (timestamp == self.timestamp && id < self.id.as_str())
    }
}
