//! Optimistic-message reconciliation.
//!
//! When the local client sends a message it immediately inserts a pending
//! entry with a temporary id; the server later confirms the send by echoing a
//! canonical row on the realtime channel. This module matches echoes back to
//! their pending entries and merges the canonical identity over them. An
//! echo that matches nothing (sent from another session, or already
//! reconciled) is expected and leaves the list untouched.
//!
//! Text messages match on exact trimmed content. Media has no reliable
//! content-equality signal, so the match falls back to a timestamp window;
//! with several pending media messages of the same kind inside that window
//! the first in list order wins, a known limitation.

use crate::types::events::{RealtimeAttachment, RealtimeEvent};
use crate::types::message::{Attachment, Message, MessageKind};
use std::time::Duration;

pub const DEFAULT_MEDIA_MATCH_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub messages: Vec<Message>,
    /// Temporary id of the pending entry that was matched, if any.
    pub matched_temp_id: Option<String>,
}

/// Infers the message kind a realtime attachment describes, preferring the
/// declared mime type and falling back to the file extension.
pub fn kind_from_attachment(attachment: &RealtimeAttachment) -> MessageKind {
    if let Some(mime) = &attachment.mime_type {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("audio/") {
            return MessageKind::Audio;
        }
        if mime.starts_with("image/") {
            return MessageKind::Image;
        }
        if mime.starts_with("video/") {
            return MessageKind::Video;
        }
        return MessageKind::File;
    }

    let path = attachment
        .url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    for ext in [".mp3", ".ogg", ".wav", ".m4a", ".aac"] {
        if path.ends_with(ext) {
            return MessageKind::Audio;
        }
    }
    for ext in [".jpg", ".jpeg", ".png", ".gif", ".webp"] {
        if path.ends_with(ext) {
            return MessageKind::Image;
        }
    }
    for ext in [".mp4", ".mov", ".webm"] {
        if path.ends_with(ext) {
            return MessageKind::Video;
        }
    }
    MessageKind::File
}

/// Builds the canonical message a realtime event describes. Text events keep
/// their raw text; the kind of media events comes from attachment metadata.
pub fn canonical_from_event(event: &RealtimeEvent) -> Message {
    let data = &event.data;
    let attachment = data.attachments.first();
    let kind = attachment
        .map(kind_from_attachment)
        .unwrap_or(MessageKind::Text);

    Message {
        id: data.message_id.clone(),
        from_me: event.is_outgoing(),
        kind,
        text: data.text.clone().unwrap_or_default(),
        timestamp: data.timestamp.or(Some(event.timestamp)),
        attachment: attachment.map(|a| Attachment {
            url: a.url.clone(),
            mime_type: a.mime_type.clone(),
            duration_secs: a.duration_secs,
        }),
        pending: false,
        temp_id: None,
        placeholder: false,
    }
}

/// Merges one canonical echo into the message list. At most one pending
/// entry converts per call; no match returns the list unchanged.
pub fn reconcile_echo(
    messages: Vec<Message>,
    canonical: &Message,
    media_window: Duration,
) -> ReconcileOutcome {
    let Some(idx) = messages
        .iter()
        .position(|m| is_match(m, canonical, media_window))
    else {
        return ReconcileOutcome {
            messages,
            matched_temp_id: None,
        };
    };

    let mut messages = messages;
    let optimistic = messages.remove(idx);
    let matched_temp_id = optimistic
        .temp_id
        .clone()
        .or_else(|| Some(optimistic.id.clone()));

    if let Some(existing) = messages.iter_mut().find(|m| m.id == canonical.id) {
        // Duplicate echo delivery: the canonical row is already in the list.
        // Fold the optimistic entry's local fields into it instead of
        // re-inserting a second copy.
        fold_optimistic_into(existing, optimistic);
    } else {
        let mut merged = optimistic;
        merge_canonical_into(&mut merged, canonical);
        messages.insert(idx, merged);
    }

    ReconcileOutcome {
        messages,
        matched_temp_id,
    }
}

fn is_match(candidate: &Message, canonical: &Message, window: Duration) -> bool {
    if !candidate.pending || !candidate.from_me {
        return false;
    }
    if candidate.kind != canonical.kind {
        return false;
    }

    match canonical.kind {
        MessageKind::Text => {
            let sent = candidate.text.trim();
            let echoed = canonical.text.trim();
            !sent.is_empty() && sent == echoed
        }
        _ => match (candidate.timestamp, canonical.timestamp) {
            (Some(sent_at), Some(echoed_at)) => {
                let delta = (sent_at - echoed_at).num_milliseconds().unsigned_abs();
                delta <= window.as_millis() as u64
            }
            // No timestamp to compare on either side; accept rather than
            // strand the entry in pending forever.
            _ => true,
        },
    }
}

/// Canonical fields override the optimistic entry where present; everything
/// the server did not echo keeps its optimistic value.
fn merge_canonical_into(candidate: &mut Message, canonical: &Message) {
    candidate.id = canonical.id.clone();
    if canonical.timestamp.is_some() {
        candidate.timestamp = canonical.timestamp;
    }
    candidate.attachment = match (candidate.attachment.take(), canonical.attachment.clone()) {
        (Some(mut own), Some(echoed)) => {
            own.url = echoed.url;
            if echoed.mime_type.is_some() {
                own.mime_type = echoed.mime_type;
            }
            if echoed.duration_secs.is_some() {
                own.duration_secs = echoed.duration_secs;
            }
            Some(own)
        }
        (own, None) => own,
        (None, echoed) => echoed,
    };
    candidate.pending = false;
}

fn fold_optimistic_into(existing: &mut Message, optimistic: Message) {
    existing.pending = false;
    if existing.text.trim().is_empty() && !optimistic.text.trim().is_empty() {
        existing.text = optimistic.text;
    }
    if existing.timestamp.is_none() {
        existing.timestamp = optimistic.timestamp;
    }
    match (&mut existing.attachment, optimistic.attachment) {
        (Some(kept), Some(local)) => {
            if kept.duration_secs.is_none() {
                kept.duration_secs = local.duration_secs;
            }
            if kept.mime_type.is_none() {
                kept.mime_type = local.mime_type;
            }
        }
        (slot, local) => {
            if slot.is_none() {
                *slot = local;
            }
        }
    }
    if existing.temp_id.is_none() {
        existing.temp_id = optimistic.temp_id;
    }
}
