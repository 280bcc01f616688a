//! Typed namespaces over [`LayeredCache`], one durable partition each.
//!
//! These are the consumers the cache contract exists for: message lists per
//! conversation, conversation summaries, tag sets, and session records.

use crate::cache::layered::LayeredCache;
use crate::config::SyncConfig;
use crate::reconcile;
use crate::store::traits::{KvBackend, Partition};
use crate::types::events::RealtimeEvent;
use crate::types::message::{Conversation, Message, SessionRecord, Tag};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub fn messages_key(conversation_id: &str) -> String {
    format!("messages_{conversation_id}")
}

pub fn tags_key(owner_id: &str) -> String {
    format!("tags_{owner_id}")
}

pub fn session_key(user_id: &str) -> String {
    format!("session_{user_id}")
}

/// Per-conversation message lists, stored oldest-first.
pub struct MessageCache {
    cache: LayeredCache<Vec<Message>>,
    media_match_window: Duration,
}

impl MessageCache {
    pub fn new(backend: Arc<dyn KvBackend>, config: &SyncConfig) -> Self {
        Self {
            cache: LayeredCache::new(backend, Partition::Messages, config.write_debounce),
            media_match_window: config.media_match_window,
        }
    }

    pub fn peek(&self, conversation_id: &str) -> Option<Vec<Message>> {
        self.cache.peek(&messages_key(conversation_id))
    }

    pub async fn get(&self, conversation_id: &str) -> Option<Vec<Message>> {
        self.cache.get(&messages_key(conversation_id)).await
    }

    pub fn put(&self, conversation_id: &str, messages: Vec<Message>) {
        self.cache.set(messages_key(conversation_id), messages);
    }

    /// Inserts a locally-created pending message at the end of the list.
    pub async fn push_optimistic(&self, conversation_id: &str, message: Message) -> Vec<Message> {
        self.cache
            .update(&messages_key(conversation_id), |current| {
                let mut messages = current.unwrap_or_default();
                messages.push(message);
                messages
            })
            .await
    }

    /// Folds an older fetched page (oldest-first) into the cached list.
    /// Entries already present keep their cached state; they may have
    /// reconciled since the page was queried.
    pub async fn merge_page(&self, conversation_id: &str, page: Vec<Message>) -> Vec<Message> {
        self.cache
            .update(&messages_key(conversation_id), |current| {
                let current = current.unwrap_or_default();
                let mut merged: Vec<Message> = page
                    .iter()
                    .filter(|m| !current.iter().any(|c| c.id == m.id))
                    .cloned()
                    .collect();
                merged.extend(current);
                merged
            })
            .await
    }

    /// Applies one realtime event to the conversation's cached list, inside
    /// a single atomic update. Outgoing echoes go through reconciliation;
    /// inbound messages and unmatched echoes append (deduplicated by id).
    /// Returns the temp id of the pending entry the event settled, if any.
    pub async fn apply_event(&self, event: &RealtimeEvent) -> Option<String> {
        let canonical = reconcile::canonical_from_event(event);
        let window = self.media_match_window;
        let mut matched = None;

        self.cache
            .update(&messages_key(&event.data.conversation_id), |current| {
                let list = current.unwrap_or_default();
                let mut messages = if event.is_outgoing() {
                    let outcome = reconcile::reconcile_echo(list, &canonical, window);
                    matched = outcome.matched_temp_id;
                    outcome.messages
                } else {
                    list
                };
                if matched.is_none() && !messages.iter().any(|m| m.id == canonical.id) {
                    messages.push(canonical.clone());
                }
                messages
            })
            .await;

        matched
    }

    pub async fn remove(&self, conversation_id: &str) {
        self.cache.delete(&messages_key(conversation_id)).await
    }

    pub fn warm_up(&self, entries: impl IntoIterator<Item = (String, Vec<Message>)>) {
        self.cache.warm_up(entries)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub async fn flush(&self) {
        self.cache.flush().await
    }

    pub async fn clear(&self) {
        self.cache.clear().await
    }

    pub fn reset_for_database_reset(&self) {
        self.cache.reset_for_database_reset()
    }
}

/// Conversation summaries keyed by conversation id.
pub struct ConversationCache {
    cache: LayeredCache<Conversation>,
}

impl ConversationCache {
    pub fn new(backend: Arc<dyn KvBackend>, config: &SyncConfig) -> Self {
        Self {
            cache: LayeredCache::new(backend, Partition::Conversations, config.write_debounce),
        }
    }

    pub fn peek(&self, id: &str) -> Option<Conversation> {
        self.cache.peek(id)
    }

    pub async fn get(&self, id: &str) -> Option<Conversation> {
        self.cache.get(id).await
    }

    pub fn put(&self, conversation: Conversation) {
        self.cache.set(conversation.id.clone(), conversation);
    }

    /// Rolls a delivered message into the conversation summary, creating a
    /// minimal record when the conversation is not cached yet.
    pub async fn note_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: Option<&str>,
        at: DateTime<Utc>,
        inbound: bool,
    ) -> Conversation {
        self.cache
            .update(conversation_id, |current| {
                let mut conversation = current.unwrap_or_else(|| Conversation {
                    id: conversation_id.to_string(),
                    participant_id: sender_id.to_string(),
                    participant_name: None,
                    last_message_text: None,
                    last_message_at: None,
                    unread_count: 0,
                });
                conversation.last_message_text = text.map(str::to_string);
                conversation.last_message_at = Some(at);
                if inbound {
                    conversation.unread_count += 1;
                }
                conversation
            })
            .await
    }

    pub async fn mark_read(&self, conversation_id: &str) {
        self.cache
            .update(conversation_id, |current| {
                let mut conversation = current.unwrap_or_else(|| Conversation {
                    id: conversation_id.to_string(),
                    participant_id: String::new(),
                    participant_name: None,
                    last_message_text: None,
                    last_message_at: None,
                    unread_count: 0,
                });
                conversation.unread_count = 0;
                conversation
            })
            .await;
    }

    pub async fn remove(&self, id: &str) {
        self.cache.delete(id).await
    }

    pub fn warm_up(&self, entries: impl IntoIterator<Item = (String, Conversation)>) {
        self.cache.warm_up(entries)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub async fn flush(&self) {
        self.cache.flush().await
    }

    pub async fn clear(&self) {
        self.cache.clear().await
    }

    pub fn reset_for_database_reset(&self) {
        self.cache.reset_for_database_reset()
    }
}

/// Tag sets keyed by owner.
pub struct TagCache {
    cache: LayeredCache<Vec<Tag>>,
}

impl TagCache {
    pub fn new(backend: Arc<dyn KvBackend>, config: &SyncConfig) -> Self {
        Self {
            cache: LayeredCache::new(backend, Partition::Tags, config.write_debounce),
        }
    }

    pub async fn get(&self, owner_id: &str) -> Option<Vec<Tag>> {
        self.cache.get(&tags_key(owner_id)).await
    }

    pub fn put(&self, owner_id: &str, tags: Vec<Tag>) {
        self.cache.set(tags_key(owner_id), tags);
    }

    pub async fn upsert(&self, owner_id: &str, tag: Tag) -> Vec<Tag> {
        self.cache
            .update(&tags_key(owner_id), |current| {
                let mut tags = current.unwrap_or_default();
                match tags.iter_mut().find(|t| t.id == tag.id) {
                    Some(existing) => *existing = tag.clone(),
                    None => tags.push(tag.clone()),
                }
                tags
            })
            .await
    }

    pub async fn remove(&self, owner_id: &str) {
        self.cache.delete(&tags_key(owner_id)).await
    }

    pub async fn flush(&self) {
        self.cache.flush().await
    }

    pub async fn clear(&self) {
        self.cache.clear().await
    }

    pub fn reset_for_database_reset(&self) {
        self.cache.reset_for_database_reset()
    }
}

/// Connected-account session records.
pub struct SessionCache {
    cache: LayeredCache<SessionRecord>,
}

impl SessionCache {
    pub fn new(backend: Arc<dyn KvBackend>, config: &SyncConfig) -> Self {
        Self {
            cache: LayeredCache::new(backend, Partition::Sessions, config.write_debounce),
        }
    }

    pub async fn get(&self, user_id: &str) -> Option<SessionRecord> {
        self.cache.get(&session_key(user_id)).await
    }

    pub fn put(&self, session: SessionRecord) {
        self.cache.set(session_key(&session.user_id), session);
    }

    pub async fn remove(&self, user_id: &str) {
        self.cache.delete(&session_key(user_id)).await
    }

    pub async fn flush(&self) {
        self.cache.flush().await
    }

    pub async fn clear(&self) {
        self.cache.clear().await
    }

    pub fn reset_for_database_reset(&self) {
        self.cache.reset_for_database_reset()
    }
}

/// All four domain caches over one shared store, plus the primitives the
/// session-teardown hook calls (flush, then clear, then the external logout
/// flow destroys and recreates the database and calls
/// `reset_for_database_reset`).
pub struct CacheSet {
    pub messages: MessageCache,
    pub conversations: ConversationCache,
    pub tags: TagCache,
    pub sessions: SessionCache,
}

impl CacheSet {
    pub fn new(backend: Arc<dyn KvBackend>, config: &SyncConfig) -> Self {
        Self {
            messages: MessageCache::new(backend.clone(), config),
            conversations: ConversationCache::new(backend.clone(), config),
            tags: TagCache::new(backend.clone(), config),
            sessions: SessionCache::new(backend, config),
        }
    }

    /// Routes one realtime event into the message list and the conversation
    /// summary. Returns the temp id of the pending message the event
    /// settled, if any.
    pub async fn handle_realtime_event(&self, event: &RealtimeEvent) -> Option<String> {
        let matched = self.messages.apply_event(event).await;

        let data = &event.data;
        let at = data.timestamp.unwrap_or(event.timestamp);
        self.conversations
            .note_message(
                &data.conversation_id,
                &data.sender_id,
                data.text.as_deref(),
                at,
                !event.is_outgoing(),
            )
            .await;

        matched
    }

    pub async fn flush_all(&self) {
        tokio::join!(
            self.messages.flush(),
            self.conversations.flush(),
            self.tags.flush(),
            self.sessions.flush(),
        );
    }

    pub async fn clear_all(&self) {
        tokio::join!(
            self.messages.clear(),
            self.conversations.clear(),
            self.tags.clear(),
            self.sessions.clear(),
        );
    }

    pub fn reset_for_database_reset(&self) {
        self.messages.reset_for_database_reset();
        self.conversations.reset_for_database_reset();
        self.tags.reset_for_database_reset();
        self.sessions.reset_for_database_reset();
    }
}
