//! Reverse-chronological message windowing.
//!
//! Pages walk a conversation's history newest-to-oldest along the composite
//! `(timestamp desc, id desc)` order. The backing query over-fetches so that
//! placeholder filtering cannot under-fill a page, and every row is
//! re-checked against the cursor here, so a sloppy backing query cannot
//! produce duplicates.

use crate::cursor::MessageCursor;
use crate::types::message::Message;
use async_trait::async_trait;
use std::cmp::Ordering;

pub const MIN_PAGE_SIZE: usize = 1;
pub const MAX_PAGE_SIZE: usize = 20;
const OVERFETCH_FLOOR: usize = 120;

/// The remote history query this layer paginates over. Implementors return
/// candidate rows newest-first; `position`, when present, is the watermark
/// the window should start at, inclusively. The pager applies the strict
/// cursor filter itself.
#[async_trait]
pub trait MessageHistory: Send + Sync {
    async fn fetch_window(
        &self,
        conversation_id: &str,
        owner_id: &str,
        position: Option<&MessageCursor>,
        count: usize,
    ) -> anyhow::Result<Vec<Message>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessagePage {
    /// Oldest-first, ready for chronological rendering.
    pub messages: Vec<Message>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

pub struct MessagePager<H> {
    history: H,
}

impl<H: MessageHistory> MessagePager<H> {
    pub fn new(history: H) -> Self {
        Self { history }
    }

    /// Returns one page strictly older than `cursor` (or the newest page when
    /// `cursor` is absent or malformed). `limit` is clamped to the endpoint
    /// contract bounds.
    pub async fn get_page(
        &self,
        conversation_id: &str,
        owner_id: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> anyhow::Result<MessagePage> {
        let limit = limit.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        let cursor = cursor.and_then(MessageCursor::decode);
        let fetch_count = (limit * 3).max(OVERFETCH_FLOOR);

        let rows = self
            .history
            .fetch_window(conversation_id, owner_id, cursor.as_ref(), fetch_count)
            .await?;

        let mut rows: Vec<Message> = rows
            .into_iter()
            .filter(|m| !m.placeholder || m.is_displayable())
            .filter(|m| match &cursor {
                Some(c) => c.admits(m.timestamp_millis(), &m.id),
                None => true,
            })
            .collect();
        rows.sort_by(newest_first);

        let has_more = rows.len() > limit;
        rows.truncate(limit);

        // The watermark is the oldest row actually returned, so the next call
        // continues strictly older than everything already seen.
        let next_cursor = if has_more {
            rows.last().map(|m| MessageCursor::for_message(m).encode())
        } else {
            None
        };

        rows.reverse();
        Ok(MessagePage {
            messages: rows,
            next_cursor,
            has_more,
        })
    }
}

fn newest_first(a: &Message, b: &Message) -> Ordering {
    b.timestamp_millis()
        .cmp(&a.timestamp_millis())
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::message::MessageKind;
    use chrono::DateTime;

    struct FixedHistory {
        rows: Vec<Message>,
    }

    #[async_trait]
    impl MessageHistory for FixedHistory {
        async fn fetch_window(
            &self,
            _conversation_id: &str,
            _owner_id: &str,
            position: Option<&MessageCursor>,
            count: usize,
        ) -> anyhow::Result<Vec<Message>> {
            let mut rows = self.rows.clone();
            rows.sort_by(newest_first);
            let rows = rows
                .into_iter()
                .filter(|m| match position {
                    // Coarse inclusive window; the pager must re-filter.
                    Some(c) => m.timestamp_millis() <= c.timestamp,
                    None => true,
                })
                .take(count)
                .collect();
            Ok(rows)
        }
    }

    fn msg(id: &str, millis: i64) -> Message {
        Message {
            id: id.to_string(),
            from_me: false,
            kind: MessageKind::Text,
            text: format!("text {id}"),
            timestamp: DateTime::from_timestamp_millis(millis),
            attachment: None,
            pending: false,
            temp_id: None,
            placeholder: false,
        }
    }

    fn pager(rows: Vec<Message>) -> MessagePager<FixedHistory> {
        MessagePager::new(FixedHistory { rows })
    }

    #[tokio::test]
    async fn test_first_page_is_newest_returned_oldest_first() {
        let rows: Vec<Message> = (0..10).map(|i| msg(&format!("m{i}"), 1000 + i)).collect();
        let pager = pager(rows);

        let page = pager.get_page("c1", "owner", 3, None).await.unwrap();

        assert!(page.has_more);
        assert!(page.next_cursor.is_some());
        let ids: Vec<&str> = page.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m7", "m8", "m9"]);
    }

    #[tokio::test]
    async fn test_placeholders_without_content_are_dropped() {
        let mut rows: Vec<Message> = (0..4).map(|i| msg(&format!("m{i}"), 1000 + i)).collect();
        let mut empty = msg("ph", 1010);
        empty.text = String::new();
        empty.placeholder = true;
        rows.push(empty);
        let mut media = msg("ph_media", 1011);
        media.text = String::new();
        media.kind = MessageKind::Image;
        media.placeholder = true;
        rows.push(media);

        let pager = pager(rows);
        let page = pager.get_page("c1", "owner", 20, None).await.unwrap();

        let ids: Vec<&str> = page.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m0", "m1", "m2", "m3", "ph_media"]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_break_ties_by_id() {
        let rows = vec![msg("a", 1000), msg("b", 1000), msg("c", 1000)];
        let pager = pager(rows);

        let first = pager.get_page("c1", "owner", 2, None).await.unwrap();
        let ids: Vec<&str> = first.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);

        let second = pager
            .get_page("c1", "owner", 2, first.next_cursor.as_deref())
            .await
            .unwrap();
        let ids: Vec<&str> = second.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a"]);
        assert!(!second.has_more);
        assert_eq!(second.next_cursor, None);
    }

    #[tokio::test]
    async fn test_malformed_cursor_restarts_from_newest() {
        let rows: Vec<Message> = (0..5).map(|i| msg(&format!("m{i}"), 1000 + i)).collect();
        let pager = pager(rows);

        let fresh = pager.get_page("c1", "owner", 2, None).await.unwrap();
        let garbled = pager
            .get_page("c1", "owner", 2, Some("%%% not a cursor %%%"))
            .await
            .unwrap();

        assert_eq!(fresh, garbled);
    }

    #[tokio::test]
    async fn test_limit_is_clamped_to_contract_bounds() {
        let rows: Vec<Message> = (0..60).map(|i| msg(&format!("m{i:02}"), 1000 + i)).collect();
        let pager = pager(rows);

        let oversized = pager.get_page("c1", "owner", 500, None).await.unwrap();
        assert_eq!(oversized.messages.len(), MAX_PAGE_SIZE);

        let undersized = pager.get_page("c1", "owner", 0, None).await.unwrap();
        assert_eq!(undersized.messages.len(), MIN_PAGE_SIZE);
    }
}
