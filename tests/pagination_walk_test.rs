use async_trait::async_trait;
use chrono::DateTime;
use inbox_sync::cursor::MessageCursor;
use inbox_sync::pagination::{MessageHistory, MessagePager};
use inbox_sync::types::message::{Message, MessageKind};

/// Backing "remote table": newest-first query over a fixed row set, with the
/// coarse inclusive window a real endpoint would apply at the watermark.
struct TableHistory {
    rows: Vec<Message>,
}

#[async_trait]
impl MessageHistory for TableHistory {
    async fn fetch_window(
        &self,
        _conversation_id: &str,
        _owner_id: &str,
        position: Option<&MessageCursor>,
        count: usize,
    ) -> anyhow::Result<Vec<Message>> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            b.timestamp_millis()
                .cmp(&a.timestamp_millis())
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows
            .into_iter()
            .filter(|m| match position {
                Some(c) => m.timestamp_millis() <= c.timestamp,
                None => true,
            })
            .take(count)
            .collect())
    }
}

fn msg(id: &str, millis: i64) -> Message {
    Message {
        id: id.to_string(),
        from_me: millis % 2 == 0,
        kind: MessageKind::Text,
        text: format!("message {id}"),
        timestamp: DateTime::from_timestamp_millis(millis),
        attachment: None,
        pending: false,
        temp_id: None,
        placeholder: false,
    }
}

/// A deep history with bursts of identical timestamps, so page boundaries
/// repeatedly land inside timestamp ties.
fn deep_history() -> Vec<Message> {
    let mut rows = Vec::new();
    for i in 0..400 {
        // Four rows share each timestamp.
        rows.push(msg(&format!("m{i:04}"), 1_000_000 + (i / 4) * 1_000));
    }
    rows
}

#[tokio::test]
async fn test_walking_all_pages_equals_one_unbounded_fetch() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init()
        .ok();

    let rows = deep_history();
    let pager = MessagePager::new(TableHistory { rows: rows.clone() });

    let mut collected: Vec<Message> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;

    loop {
        let page = pager
            .get_page("c1", "owner", 7, cursor.as_deref())
            .await?;
        pages += 1;
        assert!(pages <= 100, "pagination failed to terminate");

        // Each page is strictly older than everything already collected.
        if let Some(first_new) = page.messages.last()
            && let Some(oldest_seen) = collected.first()
        {
            let newer = (
                oldest_seen.timestamp_millis(),
                oldest_seen.id.as_str(),
            );
            let older = (first_new.timestamp_millis(), first_new.id.as_str());
            assert!(older < newer, "page overlapped already-seen rows");
        }

        let mut with_new = page.messages.clone();
        with_new.extend(collected);
        collected = with_new;

        if !page.has_more {
            assert_eq!(page.next_cursor, None);
            break;
        }
        cursor = page.next_cursor.clone();
        assert!(cursor.is_some());
    }

    // No gaps, no duplicates, chronological order.
    let mut expected = rows;
    expected.sort_by(|a, b| {
        a.timestamp_millis()
            .cmp(&b.timestamp_millis())
            .then_with(|| a.id.cmp(&b.id))
    });
    assert_eq!(collected.len(), expected.len());
    assert_eq!(collected, expected);
    Ok(())
}

#[tokio::test]
async fn test_walk_skips_placeholder_padding_without_breaking_continuity() -> Result<(), anyhow::Error>
{
    let mut rows = deep_history();
    // Scatter empty placeholder rows through the history.
    for i in 0..40 {
        let mut padding = msg(&format!("pad{i:02}"), 1_000_000 + i * 9_000);
        padding.text = String::new();
        padding.placeholder = true;
        rows.push(padding);
    }

    let pager = MessagePager::new(TableHistory { rows: rows.clone() });

    let mut seen = std::collections::HashSet::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = pager.get_page("c1", "owner", 5, cursor.as_deref()).await?;
        for m in &page.messages {
            assert!(!m.placeholder, "placeholder leaked into a page");
            assert!(seen.insert(m.id.clone()), "duplicate row {}", m.id);
        }
        if !page.has_more {
            break;
        }
        cursor = page.next_cursor.clone();
    }

    // Every real row surfaced exactly once.
    assert_eq!(seen.len(), 400);
    Ok(())
}
