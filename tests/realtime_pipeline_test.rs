use chrono::Utc;
use inbox_sync::cache::CacheSet;
use inbox_sync::config::SyncConfig;
use inbox_sync::store::MemoryBackend;
use inbox_sync::types::events::{
    EventBus, RealtimeAttachment, RealtimeEvent, RealtimeEventKind, RealtimeMessageData,
};
use inbox_sync::types::message::{Message, MessageKind};
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> SyncConfig {
    SyncConfig {
        write_debounce: Duration::from_millis(10),
        ..SyncConfig::default()
    }
}

fn echo(conversation_id: &str, message_id: &str, text: Option<&str>) -> RealtimeEvent {
    RealtimeEvent {
        kind: RealtimeEventKind::MessageEcho,
        timestamp: Utc::now(),
        data: RealtimeMessageData {
            sender_id: "me".to_string(),
            recipient_id: "them".to_string(),
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            text: text.map(str::to_string),
            attachments: Vec::new(),
            timestamp: Some(Utc::now()),
            from_me: Some(true),
        },
    }
}

/// Full path: optimistic send, echo delivered on the event bus, consumer task
/// reconciles it into the cache.
#[tokio::test]
async fn test_echo_over_the_event_bus_settles_the_pending_send() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init()
        .ok();

    let caches = Arc::new(CacheSet::new(Arc::new(MemoryBackend::new()), &test_config()));
    let bus = EventBus::new();

    let pending = Message::optimistic(MessageKind::Text, "Hello", None);
    let temp_id = pending.temp_id.clone();
    caches.messages.push_optimistic("c1", pending).await;

    let consumer = {
        let caches = caches.clone();
        let mut echo_rx = bus.message_echo.subscribe();
        tokio::spawn(async move {
            let event = echo_rx.recv().await.expect("bus closed");
            caches.handle_realtime_event(&event).await
        })
    };

    bus.publish(echo("c1", "srv_1", Some("Hello")));
    let matched = consumer.await?;
    assert_eq!(matched, temp_id);

    let messages = caches.messages.get("c1").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "srv_1");
    assert!(!messages[0].pending);
    Ok(())
}

#[tokio::test]
async fn test_two_pending_audio_messages_one_echo_converts_exactly_one() -> Result<(), anyhow::Error>
{
    let caches = CacheSet::new(Arc::new(MemoryBackend::new()), &test_config());

    let first = Message::optimistic(MessageKind::Audio, "", None);
    let second = Message::optimistic(MessageKind::Audio, "", None);
    caches.messages.push_optimistic("c1", first.clone()).await;
    caches.messages.push_optimistic("c1", second).await;

    let mut event = echo("c1", "srv_1", None);
    event.data.attachments = vec![RealtimeAttachment {
        url: "https://cdn.example/voice.mp3".to_string(),
        mime_type: Some("audio/mpeg".to_string()),
        duration_secs: Some(3.5),
    }];

    let matched = caches.handle_realtime_event(&event).await;
    assert_eq!(matched, first.temp_id);

    let messages = caches.messages.get("c1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages.iter().filter(|m| m.pending).count(), 1);
    let settled: Vec<_> = messages.iter().filter(|m| !m.pending).collect();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].id, "srv_1");
    assert_eq!(
        settled[0].attachment.as_ref().and_then(|a| a.duration_secs),
        Some(3.5)
    );
    Ok(())
}

#[tokio::test]
async fn test_duplicate_echo_delivery_does_not_duplicate_the_message() -> Result<(), anyhow::Error>
{
    let caches = CacheSet::new(Arc::new(MemoryBackend::new()), &test_config());

    let pending = Message::optimistic(MessageKind::Text, "Hello", None);
    caches.messages.push_optimistic("c1", pending).await;

    let event = echo("c1", "srv_1", Some("Hello"));
    caches.handle_realtime_event(&event).await;
    // The channel redelivers the same echo.
    caches.handle_realtime_event(&event).await;

    let messages = caches.messages.get("c1").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "srv_1");
    assert!(!messages[0].pending);
    Ok(())
}
