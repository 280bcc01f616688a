// Lives in its own test binary: flush_all_registered touches every writer in
// the process, so it must not run next to tests that rely on writes staying
// buffered.

use inbox_sync::cache::{LayeredCache, registry};
use inbox_sync::store::{KvBackend, MemoryBackend, Partition};
use std::sync::Arc;
use std::time::Duration;

fn decode(bytes: &[u8]) -> String {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(value, _)| value)
        .unwrap()
}

#[tokio::test]
async fn test_forced_registry_flush_persists_ahead_of_the_debounce() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = LayeredCache::<String>::new(
        backend.clone(),
        Partition::Messages,
        Duration::from_secs(3600),
    );
    let sessions = Arc::new(MemoryBackend::new());
    let session_cache = LayeredCache::<String>::new(
        sessions.clone(),
        Partition::Sessions,
        Duration::from_secs(3600),
    );

    cache.set("k", "about to suspend".to_string());
    session_cache.set("s", "still buffered".to_string());
    assert_eq!(backend.len(Partition::Messages).await, 0);
    assert_eq!(sessions.len(Partition::Sessions).await, 0);

    // The "about to suspend" signal: every registered writer drains at once.
    registry::flush_all_registered().await;

    let stored = backend.get(Partition::Messages, "k").await.unwrap().unwrap();
    assert_eq!(decode(&stored), "about to suspend");
    let stored = sessions.get(Partition::Sessions, "s").await.unwrap().unwrap();
    assert_eq!(decode(&stored), "still buffered");
}
