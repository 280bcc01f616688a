use std::time::Duration;

/// Tunables for the sync layer. `Default` matches production behavior; tests
/// shrink the debounce to keep themselves fast.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Path of the durable store database file.
    pub db_path: String,
    /// Quiet interval before buffered writes are flushed.
    pub write_debounce: Duration,
    /// How far apart an optimistic media message and its echo may be and
    /// still reconcile. Media has no content-equality signal, so this window
    /// is the only tie-break.
    pub media_match_window: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            db_path: "inbox-sync.redb".to_string(),
            write_debounce: Duration::from_millis(500),
            media_match_window: Duration::from_secs(30),
        }
    }
}
