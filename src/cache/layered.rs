//! Memory-first cache with buffered write-behind persistence.
//!
//! Reads and writes hit an in-memory map synchronously; persistence runs
//! behind a debounced, coalescing writer. The durable layer degrades rather
//! than blocks: the first failed flush disables it for the rest of the
//! session and every operation continues memory-only.

use crate::cache::buffered_writer::BufferedWriter;
use crate::cache::keyed_mutex::KeyedMutex;
use crate::store::error::{Result, StoreError};
use crate::store::traits::{KvBackend, Partition};
use dashmap::DashMap;
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

struct PersistenceState {
    partition: Partition,
    disabled: AtomicBool,
    read_failure_logged: AtomicBool,
}

impl PersistenceState {
    fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    fn disable(&self, err: &StoreError) {
        if !self.disabled.swap(true, Ordering::SeqCst) {
            warn!(
                "persistence for partition {} disabled after failure: {err}; continuing memory-only",
                self.partition.name()
            );
        }
    }

    // Read failures do not disable the layer, but they are only worth one
    // log line per session.
    fn note_read_failure(&self, err: &StoreError) {
        if !self.read_failure_logged.swap(true, Ordering::SeqCst) {
            warn!(
                "read from partition {} failed: {err}",
                self.partition.name()
            );
        }
    }

    fn rearm(&self) {
        self.disabled.store(false, Ordering::SeqCst);
        self.read_failure_logged.store(false, Ordering::SeqCst);
    }
}

pub struct LayeredCache<T> {
    backend: Arc<dyn KvBackend>,
    memory: DashMap<String, T>,
    writer: Arc<BufferedWriter>,
    locks: KeyedMutex,
    state: Arc<PersistenceState>,
}

impl<T> LayeredCache<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Must be called inside a Tokio runtime (the writer spawns its debounce
    /// flusher on construction).
    pub fn new(backend: Arc<dyn KvBackend>, partition: Partition, debounce: Duration) -> Self {
        let writer = BufferedWriter::new(backend.clone(), partition, debounce);
        Self {
            backend,
            memory: DashMap::new(),
            writer,
            locks: KeyedMutex::new(),
            state: Arc::new(PersistenceState {
                partition,
                disabled: AtomicBool::new(false),
                read_failure_logged: AtomicBool::new(false),
            }),
        }
    }

    /// Synchronous memory-only read, for callers that cannot await.
    pub fn peek(&self, key: &str) -> Option<T> {
        self.memory.get(key).map(|entry| entry.value().clone())
    }

    /// Memory hit, else a durable-layer read that warms memory. Store
    /// failures degrade to `None`.
    pub async fn get(&self, key: &str) -> Option<T> {
        if let Some(value) = self.peek(key) {
            return Some(value);
        }
        if self.state.is_disabled() {
            return None;
        }

        match self.backend.get(self.state.partition, key).await {
            Ok(Some(bytes)) => match decode::<T>(&bytes) {
                Ok(value) => {
                    // A concurrent set() may have landed since the memory
                    // miss; the entry API keeps the newer value.
                    let entry = self.memory.entry(key.to_string()).or_insert(value);
                    Some(entry.clone())
                }
                Err(e) => {
                    self.state.note_read_failure(&e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.state.note_read_failure(&e);
                None
            }
        }
    }

    /// Writes memory synchronously (a following `get`/`peek` observes the
    /// value immediately) and enqueues persistence in the background. The
    /// first persistence failure disables the durable layer for the session.
    pub fn set(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        self.memory.insert(key.clone(), value.clone());
        if self.state.is_disabled() {
            return;
        }

        let bytes = match encode(&value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.state.disable(&e);
                return;
            }
        };

        let ticket = self.writer.set(key, bytes);
        let state = self.state.clone();
        tokio::spawn(async move {
            if let Err(e) = ticket.wait().await {
                state.disable(&e);
            }
        });
    }

    /// Atomic per-key read-modify-write. `get` suspends, so without the key
    /// lock two concurrent updates could read the same stale value and one
    /// write would be lost.
    pub async fn update<F>(&self, key: &str, updater: F) -> T
    where
        F: FnOnce(Option<T>) -> T,
    {
        self.locks
            .run_exclusive(key, || async {
                let current = self.get(key).await;
                let next = updater(current);
                self.set(key.to_string(), next.clone());
                next
            })
            .await
    }

    /// Removes the key everywhere: memory, any buffered pending write (its
    /// waiters resolve without persisting), and best-effort from the durable
    /// layer.
    pub async fn delete(&self, key: &str) {
        self.locks
            .run_exclusive(key, || async {
                self.memory.remove(key);
                self.writer.drop_pending_key(key);
                if !self.state.is_disabled()
                    && let Err(e) = self.backend.delete(self.state.partition, key).await
                {
                    debug!(
                        "best-effort delete of {key} from partition {} failed: {e}",
                        self.state.partition.name()
                    );
                }
            })
            .await
    }

    /// Drops the entire namespace: memory, pending writes, and the durable
    /// partition.
    pub async fn clear(&self) {
        self.memory.clear();
        self.writer.drop_all_pending();
        if !self.state.is_disabled()
            && let Err(e) = self.backend.clear(self.state.partition).await
        {
            warn!(
                "clearing partition {} failed: {e}",
                self.state.partition.name()
            );
        }
    }

    /// Force-drains all buffered writes, skipping the debounce.
    pub async fn flush(&self) {
        if self.state.is_disabled() {
            return;
        }
        if let Err(e) = self.writer.flush_now().await {
            self.state.disable(&e);
        }
    }

    /// For session teardown, when the durable database itself is destroyed
    /// and recreated: drops memory and pending writes and re-arms the
    /// disabled flag so stale state cannot leak into the next session.
    pub fn reset_for_database_reset(&self) {
        self.memory.clear();
        self.writer.drop_all_pending();
        self.state.rearm();
    }

    /// Pre-loads memory with entries read from the durable store at session
    /// start.
    pub fn warm_up(&self, entries: impl IntoIterator<Item = (String, T)>) {
        let start = std::time::Instant::now();
        let mut count = 0usize;
        for (key, value) in entries {
            self.memory.insert(key, value);
            count += 1;
        }
        debug!(
            "{} cache warmed up with {} entries in {:?}",
            self.state.partition.name(),
            count,
            start.elapsed()
        );
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn persistence_disabled(&self) -> bool {
        self.state.is_disabled()
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}
