//! Debounced, coalescing persistence queue.
//!
//! Writes land in a pending map (last write wins per key) and are drained to
//! the backend in one batched transaction after a quiet interval. Callers get
//! a ticket that settles when their value is flushed, resolved without
//! persisting if a later operation supersedes the write.

use crate::cache::{lock, registry};
use crate::store::error::{Result, StoreError};
use crate::store::traits::{KvBackend, Partition};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Notify, oneshot};
use tokio::time::sleep;

type FlushResult = Result<()>;

struct PendingWrite {
    value: Vec<u8>,
    waiters: Vec<oneshot::Sender<FlushResult>>,
}

/// Settles when the write it was issued for reaches the store (or is
/// superseded by a delete/clear, which counts as success).
pub struct FlushTicket {
    rx: oneshot::Receiver<FlushResult>,
}

impl FlushTicket {
    pub async fn wait(self) -> FlushResult {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(
                "writer dropped before the write was flushed".to_string(),
            )),
        }
    }
}

pub struct BufferedWriter {
    backend: Arc<dyn KvBackend>,
    partition: Partition,
    debounce: Duration,
    pending: Mutex<HashMap<String, PendingWrite>>,
    write_signal: Arc<Notify>,
    // Held across drain + persist; serializes flush attempts per writer.
    flush_gate: AsyncMutex<()>,
}

impl BufferedWriter {
    /// Creates the writer, registers it with the process-wide registry, and
    /// spawns its debounce flusher. Must be called inside a Tokio runtime.
    pub fn new(backend: Arc<dyn KvBackend>, partition: Partition, debounce: Duration) -> Arc<Self> {
        let writer = Arc::new(Self {
            backend,
            partition,
            debounce,
            pending: Mutex::new(HashMap::new()),
            write_signal: Arc::new(Notify::new()),
            flush_gate: AsyncMutex::new(()),
        });
        registry::register(&writer);
        spawn_flusher(&writer);
        writer
    }

    /// Records `value` as the pending write for `key`, overwriting any prior
    /// pending value, and wakes the debounce flusher.
    pub fn set(&self, key: impl Into<String>, value: Vec<u8>) -> FlushTicket {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.pending);
            let entry = pending.entry(key.into()).or_insert_with(|| PendingWrite {
                value: Vec::new(),
                waiters: Vec::new(),
            });
            entry.value = value;
            entry.waiters.push(tx);
        }
        self.write_signal.notify_one();
        FlushTicket { rx }
    }

    /// Removes a pending write and resolves its waiters without persisting.
    /// Used when a later operation (e.g. a delete) supersedes the buffered
    /// value.
    pub fn drop_pending_key(&self, key: &str) {
        let dropped = lock(&self.pending).remove(key);
        if let Some(write) = dropped {
            for waiter in write.waiters {
                let _ = waiter.send(Ok(()));
            }
        }
    }

    /// Drops every pending write, resolving all waiters without persisting.
    pub fn drop_all_pending(&self) {
        let drained: Vec<PendingWrite> = lock(&self.pending).drain().map(|(_, w)| w).collect();
        for write in drained {
            for waiter in write.waiters {
                let _ = waiter.send(Ok(()));
            }
        }
    }

    /// Drains the entire pending map into one batched `put_many`. Waits out
    /// any in-flight flush first, and keeps draining until no writes
    /// accumulated behind the batch. On failure every waiter in the batch
    /// rejects with the same error, which also propagates to the caller.
    pub async fn flush_now(&self) -> FlushResult {
        loop {
            let _gate = self.flush_gate.lock().await;

            let batch: Vec<(String, PendingWrite)> = lock(&self.pending).drain().collect();
            if batch.is_empty() {
                return Ok(());
            }

            let (entries, waiter_sets): (Vec<_>, Vec<_>) = batch
                .into_iter()
                .map(|(key, write)| ((key, write.value), write.waiters))
                .unzip();
            let batch_len = entries.len();

            let result = self.backend.put_many(self.partition, entries).await;
            for waiters in waiter_sets {
                for waiter in waiters {
                    let _ = waiter.send(result.clone());
                }
            }

            result?;
            debug!(
                "flushed {} write(s) to partition {}",
                batch_len,
                self.partition.name()
            );
        }
    }

    pub fn has_pending_writes(&self) -> bool {
        !lock(&self.pending).is_empty()
    }
}

impl Drop for BufferedWriter {
    fn drop(&mut self) {
        // Wake the flusher task so it can observe the dead Weak and exit.
        self.write_signal.notify_one();
    }
}

/// Debounce loop: wait for a write, sleep the quiet interval, flush. The task
/// holds only a `Weak`, so it cannot keep a dropped writer alive; writes that
/// land during the sleep ride along in the same batch.
fn spawn_flusher(writer: &Arc<BufferedWriter>) {
    let weak: Weak<BufferedWriter> = Arc::downgrade(writer);
    let signal = writer.write_signal.clone();
    let debounce = writer.debounce;

    tokio::spawn(async move {
        loop {
            signal.notified().await;
            sleep(debounce).await;
            let Some(writer) = weak.upgrade() else {
                break;
            };
            if let Err(e) = writer.flush_now().await {
                // Waiters have already seen the error; the owning cache
                // decides whether to disable persistence.
                debug!("debounced flush failed: {e}");
            }
        }
    });
}
