//! Per-key asynchronous mutual exclusion.
//!
//! `LayeredCache::update` is a read-modify-write with an await point in the
//! middle (the store read), so two updates on the same key could both read the
//! same stale value and one write would be lost. `KeyedMutex` serializes those
//! sequences per key while leaving unrelated keys fully concurrent.

use crate::cache::lock;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

#[derive(Default)]
struct LockState {
    held: bool,
    waiters: VecDeque<oneshot::Sender<KeyGuard>>,
}

type LockMap = Arc<Mutex<HashMap<String, LockState>>>;

#[derive(Default)]
pub struct KeyedMutex {
    locks: LockMap,
}

/// Holds one key locked; releasing happens in `Drop`, so neither an early
/// return nor a cancelled future can leave the key held.
pub struct KeyGuard {
    locks: LockMap,
    key: String,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with `key` held exclusively. Contended callers queue FIFO.
    pub async fn run_exclusive<F, Fut, R>(&self, key: &str, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let _guard = self.acquire(key).await;
        f().await
    }

    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let waiter = {
            let mut locks = lock(&self.locks);
            let state = locks.entry(key.to_string()).or_default();
            if state.held {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            } else {
                state.held = true;
                None
            }
        };

        match waiter {
            None => KeyGuard {
                locks: Arc::clone(&self.locks),
                key: key.to_string(),
            },
            Some(rx) => match rx.await {
                Ok(guard) => guard,
                // The lock map was torn down while we waited; nothing holds
                // the key anymore.
                Err(_) => KeyGuard {
                    locks: Arc::clone(&self.locks),
                    key: key.to_string(),
                },
            },
        }
    }

    /// Number of keys with live lock state, for diagnostics. Idle keys are
    /// reclaimed on release, so this tracks only held or contended keys.
    pub fn active_keys(&self) -> usize {
        lock(&self.locks).len()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        let Some(state) = locks.get_mut(&self.key) else {
            return;
        };

        while let Some(waiter) = state.waiters.pop_front() {
            let next = KeyGuard {
                locks: Arc::clone(&self.locks),
                key: self.key.clone(),
            };
            match waiter.send(next) {
                // Hand-off: the key stays held, now by the woken waiter.
                Ok(()) => return,
                Err(unclaimed) => {
                    // The waiter gave up before being woken. The returned
                    // guard must not run its Drop here: the map lock is held
                    // and the key is still ours to hand off.
                    std::mem::forget(unclaimed);
                }
            }
        }

        state.held = false;
        locks.remove(&self.key);
    }
}
