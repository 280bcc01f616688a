//! Process-wide registry of buffered writers.
//!
//! Exists for exactly one purpose: broadcast-flushing every live writer when
//! execution is about to be suspended (process shutdown, host "tab hidden" /
//! unload hooks), bounding the window in which buffered-but-unpersisted
//! writes can be lost. Writers register on construction and are held as
//! `Weak` handles; dead handles are swept on each iteration.

use crate::cache::buffered_writer::BufferedWriter;
use crate::cache::lock;
use log::warn;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, Weak};

static REGISTRY: Lazy<Mutex<Vec<Weak<BufferedWriter>>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub(crate) fn register(writer: &Arc<BufferedWriter>) {
    lock(&REGISTRY).push(Arc::downgrade(writer));
}

/// Force-flushes every registered writer, skipping the debounce. Failures are
/// logged and do not stop the remaining writers from flushing.
pub async fn flush_all_registered() {
    let writers: Vec<Arc<BufferedWriter>> = {
        let mut registry = lock(&REGISTRY);
        registry.retain(|w| w.strong_count() > 0);
        registry.iter().filter_map(Weak::upgrade).collect()
    };

    let results = futures_util::future::join_all(writers.iter().map(|w| w.flush_now())).await;
    for result in results {
        if let Err(e) = result {
            warn!("forced flush failed: {e}");
        }
    }
}

/// Flushes all registered writers when the process receives its termination
/// signal, so an exiting session does not strand buffered writes.
pub fn install_shutdown_flush() {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            flush_all_registered().await;
        }
    });
}
