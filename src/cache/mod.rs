pub mod buffered_writer;
pub mod domains;
pub mod keyed_mutex;
pub mod layered;
pub mod registry;

pub use buffered_writer::BufferedWriter;
pub use domains::{CacheSet, ConversationCache, MessageCache, SessionCache, TagCache};
pub use keyed_mutex::KeyedMutex;
pub use layered::LayeredCache;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Lock a std mutex, shrugging off poisoning: the guarded maps stay valid
// even if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
