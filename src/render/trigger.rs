use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Dirty flag plus a generation counter bumped on every clean-to-dirty
/// transition. Lives inside the field state, under the field lock.
#[derive(Debug, Clone, Default)]
pub struct RenderTrigger {
    dirty: bool,
    generation: u64,
}

impl RenderTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this call turned a clean trigger dirty.
    pub fn mark_dirty(&mut self) -> bool {
        if self.dirty {
            return false;
        }
        self.dirty = true;
        self.generation = self.generation.wrapping_add(1);
        true
    }

    pub fn clear(&mut self) {
        self.dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Told when a field goes from clean to dirty. Called outside the field
/// lock, so implementations may render from inside the callback.
pub trait RenderWatcher: Send + Sync {
    fn field_dirtied(&self, generation: u64);
}

/// Blocking watcher for a display thread: park on `wait_timeout` until the
/// field needs another render.
#[derive(Debug, Default)]
pub struct RenderSignal {
    pending: Mutex<Option<u64>>,
    ready: Condvar,
}

impl RenderSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a pending notification without blocking.
    pub fn take(&self) -> Option<u64> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Wait up to `timeout` for a notification and consume it.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<u64> {
        let guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |pending| pending.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }
}

impl RenderWatcher for RenderSignal {
    fn field_dirtied(&self, generation: u64) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = Some(generation);
        self.ready.notify_all();
    }
}
