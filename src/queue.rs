//! Blocking FIFO shared by the listener and the worker pool.
//!
//! One mutex guards the deque and one condition variable is paired with it.
//! Every push wakes exactly one waiting worker, since exactly one unit of
//! work became available.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Thread-safe queue of pending work items.
///
/// Items are moved in and out, so a value is either queued or owned by the
/// thread that popped it, never both.
pub struct ConnectionQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> ConnectionQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    // Critical sections are plain deque operations that cannot leave the
    // deque half-updated, so a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item at the tail and wake one waiter.
    pub fn push(&self, item: T) {
        self.lock().push_back(item);
        self.available.notify_one();
    }

    /// Remove the item at the head, blocking until one is available.
    pub fn pop(&self) -> T {
        let mut items = self.lock();
        loop {
            // Re-checked after every wake: wakeups may be spurious, or another
            // worker may have taken the item first.
            if let Some(item) = items.pop_front() {
                return item;
            }
            items = self
                .available
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove the item at the head without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[allow(dead_code)] // Dispatch checks emptiness under the lock in `pop`
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T> Default for ConnectionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
