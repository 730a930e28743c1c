//! Interrupt-safe sharing primitives.
//!
//! The firmware runs on a single core with no scheduler, so everything that
//! crosses between an interrupt handler and the main loop goes through one
//! of two types:
//!
//! - [`EventLatch`]: a "did this happen" flag with atomic read-and-clear.
//!   Repeated `set` calls before a `take` collapse into one event.
//! - [`Shared`]: a value owned jointly by an interrupt handler and the main
//!   loop, only ever touched inside a short critical section.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use portable_atomic::{AtomicBool, Ordering};

/// Single-producer / single-consumer event flag.
pub struct EventLatch {
    pending: AtomicBool,
}

impl EventLatch {
    /// Creates a cleared latch.
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Marks the event as having happened.
    pub fn set(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Consumes the event. Returns `true` at most once per `set`.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Drops any pending event without reporting it.
    pub fn clear(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// Peeks at the latch without consuming it.
    pub fn is_set(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for EventLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// A value shared between interrupt and thread context.
///
/// Starts empty so it can live in a `static`; the owner installs the value
/// once peripherals exist. Every access runs with interrupts masked.
pub struct Shared<T> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Option<T>>>,
}

impl<T> Shared<T> {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Stores `value`, replacing anything installed before.
    pub fn install(&self, value: T) {
        self.inner.lock(|cell| {
            cell.replace(Some(value));
        });
    }

    /// Runs `f` against the installed value inside a critical section.
    ///
    /// Returns `None` if nothing has been installed yet.
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.inner
            .lock(|cell| cell.borrow_mut().as_mut().map(f))
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_is_consumed_once() {
        let latch = EventLatch::new();
        assert!(!latch.take());

        latch.set();
        assert!(latch.is_set());
        assert!(latch.take());
        assert!(!latch.take());
    }

    #[test]
    fn repeated_sets_coalesce() {
        let latch = EventLatch::new();
        latch.set();
        latch.set();
        latch.set();
        assert!(latch.take());
        assert!(!latch.take());
    }

    #[test]
    fn clear_discards_pending_event() {
        let latch = EventLatch::new();
        latch.set();
        latch.clear();
        assert!(!latch.take());
    }

    #[test]
    fn shared_is_empty_until_installed() {
        let shared: Shared<u32> = Shared::new();
        assert_eq!(shared.lock(|v| *v), None);

        shared.install(7);
        assert_eq!(shared.lock(|v| { *v += 1; *v }), Some(8));
        assert_eq!(shared.lock(|v| *v), Some(8));
    }
}
