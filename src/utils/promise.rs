//! Shared One-Shot Future
//!
//! A clonable write-once slot: one producer resolves, any number of
//! consumers block until the value is published. This is the primitive
//! behind both the in-memory shader cache (waiters coalesce on one in-flight
//! compile) and the lazy one-time compiler session initialization.
//!
//! Resolution is sticky: once a value is published every current and future
//! `wait()` returns a clone of it immediately.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// A shared, write-once, blocking future.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    slot: Mutex<Option<T>>,
    cond: Condvar,
}

impl<T: Clone> Promise<T> {
    /// Creates an unresolved promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(None),
                cond: Condvar::new(),
            }),
        }
    }

    /// Creates an already-resolved promise.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Some(value)),
                cond: Condvar::new(),
            }),
        }
    }

    /// Publishes the value and wakes all waiters.
    ///
    /// Returns `false` (and leaves the first value in place) if the promise
    /// was already resolved; resolving twice is a caller bug.
    pub fn resolve(&self, value: T) -> bool {
        let mut slot = self.inner.slot.lock();
        if slot.is_some() {
            debug_assert!(false, "promise resolved twice");
            return false;
        }
        *slot = Some(value);
        self.inner.cond.notify_all();
        true
    }

    /// Blocks until the value is published, then returns a clone of it.
    #[must_use]
    pub fn wait(&self) -> T {
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            self.inner.cond.wait(&mut slot);
        }
    }

    /// Returns a clone of the value if already published.
    #[must_use]
    pub fn try_get(&self) -> Option<T> {
        self.inner.slot.lock().clone()
    }

    /// Whether the value has been published.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.inner.slot.lock().is_some()
    }
}

impl<T: Clone> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
