//! Object Pool (single-threaded)
//!
//! Owner of immutable pool objects. The pool keeps the owning [`Arc`] for
//! every allocation and hands out clones; an object stays alive at least
//! until it is freed or the pool is cleared, and a clone held past that
//! point keeps the data valid instead of dangling.
//!
//! Membership is tracked by pointer identity, so freeing an object that was
//! never allocated here (or freeing it twice) is detected and reported
//! without touching the live set.

use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Set-backed object pool. Not concurrency-safe; see
/// [`ConcurrentObjectPool`] for the multi-threaded variant.
///
/// [`ConcurrentObjectPool`]: super::concurrent::ConcurrentObjectPool
pub struct ObjectPool<T> {
    live: FxHashMap<usize, Arc<T>>,
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectPool<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: FxHashMap::default(),
        }
    }

    /// Moves `value` into the pool and returns a shared handle to it.
    pub fn allocate(&mut self, value: T) -> Arc<T> {
        let object = Arc::new(value);
        self.live.insert(address_of(&object), Arc::clone(&object));
        object
    }

    /// Releases the pool's ownership of one object.
    ///
    /// Returns `false` if `object` is not live in this pool (a double free
    /// or a foreign pointer). The live set is left untouched in that case.
    pub fn free(&mut self, object: &Arc<T>) -> bool {
        if self.live.remove(&address_of(object)).is_some() {
            true
        } else {
            log::error!("ObjectPool::free called with an object this pool does not own");
            false
        }
    }

    /// Whether `object` is currently live in this pool.
    #[must_use]
    pub fn owns(&self, object: &Arc<T>) -> bool {
        self.live.contains_key(&address_of(object))
    }

    /// Releases every live object. Safe during teardown.
    pub fn clear(&mut self) {
        self.live.clear();
    }

    /// Number of live allocations.
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.live.len()
    }
}

/// Pointer identity of a pooled object.
#[inline]
pub(crate) fn address_of<T>(object: &Arc<T>) -> usize {
    Arc::as_ptr(object) as usize
}
