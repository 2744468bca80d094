//! Object Pools (thread-safe)
//!
//! Multi-producer variants of [`ObjectPool`]. Any thread may allocate, free,
//! or clear. The original design for this pool was an intrusive list with
//! CAS-based removal; unsynchronized reclamation of list nodes is a
//! use-after-free hazard, so membership lives behind a short-held
//! `parking_lot::Mutex` instead. The lock guards only the map; object
//! construction and destruction happen outside it.
//!
//! A relaxed atomic live count is maintained for diagnostics; it may lag the
//! map momentarily under contention and must not be used for decisions.
//!
//! [`ObjectPool`]: super::object_pool::ObjectPool

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::object_pool::address_of;

// ─── ConcurrentObjectPool ─────────────────────────────────────────────────────

/// Thread-safe object pool over a single element type.
pub struct ConcurrentObjectPool<T> {
    live: Mutex<FxHashMap<usize, Arc<T>>>,
    count: AtomicUsize,
}

impl<T> Default for ConcurrentObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConcurrentObjectPool<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: Mutex::new(FxHashMap::default()),
            count: AtomicUsize::new(0),
        }
    }

    /// Moves `value` into the pool and returns a shared handle to it.
    pub fn allocate(&self, value: T) -> Arc<T> {
        let object = Arc::new(value);
        {
            let mut live = self.live.lock();
            live.insert(address_of(&object), Arc::clone(&object));
            self.count.store(live.len(), Ordering::Relaxed);
        }
        object
    }

    /// Releases the pool's ownership of one object.
    ///
    /// Returns `false` on a double free or a foreign pointer; the live set
    /// is not modified in that case.
    pub fn free(&self, object: &Arc<T>) -> bool {
        let removed = {
            let mut live = self.live.lock();
            let removed = live.remove(&address_of(object));
            self.count.store(live.len(), Ordering::Relaxed);
            removed
        };
        match removed {
            Some(_) => true,
            None => {
                log::error!(
                    "ConcurrentObjectPool::free called with an object this pool does not own"
                );
                false
            }
        }
    }

    /// Whether `object` is currently live in this pool.
    #[must_use]
    pub fn owns(&self, object: &Arc<T>) -> bool {
        self.live.lock().contains_key(&address_of(object))
    }

    /// Releases every live object.
    ///
    /// The whole map is swapped out under the lock and dropped after it is
    /// released, so no concurrent caller ever observes a half-torn-down set.
    pub fn clear(&self) {
        let harvested = {
            let mut live = self.live.lock();
            self.count.store(0, Ordering::Relaxed);
            std::mem::take(&mut *live)
        };
        drop(harvested);
    }

    /// Diagnostic live count (relaxed; may lag under contention).
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

// ─── AnyObjectPool ────────────────────────────────────────────────────────────

/// Thread-safe pool holding values of mixed types behind `dyn Any`.
///
/// The per-node type-erased destructor of the original design is the trait
/// object's own drop glue here: releasing the erased `Arc` runs the concrete
/// type's destructor.
#[derive(Default)]
pub struct AnyObjectPool {
    live: Mutex<FxHashMap<usize, Arc<dyn Any + Send + Sync>>>,
    count: AtomicUsize,
}

impl AnyObjectPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `value` into the pool and returns a typed shared handle to it.
    pub fn allocate<T: Any + Send + Sync>(&self, value: T) -> Arc<T> {
        let object = Arc::new(value);
        let erased: Arc<dyn Any + Send + Sync> = Arc::clone(&object) as _;
        {
            let mut live = self.live.lock();
            live.insert(erased_address(&erased), erased);
            self.count.store(live.len(), Ordering::Relaxed);
        }
        object
    }

    /// Releases the pool's ownership of one object.
    pub fn free<T: Any + Send + Sync>(&self, object: &Arc<T>) -> bool {
        let removed = {
            let mut live = self.live.lock();
            let removed = live.remove(&address_of(object));
            self.count.store(live.len(), Ordering::Relaxed);
            removed
        };
        match removed {
            Some(_) => true,
            None => {
                log::error!("AnyObjectPool::free called with an object this pool does not own");
                false
            }
        }
    }

    /// Releases every live object, of every type.
    pub fn clear(&self) {
        let harvested = {
            let mut live = self.live.lock();
            self.count.store(0, Ordering::Relaxed);
            std::mem::take(&mut *live)
        };
        drop(harvested);
    }

    /// Diagnostic live count.
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

/// Data-pointer identity of an erased object; matches [`address_of`] for the
/// typed handle of the same allocation.
#[inline]
fn erased_address(object: &Arc<dyn Any + Send + Sync>) -> usize {
    Arc::as_ptr(object).cast::<()>() as usize
}
