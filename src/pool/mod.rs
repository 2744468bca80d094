pub mod concurrent;
pub mod object_pool;

pub use concurrent::{AnyObjectPool, ConcurrentObjectPool};
pub use object_pool::ObjectPool;
