//! Small numerical helpers shared across the placement engine.

use std::sync::Arc;

use parking_lot::RwLock;

/// Lock-free-for-readers publication slot for a composite value (a matrix,
/// a vector, an alias table snapshot). Writers allocate a fresh immutable
/// value and swap it in; readers clone the `Arc` out from under a short
/// read lock and never block a writer nor each other. This stands in for
/// the source's `sync/atomic.Pointer[T]` pattern, which Rust has no direct
/// equivalent of outside a crate dedicated to it.
pub struct AtomicShared<T> {
    inner: RwLock<Arc<T>>,
}

impl<T> AtomicShared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(Arc::new(value)),
        }
    }

    /// Snapshot the currently published value.
    pub fn load(&self) -> Arc<T> {
        self.inner.read().clone()
    }

    /// Publish a new value, replacing whatever was there. Never mutates the
    /// previous value in place: any reader still holding its `Arc` keeps a
    /// consistent, unmodified view.
    pub fn store(&self, value: T) {
        *self.inner.write() = Arc::new(value);
    }
}

impl<T: Default> Default for AtomicShared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Clamp a value between `min` and `max` (inclusive).
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
