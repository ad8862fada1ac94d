//! Free-list arena of reusable boxed objects.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Objects that can be handed to a new tenant after use.
pub trait Recycle: Default + Send {
    /// Drop every reference that could keep memory alive across requests.
    /// Buffers keep their capacity.
    fn recycle(&mut self);
}

/// Counters describing pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Objects built because the free list was empty.
    pub created: u64,
    /// Total successful acquisitions.
    pub acquired: u64,
    /// Total releases back to the free list.
    pub released: u64,
    /// Objects currently waiting on the free list.
    pub idle: u64,
}

impl PoolStats {
    /// Objects handed out and not yet returned.
    pub fn in_use(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// A concurrent free list of `Box<T>`.
pub struct Pool<T: Recycle> {
    free: Mutex<Vec<Box<T>>>,
    created: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl<T: Recycle> Default for Pool<T> {
    fn default() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            created: AtomicU64::new(0),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }
}

impl<T: Recycle> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("stats", &self.stats()).finish()
    }
}

impl<T: Recycle> Pool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop a recycled object, or build a fresh one when the free list is empty.
    pub fn acquire(self: &Arc<Self>) -> Pooled<T> {
        let recycled = self.free.lock().pop();
        let item = recycled.unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            Box::default()
        });
        self.acquired.fetch_add(1, Ordering::Relaxed);
        Pooled {
            item: Some(item),
            pool: Arc::clone(self),
        }
    }

    /// Clear an object and push it onto the free list.
    pub fn release(&self, mut item: Box<T>) {
        item.recycle();
        self.released.fetch_add(1, Ordering::Relaxed);
        self.free.lock().push(item);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            idle: self.free.lock().len() as u64,
        }
    }
}

/// Exclusive handle to a pooled object. Dropping it releases the object.
pub struct Pooled<T: Recycle> {
    item: Option<Box<T>>,
    pool: Arc<Pool<T>>,
}

impl<T: Recycle> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_deref().expect("pooled item taken before drop")
    }
}

impl<T: Recycle> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_deref_mut().expect("pooled item taken before drop")
    }
}

impl<T: Recycle + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.item).finish()
    }
}

impl<T: Recycle> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Scratch {
        buf: Vec<u8>,
        owner: Option<String>,
    }

    impl Recycle for Scratch {
        fn recycle(&mut self) {
            self.buf.clear();
            self.owner = None;
        }
    }

    #[test]
    fn reuses_released_objects() {
        let pool = Arc::new(Pool::<Scratch>::new());

        let mut first = pool.acquire();
        first.buf.extend_from_slice(b"hello");
        first.owner = Some("req-1".into());
        let capacity = first.buf.capacity();
        drop(first);

        let second = pool.acquire();
        assert!(second.buf.is_empty());
        assert!(second.owner.is_none());
        assert_eq!(second.buf.capacity(), capacity);

        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.acquired, 2);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.in_use(), 1);
    }

    #[test]
    fn grows_without_bound() {
        let pool = Arc::new(Pool::<Scratch>::new());
        let held: Vec<_> = (0..64).map(|_| pool.acquire()).collect();
        assert_eq!(pool.stats().created, 64);

        drop(held);
        let stats = pool.stats();
        assert_eq!(stats.idle, 64);
        assert_eq!(stats.in_use(), 0);
    }

    #[test]
    fn concurrent_acquire_release_balances() {
        let pool = Arc::new(Pool::<Scratch>::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let mut item = pool.acquire();
                        item.buf.push(1);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.acquired, 8_000);
        assert_eq!(stats.released, 8_000);
        assert!(stats.created <= 8);
    }
}
