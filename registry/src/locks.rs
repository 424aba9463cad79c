use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One mutex per theme slug, so lifecycle operations touching the same slug
/// run one at a time while different slugs proceed in parallel.
#[derive(Debug, Default)]
pub struct SlugLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SlugLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `slug`, blocking until it is free.
    pub fn with_lock<T>(&self, slug: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.handle(slug);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(lock);
        self.release(slug);
        result
    }

    /// Runs `f` holding the locks for both slugs, taken in sorted order.
    pub fn with_locks<T>(&self, first: &str, second: &str, f: impl FnOnce() -> T) -> T {
        if first == second {
            return self.with_lock(first, f);
        }
        let (low, high) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        self.with_lock(low, || self.with_lock(high, f))
    }

    fn handle(&self, slug: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(slug.to_string()).or_default())
    }

    /// Forgets the slug's mutex once no caller holds or awaits it.
    fn release(&self, slug: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(slug).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(slug);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
