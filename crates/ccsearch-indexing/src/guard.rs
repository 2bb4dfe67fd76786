//! Single-flight guard for sync cycles.
//!
//! Lock-free: an `AtomicBool` flipped with compare-exchange, released by an
//! RAII permit on every exit path including unwinding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct SyncGuard {
    is_running: Arc<AtomicBool>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a permit if no cycle is running, `None` otherwise.
    pub fn try_acquire(&self) -> Option<SyncPermit> {
        self.is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SyncPermit {
                flag: self.is_running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

/// Releases the running flag when dropped.
#[derive(Debug)]
pub struct SyncPermit {
    flag: Arc<AtomicBool>,
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive() {
        let guard = SyncGuard::new();

        let first = guard.try_acquire();
        assert!(first.is_some());
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());

        drop(first);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_guard_released_on_panic() {
        let guard = Arc::new(SyncGuard::new());
        let inner = guard.clone();

        let result = std::thread::spawn(move || {
            let _permit = inner.try_acquire().unwrap();
            panic!("cycle panicked");
        })
        .join();

        assert!(result.is_err());
        assert!(!guard.is_running());
    }
}
