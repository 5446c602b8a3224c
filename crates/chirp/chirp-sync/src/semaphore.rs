//! Counting semaphore built from a mutex and a condition variable.
//!
//! The orchestrator uses it as a work-availability signal: every queued
//! request is paired with exactly one `up()`, and every worker blocks in
//! `down()` until a request (or the shutdown flood) is available.
//!
//! # Protocol
//!
//! **up:**
//! 1. Lock the counter
//! 2. Increment it
//! 3. Notify at most one blocked `down()` caller
//!
//! **down:**
//! 1. Lock the counter
//! 2. While it is zero, wait on the condition variable
//! 3. Decrement it
//!
//! Which blocked waiter wakes on a given `up()` is unspecified; only that
//! some waiter makes progress.

use parking_lot::{Condvar, Mutex};

/// A non-negative permit counter plus the set of threads blocked on it.
#[derive(Debug, Default)]
pub struct Semaphore {
    /// Available permits. Never negative by construction (`usize`).
    count: Mutex<usize>,
    /// Signalled once per `up()`.
    available: Condvar,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` available units.
    pub fn new(permits: usize) -> Self {
        Self {
            count: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Releases one permit and wakes at most one blocked `down()` caller.
    pub fn up(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.available.notify_one();
    }

    /// Blocks until a permit is available, then takes it.
    pub fn down(&self) {
        let mut count = self.count.lock();
        // Condvar waits may wake spuriously; re-check the count every time.
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
    }

    /// Takes a permit if one is available without blocking.
    ///
    /// Returns `true` when a permit was taken.
    pub fn try_down(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Snapshot of the available permits. Stale as soon as it returns.
    pub fn available(&self) -> usize {
        *self.count.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn down_consumes_initial_permits() {
        let sem = Semaphore::new(2);
        sem.down();
        sem.down();
        assert_eq!(sem.available(), 0);
        assert!(!sem.try_down());
    }

    #[test]
    fn up_then_down_leaves_count_unchanged() {
        let sem = Semaphore::new(0);
        sem.up();
        assert_eq!(sem.available(), 1);
        assert!(sem.try_down());
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn up_releases_a_blocked_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let woke = Arc::new(AtomicUsize::new(0));

        let waiter = {
            let sem = Arc::clone(&sem);
            let woke = Arc::clone(&woke);
            thread::spawn(move || {
                sem.down();
                woke.fetch_add(1, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(woke.load(Ordering::SeqCst), 0, "waiter must block on an empty semaphore");

        sem.up();
        waiter.join().expect("waiter panicked");
        assert_eq!(woke.load(Ordering::SeqCst), 1);
        assert_eq!(sem.available(), 0);
    }

    /// Every `up()` is matched by exactly one completed `down()` once all
    /// waiters have drained, no matter how the wakeups interleave.
    #[test]
    fn downs_match_ups_across_threads() {
        const WAITERS: usize = 8;
        const PER_WAITER: usize = 250;

        let sem = Arc::new(Semaphore::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..WAITERS)
            .map(|_| {
                let sem = Arc::clone(&sem);
                let completed = Arc::clone(&completed);
                thread::spawn(move || {
                    for _ in 0..PER_WAITER {
                        sem.down();
                        completed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for _ in 0..WAITERS * PER_WAITER {
            sem.up();
        }
        for h in handles {
            h.join().expect("waiter panicked");
        }

        assert_eq!(completed.load(Ordering::SeqCst), WAITERS * PER_WAITER);
        assert_eq!(sem.available(), 0);
    }
}
