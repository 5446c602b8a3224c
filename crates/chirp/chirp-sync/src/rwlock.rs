//! Bounded, writer-preferring reader/writer lock built on a mutex and a
//! condition variable.
//!
//! # Admission rules
//!
//! **Writer (`lock`):**
//! 1. Register as a waiting writer
//! 2. Wait while any reader or writer is active
//! 3. Deregister and become the active writer
//!
//! **Reader (`read_lock`):**
//! 1. Wait while a writer is active, a writer is waiting, or the reader cap
//!    is reached
//! 2. Increment the active reader count
//!
//! The waiting-writer check comes before reader admission: once a writer is
//! queued no new reader gets in, so a steady stream of readers cannot starve
//! it. The reader cap bounds how many readers proceed before a drain.
//!
//! This lock is not reentrant. Calling `lock()` twice from one thread
//! deadlocks.

use parking_lot::{Condvar, Mutex};
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Default maximum number of concurrently admitted readers.
pub const DEFAULT_READER_CAP: usize = 32;

/// Snapshot of the lock's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockState {
    /// Active readers.
    pub readers: usize,
    /// Whether a writer currently holds the lock.
    pub writer: bool,
    /// Writers blocked in `lock()`.
    pub waiting_writers: usize,
}

impl LockState {
    #[inline]
    fn admits_reader(&self, cap: usize) -> bool {
        !self.writer && self.waiting_writers == 0 && self.readers < cap
    }

    #[inline]
    fn admits_writer(&self) -> bool {
        self.readers == 0 && !self.writer
    }
}

/// The lock protocol without any protected data.
///
/// `lock`/`unlock` and `read_lock`/`read_unlock` must be paired by the
/// caller. Prefer [`RwLock`], whose guards pair them automatically.
pub struct RawRwLock {
    state: Mutex<LockState>,
    /// Broadcast whenever the state may admit someone new.
    changed: Condvar,
    reader_cap: usize,
}

impl RawRwLock {
    pub fn new() -> Self {
        Self::with_reader_cap(DEFAULT_READER_CAP)
    }

    /// Creates a lock admitting at most `reader_cap` concurrent readers.
    ///
    /// # Panics
    /// Panics if `reader_cap` is zero; no reader could ever be admitted.
    pub fn with_reader_cap(reader_cap: usize) -> Self {
        assert!(reader_cap > 0, "reader cap must be at least 1");
        Self {
            state: Mutex::new(LockState::default()),
            changed: Condvar::new(),
            reader_cap,
        }
    }

    pub fn reader_cap(&self) -> usize {
        self.reader_cap
    }

    /// Acquires exclusive access, blocking while readers or a writer are active.
    pub fn lock(&self) {
        let mut state = self.state.lock();
        state.waiting_writers += 1;
        while !state.admits_writer() {
            self.changed.wait(&mut state);
        }
        state.waiting_writers -= 1;
        state.writer = true;
    }

    /// Releases exclusive access and wakes every blocked thread.
    pub fn unlock(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.writer, "unlock without an active writer");
        state.writer = false;
        // Readers and writers both re-check their own predicate.
        self.changed.notify_all();
    }

    /// Acquires shared access.
    pub fn read_lock(&self) {
        let mut state = self.state.lock();
        while !state.admits_reader(self.reader_cap) {
            self.changed.wait(&mut state);
        }
        state.readers += 1;
    }

    /// Releases shared access. The last reader out wakes everyone.
    pub fn read_unlock(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.readers > 0, "read_unlock without an active reader");
        state.readers -= 1;
        // Only a zero reader count can unblock a writer.
        if state.readers == 0 {
            self.changed.notify_all();
        }
    }

    /// Acquires shared access if the reader predicate admits it right now.
    pub fn try_read_lock(&self) -> bool {
        let mut state = self.state.lock();
        if !state.admits_reader(self.reader_cap) {
            return false;
        }
        state.readers += 1;
        true
    }

    /// Acquires exclusive access if nobody holds the lock right now.
    ///
    /// Does not register as a waiting writer on failure.
    pub fn try_lock(&self) -> bool {
        let mut state = self.state.lock();
        if !state.admits_writer() {
            return false;
        }
        state.writer = true;
        true
    }

    /// Current bookkeeping. Stale as soon as it returns.
    pub fn state(&self) -> LockState {
        *self.state.lock()
    }
}

impl Default for RawRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRwLock")
            .field("state", &self.state())
            .field("reader_cap", &self.reader_cap)
            .finish()
    }
}

/// A value protected by a [`RawRwLock`].
pub struct RwLock<T> {
    raw: RawRwLock,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is mediated by `raw`. Writers get exclusive
// access, readers only hand out `&T`, hence the `Sync` bound for sharing.
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    pub fn new(value: T) -> Self {
        Self::with_reader_cap(value, DEFAULT_READER_CAP)
    }

    pub fn with_reader_cap(value: T, reader_cap: usize) -> Self {
        Self {
            raw: RawRwLock::with_reader_cap(reader_cap),
            data: UnsafeCell::new(value),
        }
    }

    /// Blocks until shared access is granted.
    pub fn read(&self) -> ReadGuard<'_, T> {
        self.raw.read_lock();
        ReadGuard { lock: self }
    }

    /// Blocks until exclusive access is granted.
    pub fn write(&self) -> WriteGuard<'_, T> {
        self.raw.lock();
        WriteGuard { lock: self }
    }

    pub fn try_read(&self) -> Option<ReadGuard<'_, T>> {
        self.raw.try_read_lock().then(|| ReadGuard { lock: self })
    }

    pub fn try_write(&self) -> Option<WriteGuard<'_, T>> {
        self.raw.try_lock().then(|| WriteGuard { lock: self })
    }

    pub fn raw(&self) -> &RawRwLock {
        &self.raw
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for RwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwLock").field("raw", &self.raw).finish_non_exhaustive()
    }
}

/// Shared access; released on drop.
pub struct ReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: we hold a read admission, so no writer is active.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.read_unlock();
    }
}

/// Exclusive access; released on drop.
pub struct WriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: we are the single active writer.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: we are the single active writer.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    /// Spins until `cond` holds or panics after a generous deadline.
    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn readers_share_the_lock() {
        let lock = RwLock::new(7);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(*a + *b, 14);
        assert_eq!(lock.raw().state().readers, 2);
        assert!(lock.try_write().is_none());
        drop((a, b));
        assert_eq!(lock.raw().state(), LockState::default());
    }

    #[test]
    fn writer_excludes_readers_and_writers() {
        let lock = RwLock::new(Vec::new());
        let mut w = lock.write();
        w.push(1);
        assert!(lock.try_read().is_none());
        assert!(lock.try_write().is_none());
        drop(w);
        assert_eq!(*lock.read(), vec![1]);
    }

    #[test]
    fn reader_cap_blocks_further_admission() {
        let lock = RawRwLock::with_reader_cap(2);
        assert!(lock.try_read_lock());
        assert!(lock.try_read_lock());
        assert!(!lock.try_read_lock(), "third reader must wait for a drain");
        lock.read_unlock();
        lock.read_unlock();
        assert!(lock.try_read_lock());
        lock.read_unlock();
    }

    #[test]
    #[should_panic(expected = "reader cap must be at least 1")]
    fn zero_reader_cap_is_rejected() {
        let _ = RawRwLock::with_reader_cap(0);
    }

    /// Once a writer is queued behind an active reader, new readers are not
    /// admitted until the writer has been serviced.
    #[test]
    fn waiting_writer_blocks_new_readers() {
        let lock = Arc::new(RwLock::new(0u32));
        let first = lock.read();

        let writer = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                *lock.write() += 1;
            })
        };

        wait_until(|| lock.raw().state().waiting_writers == 1);
        assert!(lock.try_read().is_none(), "reader admitted past a waiting writer");

        let late_reader = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || *lock.read())
        };

        drop(first);
        writer.join().expect("writer panicked");
        assert_eq!(late_reader.join().expect("reader panicked"), 1, "reader ran before writer");
    }

    /// Hammers the lock from mixed readers and writers and checks at every
    /// critical section that readers and a writer never overlap.
    #[test]
    fn readers_and_writer_never_overlap() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 500;

        let lock = Arc::new(RwLock::with_reader_cap(0u64, 4));
        let active_readers = Arc::new(AtomicUsize::new(0));
        let writer_active = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let lock = Arc::clone(&lock);
                let active_readers = Arc::clone(&active_readers);
                let writer_active = Arc::clone(&writer_active);
                thread::spawn(move || {
                    for i in 0..ROUNDS {
                        if (t + i) % 3 == 0 {
                            let mut g = lock.write();
                            assert!(!writer_active.swap(true, Ordering::SeqCst));
                            assert_eq!(active_readers.load(Ordering::SeqCst), 0);
                            *g += 1;
                            writer_active.store(false, Ordering::SeqCst);
                        } else {
                            let g = lock.read();
                            let now = active_readers.fetch_add(1, Ordering::SeqCst) + 1;
                            assert!(now <= 4, "reader cap exceeded");
                            assert!(!writer_active.load(Ordering::SeqCst));
                            let _ = *g;
                            active_readers.fetch_sub(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().expect("worker panicked");
        }

        let expected = (0..THREADS)
            .flat_map(|t| (0..ROUNDS).map(move |i| (t + i) % 3 == 0))
            .filter(|w| *w)
            .count() as u64;
        assert_eq!(*lock.read(), expected);
        assert_eq!(lock.raw().state(), LockState::default());
    }
}
