//! State shared by the producer and every worker of one parallel run.
//!
//! # Shutdown protocol
//!
//! Every queued request is paired with exactly one `signal_work()`, issued
//! after the enqueue. On shutdown the producer sets the flag first, then
//! releases one extra permit per worker (the flood). A worker that wakes,
//! finds the queue empty and sees the flag exits; each worker is
//! guaranteed at least one such wake.

use chirp_sync::Semaphore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug)]
pub struct SharedContext {
    workers: usize,
    shutdown: AtomicBool,
    work: Semaphore,
    /// Responses successfully written across all workers.
    responses: AtomicUsize,
    write_failures: AtomicUsize,
}

impl SharedContext {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            shutdown: AtomicBool::new(false),
            work: Semaphore::new(0),
            responses: AtomicUsize::new(0),
            write_failures: AtomicUsize::new(0),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Announces one queued request.
    #[inline]
    pub fn signal_work(&self) {
        self.work.up();
    }

    /// Blocks until a request or a shutdown permit is available.
    #[inline]
    pub fn wait_for_work(&self) {
        self.work.down();
    }

    /// Raises the shutdown flag, then wakes every worker once.
    pub fn shut_down(&self) {
        self.shutdown.store(true, Ordering::Release);
        for _ in 0..self.workers {
            self.work.up();
        }
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn record_response(&self, written: bool) {
        let counter = if written {
            &self.responses
        } else {
            &self.write_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn responses(&self) -> usize {
        self.responses.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> usize {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Permits not yet taken by a worker.
    pub fn pending_signals(&self) -> usize {
        self.work.available()
    }
}
