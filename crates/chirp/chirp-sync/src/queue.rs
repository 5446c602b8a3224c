//! Unbounded multi-producer, multi-consumer FIFO queue (Michael–Scott).
//!
//! The queue is a singly linked list with a sentinel head. `head` always
//! points at the sentinel; the first real item lives in `head.next`.
//! `tail` points at the last node or lags one step behind it, and any
//! thread that observes the lag helps advance it.
//!
//! # Design
//! - **Enqueue**: link the new node after the last node with a CAS on
//!   `tail.next`, then try to swing `tail` (best effort).
//! - **Dequeue**: CAS `head` forward to `head.next`; the winner moves the
//!   payload out of the node that just became the new sentinel.
//! - No locks anywhere. Some thread always completes under contention.
//!
//! # Memory reclamation
//! A node unlinked by `dequeue` may still be read by a thread that loaded
//! it as `head` a moment earlier. Nodes are retired through `crossbeam`'s
//! epoch collector and freed only once every pinned thread has moved on.

use crossbeam::epoch::{self, Atomic, Owned, Shared};
use crossbeam::utils::CachePadded;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

struct Node<T> {
    /// Initialised for every node linked by `enqueue`. Moved out exactly
    /// once, by the dequeuer whose CAS turns the node into the sentinel.
    /// The sentinel's payload is always logically uninitialised.
    data: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> Self {
        Self {
            data: MaybeUninit::uninit(),
            next: Atomic::null(),
        }
    }
}

/// Lock-free FIFO queue of `T`.
pub struct LockFreeQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
}

// SAFETY: items are moved between threads, never shared.
unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> LockFreeQueue<T> {
    /// Creates an empty queue holding only the sentinel.
    pub fn new() -> Self {
        let queue = Self {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
        };
        // SAFETY: the queue is not shared yet, so no guard is needed.
        unsafe {
            let guard = epoch::unprotected();
            let sentinel = Owned::new(Node::sentinel()).into_shared(guard);
            queue.head.store(sentinel, Relaxed);
            queue.tail.store(sentinel, Relaxed);
        }
        queue
    }

    /// Appends `value` at the tail.
    pub fn enqueue(&self, value: T) {
        let guard = &epoch::pin();
        let new = Owned::new(Node {
            data: MaybeUninit::new(value),
            next: Atomic::null(),
        })
        .into_shared(guard);

        loop {
            let tail = self.tail.load(Acquire, guard);
            // SAFETY: `tail` is never null and the guard keeps it alive.
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Acquire, guard);

            // Tail moved while we were reading `next`; start over.
            if tail != self.tail.load(Acquire, guard) {
                continue;
            }

            if next.is_null() {
                if tail_ref
                    .next
                    .compare_exchange(Shared::null(), new, Release, Relaxed, guard)
                    .is_ok()
                {
                    // Best effort; a later operation will fix a lagging tail.
                    let _ = self.tail.compare_exchange(tail, new, Release, Relaxed, guard);
                    return;
                }
            } else {
                // Someone linked a node but has not swung tail yet; help.
                let _ = self.tail.compare_exchange(tail, next, Release, Relaxed, guard);
            }
        }
    }

    /// Removes and returns the item at the head, or `None` if the queue is
    /// empty. Never blocks.
    pub fn dequeue(&self) -> Option<T> {
        let guard = &epoch::pin();
        loop {
            let head = self.head.load(Acquire, guard);
            let tail = self.tail.load(Acquire, guard);
            // SAFETY: `head` is never null and the guard keeps it alive.
            let next = unsafe { head.deref() }.next.load(Acquire, guard);

            if head != self.head.load(Acquire, guard) {
                continue;
            }

            if head == tail {
                if next.is_null() {
                    return None;
                }
                // Tail lags behind a linked node; help and retry.
                let _ = self.tail.compare_exchange(tail, next, Release, Relaxed, guard);
                continue;
            }

            if next.is_null() {
                // Inconsistent snapshot, `head` moved under us.
                continue;
            }

            if self
                .head
                .compare_exchange(head, next, Release, Relaxed, guard)
                .is_ok()
            {
                // SAFETY: winning the CAS makes `next` the new sentinel and
                // us the only thread allowed to take its payload. `head`
                // is unreachable from the queue now; the collector frees it
                // once no pinned thread can still hold it.
                unsafe {
                    let value = next.deref().data.assume_init_read();
                    guard.defer_destroy(head);
                    return Some(value);
                }
            }
        }
    }

    /// Whether the queue held no items at the instant it was sampled.
    ///
    /// Advisory only under concurrent mutation.
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Acquire, guard);
        let tail = self.tail.load(Acquire, guard);
        // SAFETY: `head` is never null and the guard keeps it alive.
        let next = unsafe { head.deref() }.next.load(Acquire, guard);
        head == tail && next.is_null()
    }
}

impl<T> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
        // SAFETY: `&mut self` means no other thread can touch the queue;
        // the remaining node is the sentinel, whose payload is uninit.
        unsafe {
            let guard = epoch::unprotected();
            let sentinel = self.head.load(Relaxed, guard);
            drop(sentinel.into_owned());
        }
    }
}

impl<T> fmt::Debug for LockFreeQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("is_empty", &self.is_empty())
            .finish()
    }
}
