//! Bounded single-producer / single-consumer ring.
//!
//! Power-of-two capacity with masked, monotonically wrapping head/tail
//! indices: empty iff `head == tail`, full iff `(tail + 1) & mask ==
//! head`, so one slot is sacrificed and the usable capacity is `N - 1`.
//!
//! The producer publishes with a release store of `tail` after writing
//! the slot; the consumer observes `tail` with acquire, reads the slot,
//! and advances `head` with release. Each side keeps a cache-padded
//! private copy of the opposite index and re-reads the shared atomic only
//! when that copy says full/empty, so the common path never touches the
//! other side's cache line.

use crossbeam_utils::CachePadded;
use std::cell::{Cell, UnsafeCell};
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free bounded SPSC queue.
///
/// `try_push` must only ever be called from one thread at a time, and
/// `try_pop`/`try_pop_batch` from one (possibly different) thread; the
/// type is `Sync` under exactly that discipline.
#[derive(Debug)]
pub struct SpscRing<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Consumer position; written by the consumer only.
    head: CachePadded<AtomicUsize>,
    /// Producer position; written by the producer only.
    tail: CachePadded<AtomicUsize>,
    /// Producer-private snapshot of `head`.
    cached_head: CachePadded<Cell<usize>>,
    /// Consumer-private snapshot of `tail`.
    cached_tail: CachePadded<Cell<usize>>,
}

// SAFETY: the slots are only touched by the single producer (before the
// release store of `tail`) or the single consumer (after the acquire load
// of `tail`), never both; the Cell snapshots are private to their side.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Create a ring with `capacity` slots (usable capacity
    /// `capacity - 1`).
    ///
    /// # Panics
    /// Panics if `capacity` is not a power of two or is below 2.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "ring capacity {capacity} must be a power of two"
        );
        assert!(capacity >= 2, "ring capacity {capacity} too small");

        let buffer: Box<[UnsafeCell<MaybeUninit<T>>]> = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();

        Self {
            buffer,
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            cached_head: CachePadded::new(Cell::new(0)),
            cached_tail: CachePadded::new(Cell::new(0)),
        }
    }

    /// Enqueue one element. Never blocks or allocates; returns the value
    /// back when the ring is full. Producer side only.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next_tail = (tail + 1) & self.mask;

        if next_tail == self.cached_head.get() {
            self.cached_head.set(self.head.load(Ordering::Acquire));
            if next_tail == self.cached_head.get() {
                return Err(value);
            }
        }

        // SAFETY: slot `tail` is not visible to the consumer until the
        // release store below, and only this producer writes it.
        unsafe {
            (*self.buffer[tail].get()).write(value);
        }
        self.tail.store(next_tail, Ordering::Release);
        Ok(())
    }

    /// Dequeue one element. Never blocks. Consumer side only.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);

        if head == self.cached_tail.get() {
            self.cached_tail.set(self.tail.load(Ordering::Acquire));
            if head == self.cached_tail.get() {
                return None;
            }
        }

        // SAFETY: the acquire load of `tail` ordered this slot's write
        // before us, and the producer will not touch it again until we
        // publish the new `head`.
        let value = unsafe { (*self.buffer[head].get()).assume_init_read() };
        self.head.store((head + 1) & self.mask, Ordering::Release);
        Some(value)
    }

    /// Dequeue up to `max_items` elements into `sink`, FIFO, with a
    /// single head publication at the end. Consumer side only.
    ///
    /// The sink must not panic: the batch's slots are reclaimed only by
    /// the final publication.
    pub fn try_pop_batch<F: FnMut(T)>(&self, mut sink: F, max_items: usize) -> usize {
        let head = self.head.load(Ordering::Relaxed);

        if head == self.cached_tail.get() {
            self.cached_tail.set(self.tail.load(Ordering::Acquire));
            if head == self.cached_tail.get() {
                return 0;
            }
        }

        let available = self.cached_tail.get().wrapping_sub(head) & self.mask;
        let to_pop = available.min(max_items);

        for i in 0..to_pop {
            let idx = (head + i) & self.mask;
            // SAFETY: indices `head..head + to_pop` were published by the
            // producer's release store observed above.
            sink(unsafe { (*self.buffer[idx].get()).assume_init_read() });
        }

        self.head.store((head + to_pop) & self.mask, Ordering::Release);
        to_pop
    }

    /// Whether the ring currently holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Number of elements currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head) & self.mask
    }

    /// Usable capacity (`slots - 1`).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len() - 1
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        if std::mem::needs_drop::<T>() {
            while self.try_pop().is_some() {}
        }
    }
}
