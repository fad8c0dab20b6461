//! Lock-free order pool for zero-allocation book mutation.
//!
//! The pool pre-allocates a slab of cache-line-aligned [`Order`] slots and
//! threads a LIFO free list through the unused ones. `allocate` pops via
//! CAS on the head, `release` pushes via CAS. In this engine both calls
//! happen on the matcher thread, so the loops run uncontended; the CAS
//! protocol keeps the structure sound if that assumption is ever relaxed
//! (slots may be handed back from another thread).
//!
//! # ABA prevention
//! The head is a tagged `AtomicU64`: a 32-bit generation counter in the
//! upper half, the slot index in the lower half. Every successful CAS
//! bumps the generation, so a head value can never be observed twice with
//! different successors.

use crate::order::{Order, NIL};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default pool capacity (orders).
pub const DEFAULT_POOL_CAPACITY: usize = 1_000_000;

#[inline(always)]
fn pack_tagged(generation: u32, index: u32) -> u64 {
    (u64::from(generation) << 32) | u64::from(index)
}

#[inline(always)]
#[allow(clippy::cast_possible_truncation)]
fn unpack_generation(tagged: u64) -> u32 {
    (tagged >> 32) as u32
}

#[inline(always)]
#[allow(clippy::cast_possible_truncation)]
fn unpack_index(tagged: u64) -> u32 {
    tagged as u32
}

/// Fixed-capacity slab of [`Order`] slots with a lock-free free list.
///
/// `allocate`/`release` work on slot indices, not references: a resting
/// order outlives any single borrow of the pool, so the matcher addresses
/// slots by index and resolves them with [`get`](Self::get) /
/// [`get_mut`](Self::get_mut) when it holds the pool.
#[derive(Debug)]
pub struct OrderPool {
    slots: Box<[Order]>,
    /// Per-slot successor in the free list (plain index, `NIL` terminated).
    next: Box<[AtomicU64]>,
    /// Tagged head: generation in the upper 32 bits, index below.
    free_head: AtomicU64,
    in_use: AtomicUsize,
}

impl OrderPool {
    /// Create a pool with `capacity` pre-allocated order slots.
    ///
    /// # Panics
    /// Panics if `capacity` is zero or does not fit the 32-bit index
    /// space (`u32::MAX` is the `NIL` sentinel).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "order pool capacity must be non-zero");
        assert!(
            capacity < NIL as usize,
            "order pool capacity {capacity} exceeds index space"
        );

        let slots = vec![Order::default(); capacity].into_boxed_slice();
        let next: Box<[AtomicU64]> = (0..capacity)
            .map(|i| {
                let succ = if i + 1 < capacity { (i + 1) as u32 } else { NIL };
                AtomicU64::new(u64::from(succ))
            })
            .collect();

        Self {
            slots,
            next,
            free_head: AtomicU64::new(pack_tagged(0, 0)),
            in_use: AtomicUsize::new(0),
        }
    }

    /// Pop a free slot. Returns `None` when the pool is exhausted.
    #[inline]
    pub fn allocate(&self) -> Option<u32> {
        loop {
            let head = self.free_head.load(Ordering::Acquire);
            let index = unpack_index(head);
            if index == NIL {
                return None;
            }

            let successor = unpack_index(self.next[index as usize].load(Ordering::Acquire));
            let new_head = pack_tagged(unpack_generation(head).wrapping_add(1), successor);

            if self
                .free_head
                .compare_exchange_weak(head, new_head, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                self.in_use.fetch_add(1, Ordering::Relaxed);
                return Some(index);
            }
        }
    }

    /// Push a slot back onto the free list.
    ///
    /// The slot must have come from [`allocate`](Self::allocate) and must
    /// not be referenced by any book.
    #[inline]
    pub fn release(&self, slot: u32) {
        debug_assert!((slot as usize) < self.slots.len(), "release of invalid slot");

        loop {
            let head = self.free_head.load(Ordering::Acquire);
            self.next[slot as usize].store(u64::from(unpack_index(head)), Ordering::Release);
            let new_head = pack_tagged(unpack_generation(head).wrapping_add(1), slot);

            if self
                .free_head
                .compare_exchange_weak(head, new_head, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                self.in_use.fetch_sub(1, Ordering::Relaxed);
                return;
            }
        }
    }

    /// Resolve a slot index to its order.
    #[inline]
    #[must_use]
    pub fn get(&self, slot: u32) -> &Order {
        &self.slots[slot as usize]
    }

    /// Resolve a slot index to its order, mutably.
    #[inline]
    pub fn get_mut(&mut self, slot: u32) -> &mut Order {
        &mut self.slots[slot as usize]
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of currently allocated slots (eventually consistent).
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    /// Number of slots still available.
    #[must_use]
    pub fn available(&self) -> usize {
        self.capacity() - self.in_use()
    }
}
