//! Slot allocation with free-list reuse.
//!
//! Slots are handed out from a free list first and from a monotonically
//! growing high-water mark otherwise, so allocation never fails. The allocator
//! is shared by all workers of a parallel pass.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe slot allocator for one slot kind.
#[derive(Debug, Default)]
pub struct SlotAllocator {
    next: AtomicUsize,
    free: Mutex<Vec<usize>>,
}

impl SlotAllocator {
    /// Allocator whose first `n` slots are already in use.
    pub fn with_used(n: usize) -> Self {
        Self {
            next: AtomicUsize::new(n),
            free: Mutex::new(Vec::new()),
        }
    }

    /// Take a slot, reusing a released one when available.
    pub fn allocate(&self) -> usize {
        if let Some(id) = self.free.lock().pop() {
            return id;
        }
        self.next.fetch_add(1, Ordering::AcqRel)
    }

    /// Return a slot to the free list.
    pub fn release(&self, id: usize) {
        let mut free = self.free.lock();
        debug_assert!(!free.contains(&id), "slot {id} released twice");
        free.push(id);
    }

    /// Number of slots ever handed out (live or released).
    pub fn capacity(&self) -> usize {
        self.next.load(Ordering::Acquire)
    }

    /// Number of slots waiting on the free list.
    pub fn free_len(&self) -> usize {
        self.free.lock().len()
    }

    /// Forget all free slots and restart the high-water mark at `n`.
    pub(crate) fn reset(&mut self, n: usize) {
        *self.next.get_mut() = n;
        self.free.get_mut().clear();
    }
}

impl Clone for SlotAllocator {
    fn clone(&self) -> Self {
        Self {
            next: AtomicUsize::new(self.capacity()),
            free: Mutex::new(self.free.lock().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_released_slots_first() {
        let slots = SlotAllocator::with_used(3);
        assert_eq!(slots.allocate(), 3);
        slots.release(1);
        assert_eq!(slots.free_len(), 1);
        assert_eq!(slots.allocate(), 1);
        assert_eq!(slots.allocate(), 4);
        assert_eq!(slots.capacity(), 5);
    }

    #[test]
    fn reset_clears_free_list() {
        let mut slots = SlotAllocator::with_used(2);
        slots.release(0);
        slots.reset(7);
        assert_eq!(slots.free_len(), 0);
        assert_eq!(slots.allocate(), 7);
    }
}
