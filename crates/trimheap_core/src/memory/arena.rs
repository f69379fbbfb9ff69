//! # Arena
//!
//! A fixed-size byte buffer carved up by a monotonically advancing offset.

use std::ops::Range;

/// A bump-pointer arena with a fixed byte budget.
///
/// Allocations are fast (just bump an offset). Space only comes back when the
/// collector slides live data down and calls [`Arena::shrink_to`].
///
/// # Thread Safety
///
/// The arena itself is not synchronized. It lives inside the heap state and
/// is only touched while the heap lock is held.
pub struct Arena {
    /// The backing storage.
    storage: Box<[u8]>,
    /// Current allocation offset. Everything in `[0, offset)` belongs to a slot.
    offset: usize,
    /// Total capacity.
    capacity: usize,
}

impl Arena {
    /// Creates a zeroed arena with the specified capacity in bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let storage = vec![0u8; capacity].into_boxed_slice();
        Self {
            storage,
            offset: 0,
            capacity,
        }
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current used space in bytes.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.offset
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.capacity - self.offset
    }

    /// Returns true if `size` more bytes fit.
    #[inline]
    #[must_use]
    pub const fn fits(&self, size: usize) -> bool {
        size <= self.remaining()
    }

    /// Reserves `size` bytes at the current offset and returns their location.
    ///
    /// The reserved bytes are zeroed. Returns `None` without touching the
    /// offset if the arena is full.
    pub fn bump(&mut self, size: usize) -> Option<usize> {
        if !self.fits(size) {
            return None;
        }

        let location = self.offset;
        self.offset += size;
        self.storage[location..self.offset].fill(0);

        Some(location)
    }

    /// Moves the offset back to `new_offset`.
    ///
    /// # Panics
    ///
    /// Panics if `new_offset` is past the current offset.
    pub fn shrink_to(&mut self, new_offset: usize) {
        assert!(
            new_offset <= self.offset,
            "arena can only shrink: {new_offset} > {}",
            self.offset
        );
        self.offset = new_offset;
    }

    /// Bytes in `range`.
    #[inline]
    #[must_use]
    pub fn bytes(&self, range: Range<usize>) -> &[u8] {
        &self.storage[range]
    }

    /// Mutable bytes in `range`.
    #[inline]
    pub fn bytes_mut(&mut self, range: Range<usize>) -> &mut [u8] {
        &mut self.storage[range]
    }

    /// Zeroes `range`.
    #[inline]
    pub fn scrub(&mut self, range: Range<usize>) {
        self.storage[range].fill(0);
    }

    /// Drops the backing storage. The arena reports zero capacity afterwards.
    pub fn release(&mut self) {
        self.storage = Box::default();
        self.offset = 0;
        self.capacity = 0;
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("offset", &self.offset)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_bump() {
        let mut arena = Arena::new(64);
        assert_eq!(arena.bump(10), Some(0));
        assert_eq!(arena.bump(20), Some(10));
        assert_eq!(arena.used(), 30);
        assert_eq!(arena.remaining(), 34);
    }

    #[test]
    fn test_arena_full() {
        let mut arena = Arena::new(256);
        assert_eq!(arena.bump(200), Some(0));
        assert!(arena.bump(100).is_none());
        assert_eq!(arena.used(), 200);
        assert_eq!(arena.bump(56), Some(200));
        assert_eq!(arena.remaining(), 0);
    }

    #[test]
    fn test_bump_zeroes_reused_space() {
        let mut arena = Arena::new(8);
        let at = arena.bump(8).unwrap();
        arena.bytes_mut(at..at + 8).fill(0xAB);

        arena.shrink_to(0);
        let at = arena.bump(4).unwrap();
        assert_eq!(arena.bytes(at..at + 4), &[0, 0, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "arena can only shrink")]
    fn test_shrink_past_offset_panics() {
        let mut arena = Arena::new(8);
        arena.shrink_to(4);
    }

    #[test]
    fn test_release() {
        let mut arena = Arena::new(32);
        let _ = arena.bump(16);
        arena.release();
        assert_eq!(arena.capacity(), 0);
        assert_eq!(arena.used(), 0);
        assert!(arena.bump(1).is_none());
    }
}
