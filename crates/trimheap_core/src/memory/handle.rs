//! # Heap Handles
//!
//! Compaction moves bytes, so callers never hold arena offsets. They hold
//! handles instead:
//! - An index into the handle table
//! - A generation counter for detecting stale handles

/// Opaque, stable reference to an object in the heap.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into the handle table
/// - Upper 32 bits: Generation counter for detecting stale references
///
/// A handle stays valid across any number of collection passes until the
/// object is deallocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct HeapHandle(u64);

impl HeapHandle {
    /// Creates a handle from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the handle table index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns the packed representation.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from [`HeapHandle::to_raw`].
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Null/invalid handle. Never resolves.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this handle is null.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for HeapHandle {
    fn default() -> Self {
        Self::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_parts() {
        let handle = HeapHandle::new(12345, 67890);
        assert_eq!(handle.index(), 12345);
        assert_eq!(handle.generation(), 67890);
        assert_eq!(HeapHandle::from_raw(handle.to_raw()), handle);
    }

    #[test]
    fn test_null_handle() {
        assert!(HeapHandle::default().is_null());
        assert!(!HeapHandle::new(0, 0).is_null());
    }
}
