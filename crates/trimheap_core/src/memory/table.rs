//! # Object Table
//!
//! Fixed-capacity bookkeeping for everything carved out of the arena.
//!
//! Two tables work together:
//! - [`ObjectTable`]: one [`Slot`] per allocation, ordered by location
//! - [`HandleTable`]: stable indirection from [`HeapHandle`] to slot index
//!
//! Slots move around inside the object table during compaction; handles do
//! not. Every live slot carries the index of its handle entry so the entry
//! can be re-pointed whenever the slot changes position.

use std::ops::Range;

use super::HeapHandle;

/// Bookkeeping record for one allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    /// Offset into the arena.
    pub location: usize,
    /// Length in bytes.
    pub size: usize,
    /// `true` once the object has been freed and is waiting for reclamation.
    pub marked: bool,
    /// Handle table entry resolving to this slot. `None` once marked.
    pub(crate) handle: Option<u32>,
}

impl Slot {
    /// One past the last byte of this slot.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.location + self.size
    }

    /// Arena range covered by this slot.
    #[inline]
    #[must_use]
    pub const fn span(&self) -> Range<usize> {
        self.location..self.end()
    }

    /// Returns true if the slot still holds a live object.
    #[inline]
    #[must_use]
    pub const fn is_live(&self) -> bool {
        !self.marked
    }
}

/// Fixed-capacity ordered sequence of slots.
///
/// Storage is reserved up front; pushing never reallocates.
#[derive(Debug)]
pub struct ObjectTable {
    /// Occupied entries, `slots.len()` is the count.
    slots: Vec<Slot>,
    /// Capacity.
    max_slots: usize,
}

impl ObjectTable {
    /// Creates an empty table with room for `max_slots` entries.
    #[must_use]
    pub fn new(max_slots: usize) -> Self {
        Self {
            slots: Vec::with_capacity(max_slots),
            max_slots,
        }
    }

    /// Number of occupied entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no entries are occupied.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true if no more entries fit.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.max_slots
    }

    /// Table capacity.
    #[inline]
    #[must_use]
    pub const fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Appends a slot, returning its index, or `None` if the table is full.
    pub fn push(&mut self, slot: Slot) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        self.slots.push(slot);
        Some(self.slots.len() - 1)
    }

    /// Slot at `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Mutable slot at `index`.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    /// All occupied entries in table order.
    #[inline]
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Mutable view of all occupied entries.
    #[inline]
    pub fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.slots
    }

    /// Drops every entry at or after `len`.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.slots.truncate(len);
    }

    /// Releases the reserved storage.
    pub fn release(&mut self) {
        self.slots = Vec::new();
        self.max_slots = 0;
    }
}

/// One handle table entry.
#[derive(Clone, Copy, Debug, Default)]
struct HandleEntry {
    /// Object table index, `None` while the entry is free.
    slot: Option<usize>,
    /// Bumped every time the entry is released.
    generation: u32,
}

/// Generation-checked indirection from handles to object table indices.
///
/// Free entries are recycled in LIFO order.
#[derive(Debug)]
pub struct HandleTable {
    /// The entries.
    entries: Box<[HandleEntry]>,
    /// Indices of free entries.
    free_list: Vec<u32>,
}

impl HandleTable {
    /// Creates a table with `capacity` free entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` does not fit in a `u32`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let top = u32::try_from(capacity).expect("handle table capacity exceeds u32");
        Self {
            entries: vec![HandleEntry::default(); capacity].into_boxed_slice(),
            free_list: (0..top).rev().collect(),
        }
    }

    /// Returns true if a handle can be issued.
    #[inline]
    #[must_use]
    pub fn has_free(&self) -> bool {
        !self.free_list.is_empty()
    }

    /// Number of handles currently bound.
    #[inline]
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.entries.len() - self.free_list.len()
    }

    /// Binds a free entry to `slot` and returns its handle.
    pub fn bind(&mut self, slot: usize) -> Option<HeapHandle> {
        let index = self.free_list.pop()?;
        let entry = &mut self.entries[index as usize];
        entry.slot = Some(slot);
        Some(HeapHandle::new(index, entry.generation))
    }

    /// Object table index for `handle`, if it is current.
    #[inline]
    #[must_use]
    pub fn resolve(&self, handle: HeapHandle) -> Option<usize> {
        let entry = self.entries.get(handle.index() as usize)?;
        if entry.generation != handle.generation() {
            return None;
        }
        entry.slot
    }

    /// Releases `handle`, returning the slot index it pointed at.
    ///
    /// The entry's generation is bumped so `handle` never resolves again.
    pub fn release(&mut self, handle: HeapHandle) -> Option<usize> {
        let slot = self.resolve(handle)?;
        let entry = &mut self.entries[handle.index() as usize];
        entry.slot = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free_list.push(handle.index());
        Some(slot)
    }

    /// Points entry `index` at a new slot position.
    #[inline]
    pub fn repoint(&mut self, index: u32, slot: usize) {
        if let Some(entry) = self.entries.get_mut(index as usize) {
            entry.slot = Some(slot);
        }
    }

    /// Slot index entry `index` currently points at, ignoring generation.
    #[inline]
    #[must_use]
    pub fn target(&self, index: u32) -> Option<usize> {
        self.entries.get(index as usize)?.slot
    }

    /// Iterates over `(entry index, slot index)` for every bound entry.
    pub fn bound(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.entries
            .iter()
            .zip(0u32..)
            .filter_map(|(entry, index)| entry.slot.map(|slot| (index, slot)))
    }

    /// Releases the reserved storage. Nothing resolves afterwards.
    pub fn release_all(&mut self) {
        self.entries = Box::default();
        self.free_list = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(location: usize, size: usize) -> Slot {
        Slot {
            location,
            size,
            marked: false,
            handle: None,
        }
    }

    #[test]
    fn test_table_push_until_full() {
        let mut table = ObjectTable::new(2);
        assert_eq!(table.push(slot(0, 4)), Some(0));
        assert_eq!(table.push(slot(4, 4)), Some(1));
        assert!(table.is_full());
        assert!(table.push(slot(8, 4)).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_slot_span() {
        let s = slot(10, 20);
        assert_eq!(s.end(), 30);
        assert_eq!(s.span(), 10..30);
        assert!(s.is_live());
    }

    #[test]
    fn test_handle_bind_resolve_release() {
        let mut handles = HandleTable::new(4);
        let h = handles.bind(7).unwrap();
        assert_eq!(handles.resolve(h), Some(7));
        assert_eq!(handles.bound_count(), 1);

        assert_eq!(handles.release(h), Some(7));
        assert_eq!(handles.resolve(h), None);
        assert_eq!(handles.release(h), None);
        assert_eq!(handles.bound_count(), 0);
    }

    #[test]
    fn test_recycled_entry_rejects_stale_handle() {
        let mut handles = HandleTable::new(1);
        let first = handles.bind(0).unwrap();
        handles.release(first);

        let second = handles.bind(3).unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert_eq!(handles.resolve(first), None);
        assert_eq!(handles.resolve(second), Some(3));
    }

    #[test]
    fn test_handle_table_exhaustion() {
        let mut handles = HandleTable::new(1);
        assert!(handles.bind(0).is_some());
        assert!(!handles.has_free());
        assert!(handles.bind(1).is_none());
    }

    #[test]
    fn test_repoint() {
        let mut handles = HandleTable::new(2);
        let h = handles.bind(0).unwrap();
        handles.repoint(h.index(), 5);
        assert_eq!(handles.resolve(h), Some(5));
        assert_eq!(handles.bound().collect::<Vec<_>>(), vec![(h.index(), 5)]);
    }

    #[test]
    fn test_unknown_index() {
        let handles = HandleTable::new(2);
        assert_eq!(handles.resolve(HeapHandle::NULL), None);
        assert_eq!(handles.resolve(HeapHandle::new(0, 0)), None);
    }
}
