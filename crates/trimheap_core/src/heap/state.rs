//! # Heap State
//!
//! The composite state guarded by the heap lock: arena, object table and
//! handle table. Every method here assumes the caller holds the lock, which
//! `&mut self` enforces once the state sits inside a `Mutex`.

use crate::config::HeapConfig;
use crate::error::{HeapError, HeapResult};
use crate::memory::{Arena, HandleTable, HeapHandle, ObjectTable, Slot};

/// Arena + tables, mutated only under the heap lock.
#[derive(Debug)]
pub struct HeapState {
    /// Backing bytes.
    pub(super) arena: Arena,
    /// One slot per allocation, ordered by location.
    pub(super) table: ObjectTable,
    /// Handle indirection.
    pub(super) handles: HandleTable,
    /// Zero freed bytes during the clear phase.
    pub(super) scrub_freed: bool,
    /// Set once the storage has been released.
    released: bool,
}

impl HeapState {
    /// Allocates the arena and tables described by `config`.
    ///
    /// `config` is expected to be validated already.
    #[must_use]
    pub fn new(config: &HeapConfig) -> Self {
        Self {
            arena: Arena::new(config.capacity),
            table: ObjectTable::new(config.max_slots),
            handles: HandleTable::new(config.max_slots),
            scrub_freed: config.scrub_freed,
            released: false,
        }
    }

    /// Fails with [`HeapError::Destroyed`] once the storage is gone.
    #[inline]
    pub(super) fn ensure_live(&self) -> HeapResult<()> {
        if self.released {
            return Err(HeapError::Destroyed);
        }
        Ok(())
    }

    /// Returns true once [`HeapState::release`] has run.
    #[inline]
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Bump-allocates `size` bytes and registers a new slot.
    ///
    /// All capacity checks happen before anything is mutated, so a failed
    /// call leaves the state exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`HeapError::ZeroSize`] if `size == 0`
    /// - [`HeapError::OutOfMemory`] if the arena or table is exhausted
    /// - [`HeapError::Destroyed`] after teardown
    pub fn allocate(&mut self, size: usize) -> HeapResult<HeapHandle> {
        self.ensure_live()?;

        if size == 0 {
            return Err(HeapError::ZeroSize);
        }

        if !self.arena.fits(size) || self.table.is_full() || !self.handles.has_free() {
            let err = HeapError::OutOfMemory {
                requested: size,
                remaining: self.arena.remaining(),
                slots_in_use: self.table.len(),
                max_slots: self.table.max_slots(),
            };
            tracing::warn!("{err}");
            return Err(err);
        }

        let location = self
            .arena
            .bump(size)
            .ok_or_else(|| HeapError::Corrupted("arena refused a checked bump".to_string()))?;
        let index = self
            .table
            .push(Slot {
                location,
                size,
                marked: false,
                handle: None,
            })
            .ok_or_else(|| HeapError::Corrupted("table refused a checked push".to_string()))?;
        let handle = self
            .handles
            .bind(index)
            .ok_or_else(|| HeapError::Corrupted("no free handle entry".to_string()))?;

        if let Some(slot) = self.table.get_mut(index) {
            slot.handle = Some(handle.index());
        }

        Ok(handle)
    }

    /// Marks the object behind `handle` as freed.
    ///
    /// Purely bookkeeping: the bytes stay where they are until the next
    /// collection pass. The handle goes stale immediately.
    ///
    /// # Errors
    ///
    /// - [`HeapError::UnknownHandle`] if the handle is stale or was never issued
    /// - [`HeapError::Destroyed`] after teardown
    pub fn deallocate(&mut self, handle: HeapHandle) -> HeapResult<()> {
        self.ensure_live()?;

        let index = self
            .handles
            .release(handle)
            .ok_or(HeapError::UnknownHandle(handle))?;
        let slot = self
            .table
            .get_mut(index)
            .ok_or_else(|| HeapError::Corrupted(format!("handle points past slot {index}")))?;

        slot.marked = true;
        slot.handle = None;
        Ok(())
    }

    /// Current slot for `handle`.
    fn slot_of(&self, handle: HeapHandle) -> HeapResult<Slot> {
        self.ensure_live()?;
        self.handles
            .resolve(handle)
            .and_then(|index| self.table.get(index))
            .copied()
            .ok_or(HeapError::UnknownHandle(handle))
    }

    /// Bytes of the object behind `handle`.
    ///
    /// # Errors
    ///
    /// [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`].
    pub fn bytes(&self, handle: HeapHandle) -> HeapResult<&[u8]> {
        let slot = self.slot_of(handle)?;
        Ok(self.arena.bytes(slot.span()))
    }

    /// Mutable bytes of the object behind `handle`.
    ///
    /// # Errors
    ///
    /// [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`].
    pub fn bytes_mut(&mut self, handle: HeapHandle) -> HeapResult<&mut [u8]> {
        let slot = self.slot_of(handle)?;
        Ok(self.arena.bytes_mut(slot.span()))
    }

    /// Current arena offset of the object behind `handle`.
    ///
    /// # Errors
    ///
    /// [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`].
    pub fn location(&self, handle: HeapHandle) -> HeapResult<usize> {
        self.slot_of(handle).map(|slot| slot.location)
    }

    /// Size in bytes of the object behind `handle`.
    ///
    /// # Errors
    ///
    /// [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`].
    pub fn size_of(&self, handle: HeapHandle) -> HeapResult<usize> {
        self.slot_of(handle).map(|slot| slot.size)
    }

    /// Copies out the current layout.
    #[must_use]
    pub fn snapshot(&self) -> HeapSnapshot {
        HeapSnapshot {
            capacity: self.arena.capacity(),
            used: self.arena.used(),
            max_slots: self.table.max_slots(),
            slots: self.table.slots().to_vec(),
        }
    }

    /// Verifies every layout invariant.
    ///
    /// # Errors
    ///
    /// [`HeapError::Corrupted`] naming the first violation, or
    /// [`HeapError::Destroyed`] after teardown.
    pub fn check_invariants(&self) -> HeapResult<()> {
        self.ensure_live()?;

        let used = self.arena.used();
        if used > self.arena.capacity() {
            return Err(HeapError::Corrupted(format!(
                "offset {used} exceeds capacity {}",
                self.arena.capacity()
            )));
        }
        if self.table.len() > self.table.max_slots() {
            return Err(HeapError::Corrupted(format!(
                "count {} exceeds max slots {}",
                self.table.len(),
                self.table.max_slots()
            )));
        }

        let mut expected = 0;
        let mut live = 0;
        for (index, slot) in self.table.slots().iter().enumerate() {
            if slot.location != expected || slot.size == 0 {
                return Err(HeapError::Corrupted(format!(
                    "slot {index} at {}+{} breaks tiling (expected start {expected})",
                    slot.location, slot.size
                )));
            }
            expected = slot.end();

            match (slot.marked, slot.handle) {
                (false, Some(entry)) => {
                    if self.handles.target(entry) != Some(index) {
                        return Err(HeapError::Corrupted(format!(
                            "handle entry {entry} does not point back at slot {index}"
                        )));
                    }
                    live += 1;
                }
                (true, None) => {}
                (marked, handle) => {
                    return Err(HeapError::Corrupted(format!(
                        "slot {index} marked={marked} with handle {handle:?}"
                    )));
                }
            }
        }

        if expected != used {
            return Err(HeapError::Corrupted(format!(
                "slots end at {expected} but offset is {used}"
            )));
        }
        if self.handles.bound_count() != live {
            return Err(HeapError::Corrupted(format!(
                "{} handles bound for {live} live slots",
                self.handles.bound_count()
            )));
        }
        for (entry, index) in self.handles.bound() {
            let owner = self.table.get(index).and_then(|slot| slot.handle);
            if owner != Some(entry) {
                return Err(HeapError::Corrupted(format!(
                    "handle entry {entry} points at slot {index} owned by {owner:?}"
                )));
            }
        }

        Ok(())
    }

    /// Drops arena and table storage.
    ///
    /// # Errors
    ///
    /// [`HeapError::AlreadyDestroyed`] if the storage is already gone.
    pub fn release(&mut self) -> HeapResult<()> {
        if self.released {
            return Err(HeapError::AlreadyDestroyed);
        }
        self.arena.release();
        self.table.release();
        self.handles.release_all();
        self.released = true;
        Ok(())
    }
}

/// Point-in-time copy of the heap layout, taken under the lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapSnapshot {
    /// Arena capacity in bytes.
    pub capacity: usize,
    /// Arena offset.
    pub used: usize,
    /// Object table capacity.
    pub max_slots: usize,
    /// Occupied slots in table order.
    pub slots: Vec<Slot>,
}

impl HeapSnapshot {
    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Slots still holding live objects.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_live()).count()
    }

    /// Slots freed but not yet reclaimed.
    #[must_use]
    pub fn marked_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.marked).count()
    }

    /// `(location, size)` of every slot, in table order.
    #[must_use]
    pub fn spans(&self) -> Vec<(usize, usize)> {
        self.slots.iter().map(|slot| (slot.location, slot.size)).collect()
    }
}
