//! # Collector
//!
//! Mark-clear and mark-compress over the object table.
//!
//! "Marked" means freed here, not reachable. There is no root scan: a slot
//! becomes garbage only through an explicit deallocation.
//!
//! ## Compaction
//!
//! ```text
//!   before:  | A | b |  C  | d | E |        (lowercase = marked)
//!   swap(1,2)| A |  C  | b | d | E |
//!   swap(2,4)| A |  C  | E | d | b |
//!   truncate | A |  C  | E |                offset = |A|+|C|+|E|
//! ```
//!
//! Each swap moves the next live slot into the front cursor position, so
//! survivors keep their relative order and end up packed from offset 0.

use crate::error::{HeapError, HeapResult};

use super::state::HeapState;

/// Result of a clear phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Marked slots finalized as garbage for this pass.
    pub garbage_slots: usize,
    /// Bytes held by those slots.
    pub garbage_bytes: usize,
}

/// Result of a compress phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompressReport {
    /// Slots dropped from the table.
    pub reclaimed_slots: usize,
    /// Bytes returned to the arena.
    pub reclaimed_bytes: usize,
    /// Swaps performed by the partition.
    pub swaps: usize,
}

/// Result of a full clear + compress pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Clear phase.
    pub clear: ClearReport,
    /// Compress phase.
    pub compress: CompressReport,
}

impl CollectReport {
    /// Returns true if the pass reclaimed nothing.
    #[inline]
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.compress.reclaimed_slots == 0
    }
}

impl HeapState {
    /// Clear phase: finalizes the garbage set for this pass.
    ///
    /// Marked slots stay marked. Their bytes are zeroed when scrubbing is
    /// enabled.
    ///
    /// # Errors
    ///
    /// [`HeapError::Destroyed`] after teardown.
    pub fn mark_clear(&mut self) -> HeapResult<ClearReport> {
        self.ensure_live()?;

        let mut report = ClearReport::default();
        for slot in self.table.slots().iter().filter(|slot| slot.marked) {
            report.garbage_slots += 1;
            report.garbage_bytes += slot.size;
            if self.scrub_freed {
                self.arena.scrub(slot.span());
            }
        }

        Ok(report)
    }

    /// Compress phase: packs live slots to the front and truncates garbage.
    ///
    /// Afterwards `count` is the number of live slots, the arena offset is
    /// the sum of their sizes and their locations ascend from 0 with no gaps.
    ///
    /// # Errors
    ///
    /// [`HeapError::Destroyed`] after teardown.
    pub fn mark_compress(&mut self) -> HeapResult<CompressReport> {
        self.ensure_live()?;

        let count = self.table.len();
        let mut front = 0;
        let mut swaps = 0;

        for index in 0..count {
            if !self.table.slots()[index].is_live() {
                continue;
            }
            if index != front {
                self.swap_unchecked(front, index);
                swaps += 1;
            }
            front += 1;
        }

        let live_bytes = match front {
            0 => 0,
            n => self.table.slots()[n - 1].end(),
        };
        let used = self.arena.used();

        self.table.truncate(front);
        self.arena.shrink_to(live_bytes);

        debug_assert!(
            self.table
                .slots()
                .iter()
                .try_fold(0, |at, slot| (slot.location == at).then(|| slot.end()))
                == Some(live_bytes),
            "compacted slots are not contiguous"
        );

        Ok(CompressReport {
            reclaimed_slots: count - front,
            reclaimed_bytes: used - live_bytes,
            swaps,
        })
    }

    /// Exchanges slots `i` and `j`: metadata and backing bytes.
    ///
    /// Slots of different sizes are handled by rotating the whole region
    /// between them, so every slot in between shifts by the size difference
    /// and the layout stays gap-free. Applying the same swap twice restores
    /// the original table and bytes.
    ///
    /// # Errors
    ///
    /// - [`HeapError::SlotOutOfRange`] if either index is `>= count`
    /// - [`HeapError::Destroyed`] after teardown
    pub fn swap(&mut self, i: usize, j: usize) -> HeapResult<()> {
        self.ensure_live()?;

        let count = self.table.len();
        for index in [i, j] {
            if index >= count {
                return Err(HeapError::SlotOutOfRange { index, count });
            }
        }

        if i != j {
            self.swap_unchecked(i.min(j), i.max(j));
        }
        Ok(())
    }

    /// Swap for `lo < hi`, both in range.
    fn swap_unchecked(&mut self, lo: usize, hi: usize) {
        let slots = self.table.slots();
        let a = slots[lo];
        let b = slots[hi];

        let start = a.location;
        let end = b.end();
        let middle = b.location - a.end();

        // A | mid | B  ->  mid | B | A  ->  B | mid | A
        let region = self.arena.bytes_mut(start..end);
        region.rotate_left(a.size);
        region[..middle + b.size].rotate_right(b.size);

        let slots = self.table.slots_mut();
        for slot in &mut slots[lo + 1..hi] {
            slot.location = slot.location - a.size + b.size;
        }
        slots[lo] = b;
        slots[lo].location = start;
        slots[hi] = a;
        slots[hi].location = end - a.size;

        if let Some(entry) = b.handle {
            self.handles.repoint(entry, lo);
        }
        if let Some(entry) = a.handle {
            self.handles.repoint(entry, hi);
        }
    }

    /// One collection pass: clear, then compress.
    ///
    /// # Errors
    ///
    /// [`HeapError::Destroyed`] after teardown.
    pub fn collect(&mut self) -> HeapResult<CollectReport> {
        let clear = self.mark_clear()?;
        let compress = self.mark_compress()?;

        if compress.reclaimed_slots > 0 {
            tracing::debug!(
                "collected {} slots ({} bytes, {} swaps)",
                compress.reclaimed_slots,
                compress.reclaimed_bytes,
                compress.swaps
            );
        }

        Ok(CollectReport { clear, compress })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::HeapConfig;
    use crate::memory::HeapHandle;

    use super::*;

    fn state(capacity: usize, max_slots: usize) -> HeapState {
        HeapState::new(&HeapConfig::manual(capacity, max_slots))
    }

    fn fill(heap: &mut HeapState, handle: HeapHandle, byte: u8) {
        heap.bytes_mut(handle).unwrap().fill(byte);
    }

    #[test]
    fn test_deallocate_then_compact() {
        let mut heap = state(256, 256);
        let a = heap.allocate(10).unwrap();
        let b = heap.allocate(20).unwrap();
        let c = heap.allocate(30).unwrap();
        fill(&mut heap, a, 0xA);
        fill(&mut heap, c, 0xC);

        heap.deallocate(b).unwrap();
        let report = heap.collect().unwrap();

        assert_eq!(report.clear.garbage_slots, 1);
        assert_eq!(report.clear.garbage_bytes, 20);
        assert_eq!(report.compress.reclaimed_slots, 1);
        assert_eq!(report.compress.reclaimed_bytes, 20);

        let snap = heap.snapshot();
        assert_eq!(snap.count(), 2);
        assert_eq!(snap.used, 40);
        assert_eq!(snap.spans(), vec![(0, 10), (10, 30)]);

        assert_eq!(heap.location(c).unwrap(), 10);
        assert!(heap.bytes(a).unwrap().iter().all(|&x| x == 0xA));
        assert!(heap.bytes(c).unwrap().iter().all(|&x| x == 0xC));
        heap.check_invariants().unwrap();
    }

    #[test]
    fn test_compaction_is_stable() {
        let mut heap = state(256, 256);
        let handles: Vec<_> = (0..4).map(|i| heap.allocate(4 + i).unwrap()).collect();
        for (i, &h) in handles.iter().enumerate() {
            fill(&mut heap, h, b'A' + i as u8);
        }

        heap.deallocate(handles[1]).unwrap();
        heap.deallocate(handles[3]).unwrap();
        heap.collect().unwrap();

        let snap = heap.snapshot();
        assert_eq!(snap.spans(), vec![(0, 4), (4, 6)]);
        assert_eq!(heap.bytes(handles[0]).unwrap(), b"AAAA");
        assert_eq!(heap.bytes(handles[2]).unwrap(), b"CCCCCC");
        heap.check_invariants().unwrap();
    }

    #[test]
    fn test_swap_twice_restores() {
        let mut heap = state(64, 8);
        let sizes = [3, 5, 2, 7];
        let handles: Vec<_> = sizes.iter().map(|&s| heap.allocate(s).unwrap()).collect();
        for (i, &h) in handles.iter().enumerate() {
            let bytes = heap.bytes_mut(h).unwrap();
            for (k, byte) in bytes.iter_mut().enumerate() {
                *byte = (i * 16 + k) as u8;
            }
        }

        let before = heap.snapshot();
        let before_bytes: Vec<Vec<u8>> =
            handles.iter().map(|&h| heap.bytes(h).unwrap().to_vec()).collect();

        heap.swap(0, 3).unwrap();
        assert_ne!(heap.snapshot(), before);
        heap.check_invariants().unwrap();
        for (i, &h) in handles.iter().enumerate() {
            assert_eq!(heap.bytes(h).unwrap(), before_bytes[i].as_slice());
        }

        heap.swap(0, 3).unwrap();
        assert_eq!(heap.snapshot(), before);
        heap.check_invariants().unwrap();
    }

    #[test]
    fn test_swap_moves_middle() {
        let mut heap = state(64, 8);
        let a = heap.allocate(2).unwrap();
        let m = heap.allocate(3).unwrap();
        let b = heap.allocate(5).unwrap();

        heap.swap(2, 0).unwrap();

        assert_eq!(heap.location(b).unwrap(), 0);
        assert_eq!(heap.location(m).unwrap(), 5);
        assert_eq!(heap.location(a).unwrap(), 8);
        assert_eq!(heap.snapshot().spans(), vec![(0, 5), (5, 3), (8, 2)]);
    }

    #[test]
    fn test_swap_out_of_range() {
        let mut heap = state(64, 8);
        heap.allocate(4).unwrap();
        assert_eq!(
            heap.swap(0, 1),
            Err(HeapError::SlotOutOfRange { index: 1, count: 1 })
        );
        assert_eq!(heap.swap(0, 0), Ok(()));
    }

    #[test]
    fn test_clear_scrubs_without_unmarking() {
        let mut heap = state(32, 4);
        let a = heap.allocate(4).unwrap();
        let _b = heap.allocate(4).unwrap();
        fill(&mut heap, a, 0xFF);
        heap.deallocate(a).unwrap();

        let report = heap.mark_clear().unwrap();
        assert_eq!(report.garbage_slots, 1);

        let snap = heap.snapshot();
        assert!(snap.slots[0].marked);
        assert_eq!(snap.count(), 2);
    }

    #[test]
    fn test_compress_without_garbage_is_noop() {
        let mut heap = state(32, 4);
        heap.allocate(4).unwrap();
        heap.allocate(4).unwrap();
        let before = heap.snapshot();

        let report = heap.collect().unwrap();
        assert!(report.is_noop());
        assert_eq!(report.compress.swaps, 0);
        assert_eq!(heap.snapshot(), before);
    }

    #[test]
    fn test_everything_freed() {
        let mut heap = state(32, 4);
        let a = heap.allocate(8).unwrap();
        let b = heap.allocate(8).unwrap();
        heap.deallocate(a).unwrap();
        heap.deallocate(b).unwrap();

        let report = heap.collect().unwrap();
        assert_eq!(report.compress.reclaimed_bytes, 16);
        assert_eq!(heap.snapshot().used, 0);
        assert_eq!(heap.snapshot().count(), 0);

        let c = heap.allocate(32).unwrap();
        assert_eq!(heap.location(c).unwrap(), 0);
    }

    #[test]
    fn test_compaction_makes_room() {
        let mut heap = state(256, 256);
        heap.allocate(100).unwrap();
        let b = heap.allocate(100).unwrap();
        assert!(heap.allocate(100).is_err());

        heap.deallocate(b).unwrap();
        heap.collect().unwrap();
        assert!(heap.allocate(100).is_ok());
    }
}
