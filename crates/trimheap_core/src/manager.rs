//! # Memory Manager
//!
//! Owns one heap: the arena, the object table, the lock and the trim thread.
//!
//! ```rust,ignore
//! use trimheap_core::{HeapConfig, MemoryManager};
//!
//! let heap = MemoryManager::new(HeapConfig::with_limits(4096, 256))?;
//!
//! let handle = heap.allocate_value(&42u64)?;
//! assert_eq!(heap.read_value::<u64>(handle)?, 42);
//!
//! heap.deallocate(handle)?;
//! heap.destroy()?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::{Mutex, MutexGuard};

use crate::config::HeapConfig;
use crate::error::{HeapError, HeapResult};
use crate::heap::{
    ClearReport, CollectReport, CompressReport, HeapSnapshot, HeapState, PassOrigin, SharedHeap,
    TrimState, TrimWorker,
};
use crate::memory::HeapHandle;

/// Usage counters, read without stopping the world for long.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapStats {
    /// Arena capacity in bytes (0 after teardown).
    pub capacity: usize,
    /// Arena offset.
    pub used: usize,
    /// Bytes left for bump allocation.
    pub remaining: usize,
    /// Object table capacity (0 after teardown).
    pub max_slots: usize,
    /// Occupied slots.
    pub count: usize,
    /// Slots holding live objects.
    pub live: usize,
    /// Slots freed but not yet reclaimed.
    pub marked: usize,
    /// Completed collection passes.
    pub passes: u64,
    /// Completed passes run by the trim thread.
    pub trim_passes: u64,
    /// Slots reclaimed so far.
    pub reclaimed_slots: u64,
    /// Bytes reclaimed so far.
    pub reclaimed_bytes: u64,
    /// Trim thread state.
    pub trim_state: TrimState,
}

/// A fixed-capacity compacting heap.
///
/// Callers get [`HeapHandle`]s, never addresses. A handle is resolved to its
/// current bytes under the lock each time it is used, so compaction can move
/// objects freely between calls.
///
/// # Thread Safety
///
/// `MemoryManager` is `Send + Sync`; share it with `Arc`. Every operation
/// takes the heap lock for its whole duration. The lock is not reentrant, so
/// closures passed to [`MemoryManager::with_bytes`] and
/// [`MemoryManager::with_bytes_mut`] must not call back into the same heap.
#[derive(Debug)]
pub struct MemoryManager {
    /// Limits this heap was built with.
    config: HeapConfig,
    /// Lock-guarded state shared with the trim thread.
    shared: Arc<SharedHeap>,
    /// Background worker, `None` when disabled or after teardown.
    trim: Mutex<Option<TrimWorker>>,
    /// Set by the first teardown.
    destroyed: AtomicBool,
}

impl MemoryManager {
    /// Builds a heap and starts its trim thread (unless disabled in `config`).
    ///
    /// # Errors
    ///
    /// - [`HeapError::InvalidConfig`] if `config` fails validation
    /// - [`HeapError::ThreadSpawn`] if the trim thread cannot start
    pub fn new(config: HeapConfig) -> HeapResult<Self> {
        config.validate()?;

        let shared = Arc::new(SharedHeap::new(HeapState::new(&config)));
        let trim = if config.background_trim {
            Some(TrimWorker::spawn(Arc::clone(&shared), config.trim_interval())?)
        } else {
            None
        };

        tracing::info!(
            "memory manager ready: {} bytes, {} slots, background trim {}",
            config.capacity,
            config.max_slots,
            if config.background_trim { "on" } else { "off" }
        );

        Ok(Self {
            config,
            shared,
            trim: Mutex::new(trim),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Builds a heap with [`HeapConfig::default`].
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::new`].
    pub fn with_defaults() -> HeapResult<Self> {
        Self::new(HeapConfig::default())
    }

    /// Limits this heap was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Acquires the heap lock.
    #[inline]
    fn state(&self) -> MutexGuard<'_, HeapState> {
        self.shared.lock()
    }

    // =========================================================================
    // Allocator
    // =========================================================================

    /// Allocates `size` zeroed bytes.
    ///
    /// # Errors
    ///
    /// - [`HeapError::ZeroSize`] if `size == 0`
    /// - [`HeapError::OutOfMemory`] if the arena or table is full
    /// - [`HeapError::Destroyed`] after teardown
    pub fn allocate(&self, size: usize) -> HeapResult<HeapHandle> {
        self.state().allocate(size)
    }

    /// Marks the object for reclamation. The handle is stale afterwards.
    ///
    /// # Errors
    ///
    /// [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`].
    pub fn deallocate(&self, handle: HeapHandle) -> HeapResult<()> {
        self.state().deallocate(handle)
    }

    /// Runs `f` over the object's bytes while holding the lock.
    ///
    /// # Errors
    ///
    /// [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`].
    pub fn with_bytes<R>(&self, handle: HeapHandle, f: impl FnOnce(&[u8]) -> R) -> HeapResult<R> {
        let state = self.state();
        Ok(f(state.bytes(handle)?))
    }

    /// Runs `f` over the object's bytes mutably while holding the lock.
    ///
    /// # Errors
    ///
    /// [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`].
    pub fn with_bytes_mut<R>(
        &self,
        handle: HeapHandle,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> HeapResult<R> {
        let mut state = self.state();
        Ok(f(state.bytes_mut(handle)?))
    }

    /// Copies the object's bytes out.
    ///
    /// # Errors
    ///
    /// [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`].
    pub fn read_bytes(&self, handle: HeapHandle) -> HeapResult<Vec<u8>> {
        self.with_bytes(handle, <[u8]>::to_vec)
    }

    /// Copies `data` into the object starting `offset` bytes in.
    ///
    /// # Errors
    ///
    /// - [`HeapError::OutOfBounds`] if the range does not fit the object
    /// - [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`]
    pub fn write_bytes(&self, handle: HeapHandle, offset: usize, data: &[u8]) -> HeapResult<()> {
        let mut state = self.state();
        let bytes = state.bytes_mut(handle)?;
        let size = bytes.len();

        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= size)
            .ok_or(HeapError::OutOfBounds {
                offset,
                len: data.len(),
                size,
            })?;
        bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Allocates room for `value` and copies it in.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::allocate`].
    pub fn allocate_value<T: Pod>(&self, value: &T) -> HeapResult<HeapHandle> {
        let bytes = bytemuck::bytes_of(value);
        let mut state = self.state();
        let handle = state.allocate(bytes.len())?;
        state.bytes_mut(handle)?.copy_from_slice(bytes);
        Ok(handle)
    }

    /// Reads the object as a `T`.
    ///
    /// # Errors
    ///
    /// - [`HeapError::SizeMismatch`] if the object is not exactly `size_of::<T>()` bytes
    /// - [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`]
    pub fn read_value<T: Pod>(&self, handle: HeapHandle) -> HeapResult<T> {
        let state = self.state();
        let bytes = state.bytes(handle)?;
        check_size::<T>(bytes.len())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Overwrites the object with `value`.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::read_value`].
    pub fn write_value<T: Pod>(&self, handle: HeapHandle, value: &T) -> HeapResult<()> {
        let mut state = self.state();
        let bytes = state.bytes_mut(handle)?;
        check_size::<T>(bytes.len())?;
        bytes.copy_from_slice(bytemuck::bytes_of(value));
        Ok(())
    }

    /// Current arena offset of the object. Only meaningful until the next pass.
    ///
    /// # Errors
    ///
    /// [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`].
    pub fn location(&self, handle: HeapHandle) -> HeapResult<usize> {
        self.state().location(handle)
    }

    /// Size of the object in bytes.
    ///
    /// # Errors
    ///
    /// [`HeapError::UnknownHandle`] or [`HeapError::Destroyed`].
    pub fn size_of(&self, handle: HeapHandle) -> HeapResult<usize> {
        self.state().size_of(handle)
    }

    // =========================================================================
    // Collector
    // =========================================================================

    /// Clear phase on its own.
    ///
    /// # Errors
    ///
    /// [`HeapError::Destroyed`] after teardown.
    pub fn mark_clear(&self) -> HeapResult<ClearReport> {
        self.state().mark_clear()
    }

    /// Compress phase on its own.
    ///
    /// # Errors
    ///
    /// [`HeapError::Destroyed`] after teardown.
    pub fn mark_compress(&self) -> HeapResult<CompressReport> {
        self.state().mark_compress()
    }

    /// Exchanges slots `i` and `j`, metadata and bytes.
    ///
    /// # Errors
    ///
    /// [`HeapError::SlotOutOfRange`] or [`HeapError::Destroyed`].
    pub fn swap(&self, i: usize, j: usize) -> HeapResult<()> {
        self.state().swap(i, j)
    }

    /// Runs a full pass now, without waiting for the trim thread.
    ///
    /// # Errors
    ///
    /// [`HeapError::Destroyed`] after teardown.
    pub fn collect(&self) -> HeapResult<CollectReport> {
        self.shared.collect_pass(PassOrigin::Manual)
    }

    // =========================================================================
    // Observability
    // =========================================================================

    /// Current usage counters.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let snapshot = self.state().snapshot();
        HeapStats {
            capacity: snapshot.capacity,
            used: snapshot.used,
            remaining: snapshot.capacity - snapshot.used,
            max_slots: snapshot.max_slots,
            count: snapshot.count(),
            live: snapshot.live_count(),
            marked: snapshot.marked_count(),
            passes: self.shared.passes(),
            trim_passes: self.shared.trim_passes(),
            reclaimed_slots: self.shared.reclaimed_slots(),
            reclaimed_bytes: self.shared.reclaimed_bytes(),
            trim_state: self.shared.trim_state(),
        }
    }

    /// Copies the layout under the lock.
    ///
    /// # Errors
    ///
    /// [`HeapError::Destroyed`] after teardown.
    pub fn snapshot(&self) -> HeapResult<HeapSnapshot> {
        let state = self.state();
        if state.is_released() {
            return Err(HeapError::Destroyed);
        }
        Ok(state.snapshot())
    }

    /// Stops the world and verifies every layout invariant.
    ///
    /// # Errors
    ///
    /// [`HeapError::Corrupted`] or [`HeapError::Destroyed`].
    pub fn check_invariants(&self) -> HeapResult<()> {
        self.state().check_invariants()
    }

    /// Current trim thread state.
    #[inline]
    #[must_use]
    pub fn trim_state(&self) -> TrimState {
        self.shared.trim_state()
    }

    /// Returns true once [`MemoryManager::destroy`] has run.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Stops and joins the trim thread, then releases the arena and tables.
    ///
    /// # Errors
    ///
    /// [`HeapError::AlreadyDestroyed`] on every call after the first.
    pub fn destroy(&self) -> HeapResult<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Err(HeapError::AlreadyDestroyed);
        }

        if let Some(mut worker) = self.trim.lock().take() {
            worker.stop();
        }
        self.state().release()?;

        tracing::info!(
            "memory manager destroyed after {} passes ({} bytes reclaimed)",
            self.shared.passes(),
            self.shared.reclaimed_bytes()
        );
        Ok(())
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        if !self.is_destroyed() {
            let _ = self.destroy();
        }
    }
}

/// Checks that an object of `size` bytes holds exactly one `T`.
fn check_size<T>(size: usize) -> HeapResult<()> {
    let needed = std::mem::size_of::<T>();
    if size != needed {
        return Err(HeapError::SizeMismatch {
            expected: size,
            actual: needed,
        });
    }
    Ok(())
}
