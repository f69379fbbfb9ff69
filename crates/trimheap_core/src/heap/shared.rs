//! # Shared Heap
//!
//! The lock plus the counters both application threads and the trim thread
//! touch. The trim thread holds an `Arc` to this, never to the manager.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::error::HeapResult;

use super::collector::CollectReport;
use super::state::HeapState;

/// Lifecycle of the background trim thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TrimState {
    /// No trim thread was started.
    Disabled = 0,
    /// Sleeping until the next pass or a stop request.
    Running = 1,
    /// Holding the lock and running a pass.
    CollectingPass = 2,
    /// Exited; will not run again.
    Stopped = 3,
}

impl TrimState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::CollectingPass,
            3 => Self::Stopped,
            _ => Self::Disabled,
        }
    }
}

/// Who asked for a collection pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOrigin {
    /// The background trim thread.
    Trim,
    /// An explicit call.
    Manual,
}

/// Lock-guarded state plus lock-free counters.
#[derive(Debug)]
pub struct SharedHeap {
    /// The heap lock. Held for the whole of every allocate, deallocate and
    /// collection pass.
    state: Mutex<HeapState>,
    /// Completed passes, any origin.
    passes: AtomicU64,
    /// Completed passes run by the trim thread.
    trim_passes: AtomicU64,
    /// Total slots reclaimed.
    reclaimed_slots: AtomicU64,
    /// Total bytes reclaimed.
    reclaimed_bytes: AtomicU64,
    /// Current [`TrimState`].
    trim_state: AtomicU8,
}

impl SharedHeap {
    /// Wraps `state` behind the heap lock.
    #[must_use]
    pub fn new(state: HeapState) -> Self {
        Self {
            state: Mutex::new(state),
            passes: AtomicU64::new(0),
            trim_passes: AtomicU64::new(0),
            reclaimed_slots: AtomicU64::new(0),
            reclaimed_bytes: AtomicU64::new(0),
            trim_state: AtomicU8::new(TrimState::Disabled as u8),
        }
    }

    /// Acquires the heap lock.
    ///
    /// The lock is not reentrant: calling back into the heap while holding
    /// the guard deadlocks.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, HeapState> {
        self.state.lock()
    }

    /// Runs one clear + compress pass under a single lock acquisition.
    ///
    /// # Errors
    ///
    /// Propagates [`HeapState::collect`] errors (only `Destroyed`).
    pub fn collect_pass(&self, origin: PassOrigin) -> HeapResult<CollectReport> {
        let report = self.lock().collect()?;

        self.passes.fetch_add(1, Ordering::Relaxed);
        if origin == PassOrigin::Trim {
            self.trim_passes.fetch_add(1, Ordering::Relaxed);
        }
        self.reclaimed_slots
            .fetch_add(report.compress.reclaimed_slots as u64, Ordering::Relaxed);
        self.reclaimed_bytes
            .fetch_add(report.compress.reclaimed_bytes as u64, Ordering::Relaxed);

        Ok(report)
    }

    /// Completed passes, any origin.
    #[inline]
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Completed passes run by the trim thread.
    #[inline]
    #[must_use]
    pub fn trim_passes(&self) -> u64 {
        self.trim_passes.load(Ordering::Relaxed)
    }

    /// Total slots reclaimed.
    #[inline]
    #[must_use]
    pub fn reclaimed_slots(&self) -> u64 {
        self.reclaimed_slots.load(Ordering::Relaxed)
    }

    /// Total bytes reclaimed.
    #[inline]
    #[must_use]
    pub fn reclaimed_bytes(&self) -> u64 {
        self.reclaimed_bytes.load(Ordering::Relaxed)
    }

    /// Current trim thread state.
    #[inline]
    #[must_use]
    pub fn trim_state(&self) -> TrimState {
        TrimState::from_u8(self.trim_state.load(Ordering::Acquire))
    }

    /// Publishes a trim thread state transition.
    #[inline]
    pub fn set_trim_state(&self, state: TrimState) {
        self.trim_state.store(state as u8, Ordering::Release);
    }
}
