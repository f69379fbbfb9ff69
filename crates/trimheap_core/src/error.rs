//! # Heap Error Types
//!
//! All errors that can occur while allocating from or maintaining the heap.

use thiserror::Error;

use crate::memory::HeapHandle;

/// Errors that can occur in the heap.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// The arena or the object table is exhausted.
    #[error(
        "memory manager out of memory: requested {requested} bytes, {remaining} remaining, \
         {slots_in_use}/{max_slots} slots in use"
    )]
    OutOfMemory {
        /// Bytes requested by the failed allocation.
        requested: usize,
        /// Bytes left in the arena at the time of the request.
        remaining: usize,
        /// Occupied object table entries.
        slots_in_use: usize,
        /// Object table capacity.
        max_slots: usize,
    },

    /// Zero-byte allocations are not representable in the object table.
    #[error("allocation size must be greater than zero")]
    ZeroSize,

    /// The handle was never issued, or its object was already deallocated.
    #[error("unknown handle: {0:?}")]
    UnknownHandle(HeapHandle),

    /// A slot index outside `0..count` was passed to `swap`.
    #[error("slot index {index} out of range (count {count})")]
    SlotOutOfRange {
        /// The offending index.
        index: usize,
        /// Occupied slots at the time of the call.
        count: usize,
    },

    /// A byte range does not fit inside the object.
    #[error("range {offset}..{offset}+{len} exceeds object of {size} bytes")]
    OutOfBounds {
        /// Start of the range inside the object.
        offset: usize,
        /// Length of the range.
        len: usize,
        /// Size of the object.
        size: usize,
    },

    /// A typed read/write does not match the object's size.
    #[error("size mismatch: object is {expected} bytes, value needs {actual}")]
    SizeMismatch {
        /// Size of the object.
        expected: usize,
        /// Size of the value.
        actual: usize,
    },

    /// The manager has been torn down.
    #[error("memory manager has been destroyed")]
    Destroyed,

    /// Teardown was requested twice.
    #[error("memory manager already destroyed")]
    AlreadyDestroyed,

    /// The process-wide instance does not exist.
    #[error("memory manager not initialized")]
    NotInitialized,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The trim thread could not be started.
    #[error("failed to spawn trim thread: {0}")]
    ThreadSpawn(String),

    /// A stop-the-world invariant check failed.
    #[error("heap corrupted: {0}")]
    Corrupted(String),
}

/// Result type for heap operations.
pub type HeapResult<T> = Result<T, HeapError>;
