//! # Heap
//!
//! Allocator, collector and trim thread over the memory structures.
//!
//! ## Critical Sections
//!
//! One mutex guards the whole [`HeapState`]. Each of these runs start to
//! finish under a single acquisition and is therefore atomic with respect to
//! every other:
//!
//! - allocate
//! - deallocate
//! - each byte access (read, write, closure)
//! - swap, mark-clear, mark-compress
//! - a collection pass (clear and compress together)
//! - snapshot and invariant check
//! - release of the storage during teardown

mod collector;
mod shared;
mod state;
mod trim;

pub use collector::{ClearReport, CollectReport, CompressReport};
pub use shared::{PassOrigin, SharedHeap, TrimState};
pub use state::{HeapSnapshot, HeapState};
pub use trim::{TrimWorker, TRIM_THREAD_NAME};
