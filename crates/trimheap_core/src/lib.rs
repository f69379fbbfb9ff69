//! # trimheap Core
//!
//! Fixed-capacity heap with mark-and-compact reclamation, designed for:
//! - Deterministic, bounded memory use
//! - No reliance on the platform allocator after startup
//! - Safe concurrent use from many threads plus a background trim thread
//!
//! ## Architecture
//!
//! ```text
//!   app threads ──allocate/deallocate──┐
//!                                      ▼
//!                          ┌───────────────────────┐
//!                          │   Mutex<HeapState>    │
//!                          │  ┌─────────────────┐  │
//!                          │  │ Arena (bytes)   │  │
//!                          │  │ ObjectTable     │  │
//!                          │  │ HandleTable     │  │
//!                          │  └─────────────────┘  │
//!                          └───────────────────────┘
//!                                      ▲
//!   trim thread ──every interval: clear + compress
//! ```
//!
//! ## Rules
//!
//! 1. **Bump allocation only** - `allocate` never reuses freed space directly
//! 2. **Deferred reclamation** - `deallocate` only marks; the collector
//!    slides live data down and shrinks the arena offset
//! 3. **Handles, not addresses** - objects move during compaction, so callers
//!    hold [`HeapHandle`]s that are resolved under the lock at each use
//!
//! ## Example
//!
//! ```rust,ignore
//! use trimheap_core::{HeapConfig, MemoryManager};
//!
//! let heap = MemoryManager::new(HeapConfig::with_limits(1024, 64))?;
//! let a = heap.allocate(10)?;
//! let b = heap.allocate(20)?;
//! heap.deallocate(a)?;
//! heap.collect()?;                 // or let the trim thread do it
//! assert_eq!(heap.location(b)?, 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod global;
pub mod heap;
pub mod manager;
pub mod memory;

pub use config::HeapConfig;
pub use error::{HeapError, HeapResult};
pub use heap::{ClearReport, CollectReport, CompressReport, HeapSnapshot, TrimState};
pub use manager::{HeapStats, MemoryManager};
pub use memory::{HeapHandle, Slot};
