//! # Memory
//!
//! The leaf data structures of the heap: the arena bytes, the object table
//! that describes them, and the handles callers use to reach them.
//!
//! ## Layout Invariant
//!
//! The slots of the object table, in table order, tile `[0, arena.used())`
//! exactly. Bump allocation creates the tiling and the collector's swap
//! primitive preserves it.

mod arena;
mod handle;
mod table;

pub use arena::Arena;
pub use handle::HeapHandle;
pub use table::{HandleTable, ObjectTable, Slot};
