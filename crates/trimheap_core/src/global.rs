//! # Process-Wide Instance
//!
//! Optional singleton wrapper around [`MemoryManager`] for code that wants a
//! single heap per process. Everything here is a thin layer: the manager
//! itself carries no global state, and independent instances can be built
//! with [`MemoryManager::new`] at any time.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::HeapConfig;
use crate::error::{HeapError, HeapResult};
use crate::manager::MemoryManager;

/// The process-wide instance, if any.
static INSTANCE: Mutex<Option<Arc<MemoryManager>>> = parking_lot::const_mutex(None);

/// Creates the process-wide heap with default limits.
///
/// Idempotent: if an instance already exists it is returned unchanged.
///
/// # Errors
///
/// Same as [`MemoryManager::new`].
pub fn init() -> HeapResult<Arc<MemoryManager>> {
    init_with(HeapConfig::default())
}

/// Creates the process-wide heap with `config`.
///
/// If an instance already exists, `config` is ignored and the existing
/// instance is returned.
///
/// # Errors
///
/// Same as [`MemoryManager::new`].
pub fn init_with(config: HeapConfig) -> HeapResult<Arc<MemoryManager>> {
    let mut instance = INSTANCE.lock();
    if let Some(existing) = instance.as_ref() {
        return Ok(Arc::clone(existing));
    }

    let manager = Arc::new(MemoryManager::new(config)?);
    *instance = Some(Arc::clone(&manager));
    Ok(manager)
}

/// Returns the process-wide heap, creating it with default limits if needed.
///
/// # Errors
///
/// Same as [`MemoryManager::new`].
pub fn get_instance() -> HeapResult<Arc<MemoryManager>> {
    init()
}

/// Returns true if a process-wide heap exists.
#[must_use]
pub fn is_initialized() -> bool {
    INSTANCE.lock().is_some()
}

/// Tears down the process-wide heap and clears the singleton.
///
/// `Arc`s handed out earlier stay valid as objects but report
/// [`HeapError::Destroyed`] from every operation.
///
/// # Errors
///
/// [`HeapError::NotInitialized`] if there is no instance.
pub fn delete_instance() -> HeapResult<()> {
    let manager = INSTANCE.lock().take().ok_or(HeapError::NotInitialized)?;
    manager.destroy()
}
