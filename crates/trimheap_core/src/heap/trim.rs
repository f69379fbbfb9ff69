//! # Trim Thread
//!
//! Background worker that periodically runs a collection pass.
//!
//! ```text
//!            timeout                    pass done
//!   Running ─────────▶ CollectingPass ───────────▶ Running
//!      │
//!      │ stop message / sender dropped
//!      ▼
//!   Stopped
//! ```
//!
//! The stop signal is a channel message, so the worker wakes as soon as it
//! is asked to stop instead of sleeping out its interval. A pass that has
//! already started always finishes first.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::error::{HeapError, HeapResult};

use super::shared::{PassOrigin, SharedHeap, TrimState};

/// Name given to the OS thread.
pub const TRIM_THREAD_NAME: &str = "trimheap-trim";

/// Handle to a running trim thread.
#[derive(Debug)]
pub struct TrimWorker {
    /// Stop signal.
    stop_tx: Sender<()>,
    /// Worker thread handle, `None` once joined.
    handle: Option<JoinHandle<()>>,
}

impl TrimWorker {
    /// Starts the trim thread.
    ///
    /// # Errors
    ///
    /// [`HeapError::ThreadSpawn`] if the OS refuses to create the thread.
    pub fn spawn(shared: Arc<SharedHeap>, interval: Duration) -> HeapResult<Self> {
        let (stop_tx, stop_rx) = bounded(1);

        shared.set_trim_state(TrimState::Running);
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(TRIM_THREAD_NAME.to_string())
            .spawn(move || memory_trim(&worker_shared, &stop_rx, interval))
            .map_err(|e| {
                shared.set_trim_state(TrimState::Stopped);
                tracing::error!("failed to spawn trim thread: {e}");
                HeapError::ThreadSpawn(e.to_string())
            })?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    /// Returns true until the worker has been joined.
    #[inline]
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    /// Signals the worker and waits for it to exit. Idempotent.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        // A full channel means a stop is already pending.
        let _ = self.stop_tx.try_send(());

        if handle.join().is_err() {
            tracing::error!("trim thread panicked");
        }
    }
}

impl Drop for TrimWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Trim thread main loop.
fn memory_trim(shared: &SharedHeap, stop_rx: &Receiver<()>, interval: Duration) {
    tracing::debug!("trim thread started, interval {interval:?}");

    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        shared.set_trim_state(TrimState::CollectingPass);
        let result = shared.collect_pass(PassOrigin::Trim);
        shared.set_trim_state(TrimState::Running);

        if let Err(err) = result {
            tracing::error!("trim pass failed, stopping: {err}");
            break;
        }
    }

    shared.set_trim_state(TrimState::Stopped);
    tracing::debug!("trim thread stopped after {} passes", shared.trim_passes());
}
