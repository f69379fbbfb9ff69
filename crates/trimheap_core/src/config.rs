//! # Heap Configuration
//!
//! Construction-time limits for a [`MemoryManager`](crate::MemoryManager).
//! Loaded once at startup, either built in code or parsed from TOML:
//!
//! ```toml
//! capacity = 4096
//! max_slots = 512
//! trim_interval_ms = 20
//! background_trim = true
//! scrub_freed = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HeapError, HeapResult};

/// Default arena size in bytes.
pub const DEFAULT_CAPACITY: usize = 256;

/// Default object table size.
pub const DEFAULT_MAX_SLOTS: usize = 256;

/// Default delay between trim passes.
pub const DEFAULT_TRIM_INTERVAL_MS: u64 = 50;

/// Configuration for a heap instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Arena size in bytes.
    pub capacity: usize,
    /// Maximum number of objects tracked at once (live + pending reclamation).
    pub max_slots: usize,
    /// Delay between background trim passes (ms).
    pub trim_interval_ms: u64,
    /// Whether to start the background trim thread.
    pub background_trim: bool,
    /// Whether the clear phase zeroes freed bytes before they are reclaimed.
    pub scrub_freed: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_slots: DEFAULT_MAX_SLOTS,
            trim_interval_ms: DEFAULT_TRIM_INTERVAL_MS,
            background_trim: true,
            scrub_freed: true,
        }
    }
}

impl HeapConfig {
    /// Creates a config with the given limits and default trim settings.
    #[must_use]
    pub fn with_limits(capacity: usize, max_slots: usize) -> Self {
        Self {
            capacity,
            max_slots,
            ..Self::default()
        }
    }

    /// Same limits, no background thread. Collection only runs when asked.
    #[must_use]
    pub fn manual(capacity: usize, max_slots: usize) -> Self {
        Self {
            background_trim: false,
            ..Self::with_limits(capacity, max_slots)
        }
    }

    /// Parses a config from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::InvalidConfig`] on malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> HeapResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| HeapError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> HeapResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HeapError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks the limits.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::InvalidConfig`] describing the first bad field.
    pub fn validate(&self) -> HeapResult<()> {
        if self.capacity == 0 {
            return Err(HeapError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_slots == 0 {
            return Err(HeapError::InvalidConfig(
                "max_slots must be greater than zero".to_string(),
            ));
        }
        if u32::try_from(self.max_slots).is_err() {
            return Err(HeapError::InvalidConfig(format!(
                "max_slots {} exceeds {}",
                self.max_slots,
                u32::MAX
            )));
        }
        if self.trim_interval_ms == 0 {
            return Err(HeapError::InvalidConfig(
                "trim_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Trim interval as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn trim_interval(&self) -> Duration {
        Duration::from_millis(self.trim_interval_ms)
    }
}
