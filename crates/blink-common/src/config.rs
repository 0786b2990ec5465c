//! Configuration structures for blink stores.

use crate::address::AddressWidth;
use crate::error::{BlinkError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use sysinfo::System;

/// Backing file configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Path of the backing file. `None` keeps the file in memory.
    pub path: Option<PathBuf>,
    /// Width of encoded addresses.
    pub address_width: AddressWidth,
    /// Sync the file after every write.
    pub fsync_enabled: bool,
}

impl FileConfig {
    /// In-memory file with the given address width.
    pub fn in_memory(address_width: AddressWidth) -> Self {
        Self {
            path: None,
            address_width,
            fsync_enabled: false,
        }
    }

    /// On-disk file at `path`.
    pub fn on_disk(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            address_width: AddressWidth::default(),
            fsync_enabled: true,
        }
    }
}

/// Node cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Number of frames (cached nodes) in the pool.
    pub num_frames: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { num_frames: 521 }
    }
}

impl CacheConfig {
    /// Smallest accepted pool size.
    pub const MIN_FRAMES: usize = 8;

    /// Sizes the pool to 25% of available system RAM.
    ///
    /// `entry_size` is the in-memory footprint of one cached node. The
    /// result never drops below `MIN_FRAMES`.
    pub fn auto_sized(entry_size: usize) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        let num_frames = (target_bytes / entry_size.max(1)).max(Self::MIN_FRAMES);

        Self { num_frames }
    }
}

/// Full store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backing file settings.
    pub file: FileConfig,
    /// Cache settings.
    pub cache: CacheConfig,
}

impl StoreConfig {
    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.cache.num_frames < CacheConfig::MIN_FRAMES {
            return Err(BlinkError::InvalidParameter {
                name: "cache.num_frames".to_string(),
                value: self.cache.num_frames.to_string(),
            });
        }
        if let Some(path) = &self.file.path {
            if path.as_os_str().is_empty() {
                return Err(BlinkError::ConfigError("empty file path".to_string()));
            }
        }
        Ok(())
    }
}
