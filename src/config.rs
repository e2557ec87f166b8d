/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! Engine configuration.
//!
//! Exposes the engine's tunable knobs as real, `serde`-deserializable
//! configuration, since the storage core is meant to be reused across
//! multiple on-disk databases rather than hardcoded once per database.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::PAGE_SIZE;

/// Default number of frames in the buffer pool.
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 500;

/// Default cap on a single frame's pin count.
pub const DEFAULT_MAX_PIN_COUNT: u32 = 5;

/// Default deadline for `BufferPool::pin` retries.
pub const DEFAULT_PIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default WAL file name within `data_dir`.
pub const DEFAULT_WAL_FILE_NAME: &str = "wal";

/// Engine-wide configuration knobs.
///
/// `block_size` is accepted for documentation/round-tripping purposes only;
/// [`EngineConfig::load`] and [`EngineConfig::new`] both assert it matches
/// the compiled-in [`PAGE_SIZE`], since it is fixed after a database's
/// first creation, not a tunable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub wal_file_name: String,
    pub block_size: usize,
    pub buffer_pool_size: usize,
    pub max_pin_count: u32,
    #[serde(with = "humantime_duration")]
    pub pin_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            wal_file_name: DEFAULT_WAL_FILE_NAME.to_string(),
            block_size: PAGE_SIZE,
            buffer_pool_size: DEFAULT_BUFFER_POOL_SIZE,
            max_pin_count: DEFAULT_MAX_PIN_COUNT,
            pin_timeout: DEFAULT_PIN_TIMEOUT,
        }
    }
}

impl EngineConfig {
    /// Construct a config for `data_dir` with every other knob at its
    /// default.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_buffer_pool_size(mut self, size: usize) -> Self {
        self.buffer_pool_size = size;
        self
    }

    pub fn with_max_pin_count(mut self, max: u32) -> Self {
        self.max_pin_count = max;
        self
    }

    pub fn with_pin_timeout(mut self, timeout: Duration) -> Self {
        self.pin_timeout = timeout;
        self
    }

    /// Load configuration from a TOML file on disk.
    pub fn load(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        config.assert_block_size_fixed();
        Ok(config)
    }

    /// Full path to the WAL file.
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(&self.wal_file_name)
    }

    /// `true` iff `data_dir` did not already exist before this call created
    /// it, signaling that the caller must run first-boot initialization.
    pub fn ensure_data_dir(&self) -> std::io::Result<bool> {
        if self.data_dir.exists() {
            Ok(false)
        } else {
            std::fs::create_dir_all(&self.data_dir)?;
            Ok(true)
        }
    }

    fn assert_block_size_fixed(&self) {
        assert_eq!(
            self.block_size, PAGE_SIZE,
            "block_size is fixed at {} bytes once a database exists; found {} in config",
            PAGE_SIZE, self.block_size
        );
    }
}

/// `serde`-with module for `Duration` backed by a plain seconds count,
/// avoiding a dependency on a full humantime crate for one field.
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        value.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
