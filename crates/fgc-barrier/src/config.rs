//! Configuration Module - Barrier and Heap Parameters
//!
//! Manages the parameters fixed at collector initialization: SATB buffer
//! capacity, the shape of the heap the barriers operate on, and ambient
//! switches for statistics and logging.

use crate::util::constants::{
    DEFAULT_HEAP_SIZE, DEFAULT_REGION_SIZE, DEFAULT_SATB_BUFFER_SIZE, KB,
    MAX_COMPRESSED_HEAP_SIZE,
};
use serde::{Deserialize, Serialize};

/// Configuration for the barrier layer
///
/// # Examples
///
/// ```rust
/// use fgc_barrier::BarrierConfig;
///
/// // Use default configuration
/// let config = BarrierConfig::default();
/// assert!(config.validate().is_ok());
///
/// // Small buffers flush to the pending log set more often
/// let config = BarrierConfig {
///     satb_buffer_size: 256,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierConfig {
    /// Capacity of each per-thread SATB buffer, in entries
    ///
    /// A full buffer is handed off whole to the pending log set.
    /// Default: 1024
    pub satb_buffer_size: usize,

    /// Size of the heap reservation in bytes
    ///
    /// Rounded up to a whole number of regions.
    /// Default: 64MB
    pub heap_size: usize,

    /// Region size in bytes
    ///
    /// Must be a power of two and at least one OS page.
    /// Default: 1MB
    pub region_size: usize,

    /// Store reference fields in the 32-bit narrow encoding
    ///
    /// Requires `heap_size` to fit the narrow address range.
    /// Default: true
    pub compressed_refs: bool,

    /// Count barrier invocations, enqueues and hand-offs
    ///
    /// Default: true
    pub stats_enabled: bool,

    /// Echo lifecycle events to the console
    ///
    /// Default: false
    pub verbose: bool,

    /// Emit console events as JSON lines instead of text
    ///
    /// Default: false
    pub log_json: bool,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        BarrierConfig {
            satb_buffer_size: DEFAULT_SATB_BUFFER_SIZE,
            heap_size: DEFAULT_HEAP_SIZE,
            region_size: DEFAULT_REGION_SIZE,
            compressed_refs: true,
            stats_enabled: true,
            verbose: false,
            log_json: false,
        }
    }
}

impl BarrierConfig {
    /// Validate configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fgc_barrier::BarrierConfig;
    ///
    /// let config = BarrierConfig {
    ///     satb_buffer_size: 0, // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.satb_buffer_size == 0 {
            return Err(ConfigError::InvalidBufferSize(
                "satb_buffer_size must be > 0".to_string(),
            ));
        }

        if !self.region_size.is_power_of_two() {
            return Err(ConfigError::InvalidRegionSize(format!(
                "region_size {} must be a power of two",
                self.region_size
            )));
        }

        if self.region_size < page_size::get().max(4 * KB) {
            return Err(ConfigError::InvalidRegionSize(
                "region_size must be at least one page".to_string(),
            ));
        }

        if self.heap_size < self.region_size {
            return Err(ConfigError::InvalidHeapSize(
                "heap_size must hold at least one region".to_string(),
            ));
        }

        if self.compressed_refs && self.region_count() * self.region_size > MAX_COMPRESSED_HEAP_SIZE {
            return Err(ConfigError::InvalidHeapSize(format!(
                "heap_size {} exceeds the narrow reference range ({} bytes)",
                self.heap_size, MAX_COMPRESSED_HEAP_SIZE
            )));
        }

        Ok(())
    }

    /// Number of regions the heap is split into
    pub fn region_count(&self) -> usize {
        self.heap_size.div_ceil(self.region_size.max(1))
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - FGC_SATB_BUFFER_SIZE
    /// - FGC_HEAP_SIZE
    /// - FGC_REGION_SIZE
    /// - FGC_COMPRESSED_REFS
    /// - FGC_VERBOSE
    ///
    /// # Examples
    ///
    /// ```bash
    /// export FGC_SATB_BUFFER_SIZE=256
    /// export FGC_COMPRESSED_REFS=0
    /// export FGC_VERBOSE=1
    /// ```
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from `FGC_*` values supplied by `lookup`
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let size = |key: &str| lookup(key).and_then(|val| val.parse::<usize>().ok());

        if let Some(size) = size("FGC_SATB_BUFFER_SIZE") {
            config.satb_buffer_size = size;
        }
        if let Some(size) = size("FGC_HEAP_SIZE") {
            config.heap_size = size;
        }
        if let Some(size) = size("FGC_REGION_SIZE") {
            config.region_size = size;
        }
        if let Some(val) = lookup("FGC_COMPRESSED_REFS") {
            config.compressed_refs = parse_flag(&val);
        }
        if let Some(val) = lookup("FGC_VERBOSE") {
            config.verbose = parse_flag(&val);
        }

        config
    }
}

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid SATB buffer size: {0}")]
    InvalidBufferSize(String),

    #[error("Invalid heap size: {0}")]
    InvalidHeapSize(String),

    #[error("Invalid region size: {0}")]
    InvalidRegionSize(String),
}
