//! Util Module - Shared Utilities
//!
//! Alignment helpers, size constants and address formatting used
//! throughout the barrier crate.

pub mod alignment;

pub use alignment::Alignment;

/// Debug formatter for heap addresses
pub fn format_address(address: usize) -> String {
    format!("0x{:016X}", address)
}

/// Constants for FGC barriers
pub mod constants {
    /// 1 Kilobyte
    pub const KB: usize = 1024;
    /// 1 Megabyte
    pub const MB: usize = 1024 * 1024;
    /// 1 Gigabyte
    pub const GB: usize = 1024 * 1024 * 1024;

    /// Size of a heap word in bytes
    pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

    /// log2(WORD_SIZE), also the narrow reference shift
    pub const LOG_WORD_SIZE: u32 = WORD_SIZE.trailing_zeros();

    /// Default SATB buffer capacity (entries)
    pub const DEFAULT_SATB_BUFFER_SIZE: usize = 1024;

    /// Default heap reservation: 64MB
    pub const DEFAULT_HEAP_SIZE: usize = 64 * MB;

    /// Default region size: 1MB
    pub const DEFAULT_REGION_SIZE: usize = MB;

    /// Largest heap whose word offsets still fit a 32-bit narrow reference.
    /// One word is reserved so that no object encodes to the null value.
    pub const MAX_COMPRESSED_HEAP_SIZE: usize = ((u32::MAX as usize) << LOG_WORD_SIZE) - WORD_SIZE;
}
