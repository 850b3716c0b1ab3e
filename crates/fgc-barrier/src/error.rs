//! Error Module - Barrier Error Types
//!
//! The barrier entries themselves are infallible: a violated precondition
//! is a bug in the compiler or interpreter that called them, and is caught
//! by [`barrier_guarantee!`](crate::barrier_guarantee) in diagnostic builds.
//!
//! Everything around the entries (configuration, heap reservation, the
//! test-grade allocator, runtime lifecycle) returns [`BarrierError`].
//!
//! # Error Categories
//!
//! ## Setup Errors
//! - `Configuration` - Invalid configuration
//! - `HeapReservation` - Mapping the heap arena failed
//!
//! ## Allocation Errors
//! - `OutOfMemory` - No free region left for the request
//!
//! ## Lifecycle Errors
//! - `InvalidState` - Double initialization, use after teardown
//! - `InvalidArgument` - Invalid function argument

use crate::config::ConfigError;
use std::fmt;
use thiserror::Error;

/// Main error type for the barrier crate's fallible surface
///
/// # Examples
///
/// ```rust
/// use fgc_barrier::BarrierError;
///
/// fn handle_error(err: BarrierError) {
///     match err {
///         BarrierError::OutOfMemory { requested, available } => {
///             eprintln!("OOM: requested {}, available {}", requested, available);
///         }
///         _ => eprintln!("Other error: {}", err),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum BarrierError {
    /// Configuration error
    ///
    /// **When returned:** `BarrierConfig::validate` rejected the configuration
    ///
    /// **Recovery strategy:** Use default configuration or fail fast
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Heap reservation failed
    ///
    /// **When returned:** The anonymous mapping backing the heap could not be created
    ///
    /// **Recovery strategy:** Cannot recover - terminate gracefully
    #[error("Heap reservation failed: {0}")]
    HeapReservation(String),

    /// Out of memory - no free region can satisfy the request
    ///
    /// **When returned:** Object allocation exceeds the remaining free regions
    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    /// Invalid state
    ///
    /// **When returned:** Runtime lifecycle violation
    ///
    /// **Example scenario:** Attaching a thread after teardown
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Invalid argument
    ///
    /// **When returned:** Function argument fails validation
    ///
    /// **Example scenarios:**
    /// - Object size smaller than its header
    /// - Reference slot count exceeding the object size
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl BarrierError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BarrierError::OutOfMemory { .. })
    }

    /// Check if this error indicates a bug in the calling code
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            BarrierError::InvalidState { .. } | BarrierError::InvalidArgument(_)
        )
    }
}

/// Result type alias for barrier setup operations
pub type Result<T> = std::result::Result<T, BarrierError>;

/// Whether barrier preconditions are checked in this build
pub const DIAGNOSTICS: bool = cfg!(any(debug_assertions, feature = "diagnostics"));

/// Report a violated barrier precondition and terminate
///
/// Panics rather than aborting so that the unwinding test harness can
/// observe it; the release profile sets `panic = "abort"`.
#[cold]
#[inline(never)]
pub fn fatal_precondition(condition: &str, context: fmt::Arguments<'_>) -> ! {
    log::error!("barrier precondition violated: {} ({})", condition, context);
    panic!("barrier precondition violated: {}: {}", condition, context);
}

/// Check a barrier precondition in diagnostic builds
///
/// Compiles to nothing when neither `debug_assertions` nor the
/// `diagnostics` feature is enabled.
#[macro_export]
macro_rules! barrier_guarantee {
    ($cond:expr, $($arg:tt)*) => {
        if $crate::error::DIAGNOSTICS && !$cond {
            $crate::error::fatal_precondition(stringify!($cond), format_args!($($arg)*));
        }
    };
}

/// Ensure condition is true, otherwise return error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let oom = BarrierError::OutOfMemory {
            requested: 64,
            available: 0,
        };
        assert!(oom.is_recoverable());
        assert!(!oom.is_bug());

        let state = BarrierError::InvalidState {
            expected: "Running".to_string(),
            actual: "Stopped".to_string(),
        };
        assert!(state.is_bug());
        assert!(!state.is_recoverable());
    }

    #[test]
    fn test_config_error_converts() {
        let err: BarrierError = ConfigError::InvalidBufferSize("zero".to_string()).into();
        assert!(matches!(err, BarrierError::Configuration(_)));
        assert!(err.to_string().contains("zero"));
    }

    #[test]
    #[should_panic(expected = "barrier precondition violated")]
    fn test_guarantee_panics_with_context() {
        let value = 0usize;
        crate::barrier_guarantee!(value != 0, "value was {:#x}", value);
    }
}
