//! Runtime Initialization
//!
//! Creates the barrier runtime exactly once per initializer. The runtime
//! returned is the handle every entry goes through; there is no global
//! barrier set to look up.
//!
//! `init_with_config`, `init_default` and `init_from_env` each use a fresh
//! initializer, so every call builds an independent runtime with its own
//! heap. Embedders that want a single runtime per process call
//! [`init_once`], which refuses every call after the first success.

use super::BarrierRuntime;
use crate::config::BarrierConfig;
use crate::error::{BarrierError, Result};
use crate::logging::{configure_logger, log_event, BarrierEvent, BarrierLoggerConfig, LogLevel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set once the process-wide runtime has been built
static PROCESS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Run `build` unless `flag` was already claimed; a failed build
/// releases the claim
fn initialize_guarded<F>(flag: &AtomicBool, build: F) -> Result<BarrierRuntime>
where
    F: FnOnce() -> Result<BarrierRuntime>,
{
    if flag.swap(true, Ordering::AcqRel) {
        return Err(BarrierError::InvalidState {
            expected: "uninitialized".to_string(),
            actual: "initialized".to_string(),
        });
    }

    build().inspect_err(|e| {
        log::error!("barrier runtime initialization failed: {}", e);
        flag.store(false, Ordering::Release);
    })
}

/// RuntimeInitializer - initializer for the barrier runtime
///
/// Manages initialization sequence:
/// 1. Validate configuration
/// 2. Reserve the heap and build the barrier set
/// 3. Start the runtime
pub struct RuntimeInitializer {
    config: BarrierConfig,
    initialized: AtomicBool,
}

impl RuntimeInitializer {
    pub fn new(config: BarrierConfig) -> Self {
        Self {
            config,
            initialized: AtomicBool::new(false),
        }
    }

    /// Initialize runtime
    ///
    /// Fails with `InvalidState` on every call after the first successful one.
    pub fn initialize(&self) -> Result<BarrierRuntime> {
        initialize_guarded(&self.initialized, || self.build())
    }

    fn build(&self) -> Result<BarrierRuntime> {
        self.config.validate()?;

        if self.config.verbose {
            configure_logger(BarrierLoggerConfig {
                level: LogLevel::Debug,
                console: true,
                json: self.config.log_json,
                ..Default::default()
            });
        }

        let runtime = BarrierRuntime::new(self.config.clone())?;
        runtime.start()?;

        let heap = runtime.heap();
        log_event(BarrierEvent::RuntimeInitialized {
            heap_bytes: heap.reserved().byte_size(),
            regions: heap.regions().len(),
            satb_buffer_size: self.config.satb_buffer_size,
            compressed_refs: heap.uses_compressed_refs(),
        });

        Ok(runtime)
    }

    pub fn config(&self) -> &BarrierConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

/// Initialize with default config
pub fn init_default() -> Result<BarrierRuntime> {
    init_with_config(BarrierConfig::default())
}

/// Initialize with custom config
pub fn init_with_config(config: BarrierConfig) -> Result<BarrierRuntime> {
    RuntimeInitializer::new(config).initialize()
}

/// Initialize from `FGC_*` environment variables
pub fn init_from_env() -> Result<BarrierRuntime> {
    init_with_config(BarrierConfig::from_env())
}

/// Initialize the process-wide runtime
///
/// Succeeds at most once per process; later calls fail with
/// `InvalidState` even after the first runtime is dropped. A call whose
/// configuration is rejected leaves the slot free.
pub fn init_once(config: BarrierConfig) -> Result<Arc<BarrierRuntime>> {
    let initializer = RuntimeInitializer::new(config);
    initialize_guarded(&PROCESS_INITIALIZED, || initializer.build()).map(Arc::new)
}

/// Has [`init_once`] succeeded in this process
pub fn is_process_initialized() -> bool {
    PROCESS_INITIALIZED.load(Ordering::Acquire)
}
