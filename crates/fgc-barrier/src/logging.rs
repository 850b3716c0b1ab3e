//! Barrier Logging and Tracing
//!
//! Records collector-side lifecycle events around the barriers:
//! - Runtime initialization and teardown
//! - Mutator thread attach/detach
//! - Marking and evacuation phase changes
//!
//! Nothing here is ever called from a barrier fast path. Per-call detail
//! goes through the `log` facade at `trace` level instead.
//!
//! Log Levels:
//! - ERROR: Failed initialization, violated preconditions
//! - WARN: Abandoned marking, evacuation failures
//! - INFO: Runtime lifecycle, phases
//! - DEBUG: Thread attach/detach, buffer flushes
//! - TRACE: Per-object operations

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Log level for barrier events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Barrier lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BarrierEvent {
    /// Runtime created
    RuntimeInitialized {
        heap_bytes: usize,
        regions: usize,
        satb_buffer_size: usize,
        compressed_refs: bool,
    },

    /// Runtime torn down
    RuntimeTornDown { threads_detached: usize },

    /// Mutator thread attached
    ThreadAttached { thread_id: u64 },

    /// Mutator thread detached, with entries flushed from its buffer
    ThreadDetached { thread_id: u64, flushed: usize },

    /// SATB logging switched on
    MarkingStarted { cycle: u64 },

    /// SATB logging switched off
    MarkingFinished { cycle: u64, pending_buffers: usize },

    /// Marking aborted, pending entries dropped
    MarkingAbandoned { cycle: u64, dropped_entries: usize },

    /// Evacuation phase started
    EvacuationStarted { cset_regions: usize },

    /// Evacuation phase finished
    EvacuationFinished {
        objects_evacuated: u64,
        failures: u64,
    },

    /// All references updated, forwarded objects no longer reachable
    UpdateRefsFinished { dirty_regions: usize },
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct BarrierLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable console output
    pub console: bool,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,
}

impl Default for BarrierLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            json: false,
            timestamps: true,
        }
    }
}

/// Barrier Logger - records lifecycle events
pub struct BarrierLogger {
    config: BarrierLoggerConfig,
    events: Mutex<Vec<(Instant, BarrierEvent)>>,
    enabled: AtomicBool,
}

impl BarrierLogger {
    pub fn new(config: BarrierLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Log a barrier event
    pub fn log(&self, event: BarrierEvent) {
        if !self.is_enabled() {
            return;
        }

        let level = Self::event_level(&event);
        if level > self.config.level {
            return;
        }

        match level {
            LogLevel::Error => log::error!("{:?}", event),
            LogLevel::Warn => log::warn!("{:?}", event),
            LogLevel::Info => log::info!("{:?}", event),
            LogLevel::Debug => log::debug!("{:?}", event),
            LogLevel::Trace => log::trace!("{:?}", event),
        }

        if self.config.console {
            self.output_console(&event);
        }

        self.events.lock().push((Instant::now(), event));
    }

    fn event_level(event: &BarrierEvent) -> LogLevel {
        match event {
            BarrierEvent::MarkingAbandoned { .. } => LogLevel::Warn,
            BarrierEvent::EvacuationFinished { failures, .. } if *failures > 0 => LogLevel::Warn,
            BarrierEvent::RuntimeInitialized { .. }
            | BarrierEvent::RuntimeTornDown { .. }
            | BarrierEvent::MarkingStarted { .. }
            | BarrierEvent::MarkingFinished { .. }
            | BarrierEvent::EvacuationStarted { .. }
            | BarrierEvent::EvacuationFinished { .. }
            | BarrierEvent::UpdateRefsFinished { .. } => LogLevel::Info,
            BarrierEvent::ThreadAttached { .. } | BarrierEvent::ThreadDetached { .. } => {
                LogLevel::Debug
            },
        }
    }

    fn output_console(&self, event: &BarrierEvent) {
        if self.config.timestamps {
            let now = chrono::Local::now();
            print!("[{}] ", now.format("%Y-%m-%d %H:%M:%S%.3f"));
        }

        if self.config.json {
            if let Ok(json) = serde_json::to_string(event) {
                println!("{}", json);
            }
        } else {
            println!("{}", Self::human(event));
        }
    }

    /// Human-readable rendering of an event
    pub fn human(event: &BarrierEvent) -> String {
        match event {
            BarrierEvent::RuntimeInitialized {
                heap_bytes,
                regions,
                satb_buffer_size,
                compressed_refs,
            } => format!(
                "[Barrier] Runtime initialized: {} bytes in {} regions, SATB buffers of {}, compressed refs: {}",
                heap_bytes, regions, satb_buffer_size, compressed_refs
            ),
            BarrierEvent::RuntimeTornDown { threads_detached } => format!(
                "[Barrier] Runtime torn down ({} threads detached)",
                threads_detached
            ),
            BarrierEvent::ThreadAttached { thread_id } => {
                format!("[Barrier] Thread {} attached", thread_id)
            },
            BarrierEvent::ThreadDetached { thread_id, flushed } => format!(
                "[Barrier] Thread {} detached, {} SATB entries flushed",
                thread_id, flushed
            ),
            BarrierEvent::MarkingStarted { cycle } => {
                format!("[Barrier] Cycle {}: SATB logging on", cycle)
            },
            BarrierEvent::MarkingFinished {
                cycle,
                pending_buffers,
            } => format!(
                "[Barrier] Cycle {}: SATB logging off, {} buffers pending",
                cycle, pending_buffers
            ),
            BarrierEvent::MarkingAbandoned {
                cycle,
                dropped_entries,
            } => format!(
                "[Barrier] Cycle {}: marking abandoned, {} entries dropped",
                cycle, dropped_entries
            ),
            BarrierEvent::EvacuationStarted { cset_regions } => format!(
                "[Barrier] Evacuation started ({} regions in collection set)",
                cset_regions
            ),
            BarrierEvent::EvacuationFinished {
                objects_evacuated,
                failures,
            } => format!(
                "[Barrier] Evacuation finished: {} objects by mutators, {} failures",
                objects_evacuated, failures
            ),
            BarrierEvent::UpdateRefsFinished { dirty_regions } => format!(
                "[Barrier] Update refs finished, {} dirty regions",
                dirty_regions
            ),
        }
    }

    /// Get all events
    pub fn get_events(&self) -> Vec<(Instant, BarrierEvent)> {
        self.events.lock().clone()
    }

    /// Clear all events
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for BarrierLogger {
    fn default() -> Self {
        Self::new(BarrierLoggerConfig::default())
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<BarrierLogger> = Mutex::new(BarrierLogger::default());
}

/// Log a barrier event to the global logger
pub fn log_event(event: BarrierEvent) {
    GLOBAL_LOGGER.lock().log(event);
}

/// Configure the global logger
pub fn configure_logger(config: BarrierLoggerConfig) {
    *GLOBAL_LOGGER.lock() = BarrierLogger::new(config);
}

/// Get global logger event count
pub fn get_event_count() -> usize {
    GLOBAL_LOGGER.lock().event_count()
}

/// Events recorded by the global logger
pub fn get_events() -> Vec<BarrierEvent> {
    GLOBAL_LOGGER
        .lock()
        .get_events()
        .into_iter()
        .map(|(_, event)| event)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_basic() {
        let logger = BarrierLogger::default();
        logger.log(BarrierEvent::MarkingStarted { cycle: 1 });
        assert_eq!(logger.event_count(), 1);
    }

    #[test]
    fn test_logger_disable() {
        let logger = BarrierLogger::default();
        logger.disable();
        logger.log(BarrierEvent::MarkingStarted { cycle: 1 });
        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_level_filter() {
        let logger = BarrierLogger::default();
        logger.log(BarrierEvent::ThreadAttached { thread_id: 7 });
        assert_eq!(logger.event_count(), 0);

        let verbose = BarrierLogger::new(BarrierLoggerConfig {
            level: LogLevel::Debug,
            ..Default::default()
        });
        verbose.log(BarrierEvent::ThreadAttached { thread_id: 7 });
        assert_eq!(verbose.event_count(), 1);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(BarrierEvent::ThreadDetached {
            thread_id: 3,
            flushed: 12,
        })
        .unwrap();
        assert_eq!(json["type"], "thread_detached");
        assert_eq!(json["flushed"], 12);
    }

    #[test]
    fn test_global_logger() {
        log_event(BarrierEvent::MarkingStarted { cycle: 42 });
        assert!(get_event_count() > 0);
    }
}
