//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the decode engine handle and the ambient services the
//! core needs. It enforces fail-fast validation so a missing engine is
//! reported at startup rather than on the first KDM or essence operation.
//!
//! ## Required Dependencies
//!
//! - `DecodeEngine` - the native engine handle, owned by exactly one session
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - wall clock for the playback window (default: `SystemClock`)
//! - `LoggerSink` - mirror of log events into host logging (default: none)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .engine(Arc::new(LibDmsEngine::new(LibDmsConfig::default())))
//!     .event_buffer_size(256)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No engine: fails with an actionable message
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing decode engine");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use bridge_traits::{Clock, DecodeEngine, LoggerSink, SystemClock};
use std::sync::Arc;

/// Upper bound for [`CoreConfig::event_buffer_size`].
pub const MAX_EVENT_BUFFER_SIZE: usize = 65_536;

/// Core configuration for the player.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Decode engine handle (required)
    pub engine: Arc<dyn DecodeEngine>,

    /// Wall clock used to stamp the playback window
    pub clock: Arc<dyn Clock>,

    /// Optional host logging sink
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Events buffered per subscriber before it starts lagging
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("engine", &"DecodeEngine { ... }")
            .field("clock", &"Clock { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }

    /// Default logging configuration mirroring events into the configured
    /// sink, if any. Pass it to [`init_logging`](crate::logging::init_logging)
    /// after adjusting format or level.
    pub fn logging_config(&self) -> LoggingConfig {
        let config = LoggingConfig::default();
        match &self.logger_sink {
            Some(sink) => config.with_logger_sink(Arc::clone(sink)),
            None => config,
        }
    }
}

fn engine_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "DecodeEngine".to_string(),
        message: "A DecodeEngine implementation is required to validate KDMs and decode essence. \
                 Desktop: enable the 'libdms' feature of bridge-desktop and inject LibDmsEngine. \
                 Tests: inject a scripted or mock engine."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    engine: Option<Arc<dyn DecodeEngine>>,
    clock: Option<Arc<dyn Clock>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the decode engine (required).
    pub fn engine(mut self, engine: Arc<dyn DecodeEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the wall clock.
    ///
    /// Default: [`SystemClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the host logger sink.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Sets the per-subscriber event buffer.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no engine was provided
    /// - [`Error::Config`] when a value is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let engine = self.engine.ok_or_else(engine_missing_error)?;

        let config = CoreConfig {
            engine,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logger_sink: self.logger_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
