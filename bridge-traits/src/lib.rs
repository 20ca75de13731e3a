//! # Host Bridge Traits
//!
//! Capability contracts between the playback core and everything around it.
//!
//! ## Overview
//!
//! The core sits between two external parties:
//!
//! - the **native decode engine**, a closed component that validates and binds
//!   KDMs, opens MXF essence and hands out decrypted, decoded frames
//!   ([`DecodeEngine`](engine::DecodeEngine));
//! - the **host media player**, which pulls bytes from a data source and
//!   timed samples from an extractor
//!   ([`DataSource`](playback::DataSource), [`Extractor`](playback::Extractor)).
//!
//! This crate only defines those surfaces plus a few host utilities:
//!
//! - [`Clock`](time::Clock) - wall-clock source for the playback window
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to host logging
//!
//! ## Platform Implementations
//!
//! | Platform | Engine binding | Status |
//! |----------|----------------|--------|
//! | Desktop  | `bridge-desktop` (`libdms` feature) | ✅ |
//! | Android  | JNI over the same C API | 📋 Planned |
//!
//! ## Thread Safety
//!
//! Engine and sink handles are shared between the lifecycle thread and the
//! host player's streaming thread, so those traits require
//! [`PlatformSendSync`](platform::PlatformSendSync).

pub mod engine;
pub mod error;
pub mod platform;
pub mod playback;
pub mod time;

pub use error::BridgeError;

pub use engine::{CheckResult, DecodeEngine, EssenceInfo, KdmRecord};
pub use playback::{
    DataSource, DataSpec, Extractor, ExtractorInput, ExtractorOutput, ExtractorResult,
    ReadOutcome, SampleFlags, SampleFormat, SampleMetadata, SourceInput, TrackOutput, TrackType,
};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
