//! # Encrypted Essence Playback
//!
//! Feeds frames from a decode engine into a host media player.
//!
//! ## Overview
//!
//! This module handles:
//! - The session lifecycle around one engine handle (initialize, KDM
//!   validation and binding, essence open/close, start/stop)
//! - A pull-based byte source that delivers one whole frame per read
//! - An elementary-stream extractor that wraps each frame as a keyframe
//!   sample on a single video track
//! - Presentation timestamps synthesised from the engine's frame rate
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{AdapterConfig, FrameExtractor, FrameSource, Session};
//! use std::sync::Arc;
//!
//! let session = Arc::new(Session::new(engine));
//! session.initialize()?;
//! session.bind_kdm(kdm_path)?;
//! session.open_essence(mxf_path)?;
//! session.start_playback()?;
//!
//! let config = AdapterConfig::default();
//! let source = FrameSource::new(session.clone(), &config);
//! let extractor = FrameExtractor::new(session.clone(), config);
//! // hand both to the host player
//! ```

pub mod config;
pub mod error;
pub mod extractor;
pub mod session;
pub mod source;
pub mod timing;

#[cfg(test)]
mod test_support;

pub use config::{AdapterConfig, GeometryPolicy, DEFAULT_MAX_FRAME_SIZE};
pub use error::{PlaybackError, Result};
pub use extractor::{FrameExtractor, VIDEO_TRACK_ID};
pub use session::{FramePull, Session, SessionId, SessionOp, SessionPhase};
pub use source::FrameSource;
pub use timing::{validate_frame_rate, FrameClock};
