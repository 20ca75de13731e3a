//! # Frame Extractor
//!
//! Wraps each frame delivered by a [`FrameSource`](crate::FrameSource) as one
//! keyframe sample on a single video track.
//!
//! The track format is declared lazily, with the first delivered sample, from
//! the engine's frame rate and the essence geometry. Presentation times come
//! from a [`FrameClock`] that restarts at every seek target.

use crate::config::{AdapterConfig, GeometryPolicy};
use crate::error::{PlaybackError, Result};
use crate::session::{Session, SessionOp};
use crate::timing::FrameClock;
use bridge_traits::{
    Extractor, ExtractorInput, ExtractorOutput, ExtractorResult, ReadOutcome, SampleFlags,
    SampleFormat, SampleMetadata, TrackOutput, TrackType,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Track id of the single video track.
pub const VIDEO_TRACK_ID: u32 = 0;

/// Codec reported when the engine leaves it blank.
const DEFAULT_CODEC: &str = "jpeg2000";

/// Elementary-stream extractor over engine frames.
pub struct FrameExtractor {
    session: Arc<Session>,
    config: AdapterConfig,
    track: Option<Box<dyn TrackOutput>>,
    clock: Option<FrameClock>,
    start_us: i64,
    sample: Vec<u8>,
}

impl FrameExtractor {
    pub fn new(session: Arc<Session>, config: AdapterConfig) -> Self {
        let sample = vec![0u8; config.max_frame_size];
        Self {
            session,
            config,
            track: None,
            clock: None,
            start_us: 0,
            sample,
        }
    }

    /// Presentation time the next sample will carry, once the format is known.
    pub fn next_pts_us(&self) -> Option<i64> {
        self.clock.as_ref().map(FrameClock::pts_us)
    }

    /// `true` once the track format has been declared.
    pub fn has_format(&self) -> bool {
        self.clock.is_some()
    }

    fn derive_format(&self) -> Result<(SampleFormat, FrameClock)> {
        let info = self
            .session
            .essence()
            .ok_or_else(|| PlaybackError::InvalidState {
                from: self.session.phase(),
                attempted: SessionOp::ReadFrame,
            })?;
        let frame_rate = self.session.frame_rate()?;
        let mut clock = FrameClock::new(frame_rate)?;
        clock.reset_to(self.start_us);

        let (width, height) = match (info.geometry(), self.config.geometry) {
            (Some(geometry), _) => geometry,
            (None, GeometryPolicy::Strict) => return Err(PlaybackError::MissingGeometry),
            (None, GeometryPolicy::Fallback) => {
                warn!(
                    width = self.config.fallback_width,
                    height = self.config.fallback_height,
                    "Engine did not report geometry; declaring fallback size"
                );
                (self.config.fallback_width, self.config.fallback_height)
            }
        };

        let codec = if info.codec.trim().is_empty() {
            DEFAULT_CODEC
        } else {
            info.codec.as_str()
        };

        let format = SampleFormat::new(self.config.sample_mime_type.as_str())
            .with_codecs(codec)
            .with_geometry(width, height)
            .with_frame_rate(frame_rate);
        Ok((format, clock))
    }
}

impl Extractor for FrameExtractor {
    type Error = PlaybackError;

    fn sniff<I: ExtractorInput>(&mut self, _input: &mut I) -> bool {
        // The source is engine frames by construction.
        true
    }

    fn init(&mut self, output: &mut dyn ExtractorOutput) {
        if self.sample.len() != self.config.max_frame_size {
            self.sample = vec![0u8; self.config.max_frame_size];
        }
        self.track = Some(output.track(VIDEO_TRACK_ID, TrackType::Video));
        output.end_tracks();
        debug!(session = %self.session.id(), "Video track declared");
    }

    fn read<I>(&mut self, input: &mut I) -> Result<ExtractorResult>
    where
        I: ExtractorInput,
        Self::Error: From<I::Error>,
    {
        if self.track.is_none() {
            return Err(PlaybackError::NotOpen);
        }

        // Derived before the pull so a strict geometry failure consumes no frame.
        let pending = match self.clock {
            Some(_) => None,
            None => Some(self.derive_format()?),
        };

        let size = match input.read(&mut self.sample)? {
            ReadOutcome::Read(size) if size > 0 => size,
            _ => return Ok(ExtractorResult::EndOfInput),
        };

        if let Some((format, clock)) = pending {
            info!(
                session = %self.session.id(),
                mime = %format.sample_mime_type,
                codecs = ?format.codecs,
                width = ?format.width,
                height = ?format.height,
                frame_rate = clock.frame_rate(),
                "Track format declared"
            );
            if let Some(track) = self.track.as_mut() {
                track.format(&format);
            }
            self.clock = Some(clock);
        }

        let (Some(track), Some(clock)) = (self.track.as_mut(), self.clock.as_mut()) else {
            return Err(PlaybackError::NotOpen);
        };
        let time_us = clock.advance();
        track.sample_data(&self.sample[..size]);
        track.sample_metadata(SampleMetadata {
            time_us,
            flags: SampleFlags::KEY_FRAME,
            size,
            offset: 0,
        });
        self.session.record_presentation(time_us);
        Ok(ExtractorResult::Continue)
    }

    #[instrument(skip(self), fields(session = %self.session.id()))]
    fn seek(&mut self, _position: u64, time_us: i64) -> Result<()> {
        self.session.seek(time_us)?;
        self.start_us = time_us;
        if let Some(clock) = self.clock.as_mut() {
            clock.reset_to(time_us);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.track = None;
        self.clock = None;
        self.sample = Vec::new();
        debug!(session = %self.session.id(), "Extractor released");
    }
}

impl std::fmt::Debug for FrameExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameExtractor")
            .field("session", &self.session.id())
            .field("track_declared", &self.track.is_some())
            .field("clock", &self.clock)
            .field("start_us", &self.start_us)
            .finish()
    }
}
