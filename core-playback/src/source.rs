//! # Frame Source
//!
//! [`DataSource`] over the decode engine. Every `read` pulls exactly one
//! decoded frame into a pre-allocated arena and copies it whole into the
//! caller's buffer; a frame is never split across reads.
//!
//! The byte position reported by the source is advisory. Random access goes
//! through the engine's time-based seek, so a non-zero start offset passed to
//! `open` is ignored and reading starts at the first frame.

use crate::config::AdapterConfig;
use crate::error::{PlaybackError, Result};
use crate::session::{FramePull, Session};
use bridge_traits::{DataSource, DataSpec, ReadOutcome};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A frame that did not fit the caller's buffer, kept for the retry.
#[derive(Debug, Clone, Copy)]
struct PendingFrame {
    size: usize,
    generation: u64,
}

/// Byte source delivering one whole engine frame per read.
pub struct FrameSource {
    session: Arc<Session>,
    arena: Box<[u8]>,
    pending: Option<PendingFrame>,
    position: u64,
}

impl FrameSource {
    pub fn new(session: Arc<Session>, config: &AdapterConfig) -> Self {
        Self::with_capacity(session, config.max_frame_size)
    }

    /// Source whose arena holds frames of up to `max_frame_size` bytes.
    pub fn with_capacity(session: Arc<Session>, max_frame_size: usize) -> Self {
        Self {
            session,
            arena: vec![0u8; max_frame_size].into_boxed_slice(),
            pending: None,
            position: 0,
        }
    }

    /// Bytes delivered since `open`.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Largest frame this source can deliver.
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_source_open()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Size of the next frame, pulling it from the engine unless a frame
    /// retained by an earlier short read is still current.
    fn next_frame(&mut self) -> Result<Option<PendingFrame>> {
        let generation = self.session.frame_gate()?;

        if let Some(pending) = self.pending.take() {
            if pending.generation == generation {
                return Ok(Some(pending));
            }
            debug!(size = pending.size, "Dropping frame retained before seek");
        }

        match self.session.read_frame(&mut self.arena)? {
            FramePull::Frame { size, generation } => Ok(Some(PendingFrame { size, generation })),
            FramePull::EndOfStream => Ok(None),
        }
    }
}

impl DataSource for FrameSource {
    type Error = PlaybackError;

    fn open(&mut self, spec: &DataSpec) -> Result<u64> {
        if spec.position != 0 {
            warn!(
                requested = spec.position,
                "Frame source cannot start at a byte offset; starting at the first frame"
            );
        }

        let duration_us = self.session.open_source()?;
        self.position = 0;
        self.pending = None;
        Ok(duration_us.max(0) as u64)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        let Some(frame) = self.next_frame()? else {
            return Ok(ReadOutcome::EndOfInput);
        };

        if frame.size > buf.len() {
            self.pending = Some(frame);
            return Err(PlaybackError::BufferTooSmall {
                required: frame.size,
                available: buf.len(),
            });
        }

        buf[..frame.size].copy_from_slice(&self.arena[..frame.size]);
        self.position += frame.size as u64;
        trace!(size = frame.size, position = self.position, "Frame delivered");
        Ok(ReadOutcome::Read(frame.size))
    }

    fn close(&mut self) -> Result<()> {
        self.pending = None;
        self.session.close_source();
        Ok(())
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("session", &self.session.id())
            .field("capacity", &self.arena.len())
            .field("position", &self.position)
            .field("pending", &self.pending.map(|p| p.size))
            .finish()
    }
}
