//! Host media player bridge.
//!
//! The host player consumes media through two pull-based abstractions: a
//! byte-oriented [`DataSource`] and an elementary-stream [`Extractor`] that
//! turns what the source yields into timed samples on declared tracks. The
//! playback core implements both; the host implements the output side
//! ([`ExtractorOutput`] / [`TrackOutput`]) that receives formats and samples.

use crate::platform::PlatformSend;
use std::fmt;
use std::ops::BitOr;

/// Describes the region of a resource a [`DataSource`] should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSpec {
    /// Resource identifier understood by the source.
    pub uri: String,
    /// Requested start offset.
    pub position: u64,
    /// Requested length, `None` when unbounded.
    pub length: Option<u64>,
}

impl DataSpec {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            position: 0,
            length: None,
        }
    }

    pub fn with_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }
}

/// Result of a single pull from a source or extractor input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were written to the front of the caller's buffer.
    Read(usize),
    /// The source is exhausted. Not an error.
    EndOfInput,
}

/// Pull-based byte source consumed by the host player.
pub trait DataSource: PlatformSend {
    type Error: std::error::Error + PlatformSend + 'static;

    /// Open the source and return its length as understood by the source.
    ///
    /// Frame-oriented sources report their total duration in microseconds.
    fn open(&mut self, spec: &DataSpec) -> Result<u64, Self::Error>;

    /// Read into `buf`. The capacity offered to the source is `buf.len()`.
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, Self::Error>;

    /// Close the source. Must be idempotent.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// Input handed to an [`Extractor`].
pub trait ExtractorInput {
    type Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, Self::Error>;

    /// Bytes consumed through this input so far.
    fn position(&self) -> u64;
}

/// [`ExtractorInput`] over an opened [`DataSource`], counting consumed bytes.
pub struct SourceInput<'a, S: DataSource> {
    source: &'a mut S,
    position: u64,
}

impl<'a, S: DataSource> SourceInput<'a, S> {
    pub fn new(source: &'a mut S) -> Self {
        Self {
            source,
            position: 0,
        }
    }
}

impl<S: DataSource> ExtractorInput for SourceInput<'_, S> {
    type Error = S::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, Self::Error> {
        let outcome = self.source.read(buf)?;
        if let ReadOutcome::Read(n) = outcome {
            self.position += n as u64;
        }
        Ok(outcome)
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// Kind of elementary stream carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Video,
    Audio,
    Text,
}

/// Per-sample flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SampleFlags(u32);

impl SampleFlags {
    pub const NONE: SampleFlags = SampleFlags(0);
    /// The sample can be decoded without reference to any other sample.
    pub const KEY_FRAME: SampleFlags = SampleFlags(1);
    pub const DECODE_ONLY: SampleFlags = SampleFlags(1 << 31);

    pub fn contains(self, other: SampleFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for SampleFlags {
    type Output = SampleFlags;

    fn bitor(self, rhs: SampleFlags) -> SampleFlags {
        SampleFlags(self.0 | rhs.0)
    }
}

/// Format declared on a track before its first sample.
///
/// `None` fields are unset and left for the host to infer.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFormat {
    pub sample_mime_type: String,
    pub codecs: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub initialization_data: Vec<Vec<u8>>,
    pub average_bitrate: Option<u32>,
    pub peak_bitrate: Option<u32>,
    pub pcm_encoding: Option<u32>,
    pub encoder_delay: Option<u32>,
    pub encoder_padding: Option<u32>,
}

impl SampleFormat {
    pub fn new(sample_mime_type: impl Into<String>) -> Self {
        Self {
            sample_mime_type: sample_mime_type.into(),
            codecs: None,
            width: None,
            height: None,
            frame_rate: None,
            initialization_data: Vec::new(),
            average_bitrate: None,
            peak_bitrate: None,
            pcm_encoding: None,
            encoder_delay: None,
            encoder_padding: None,
        }
    }

    pub fn with_codecs(mut self, codecs: impl Into<String>) -> Self {
        self.codecs = Some(codecs.into());
        self
    }

    pub fn with_geometry(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: f32) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }
}

/// Timing and layout of one sample written through [`TrackOutput::sample_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleMetadata {
    /// Presentation time in microseconds.
    pub time_us: i64,
    pub flags: SampleFlags,
    /// Size of the sample in bytes.
    pub size: usize,
    /// Bytes written after this sample's data (always `0` here).
    pub offset: usize,
}

/// Receives the format and samples of one declared track.
pub trait TrackOutput: PlatformSend {
    fn format(&mut self, format: &SampleFormat);

    fn sample_data(&mut self, data: &[u8]);

    fn sample_metadata(&mut self, metadata: SampleMetadata);
}

/// Receives track declarations from an [`Extractor`].
pub trait ExtractorOutput {
    /// Declare a track and return the handle its samples are written to.
    fn track(&mut self, id: u32, track_type: TrackType) -> Box<dyn TrackOutput>;

    /// Signal that no further tracks will be declared.
    fn end_tracks(&mut self);
}

/// What an [`Extractor::read`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorResult {
    Continue,
    EndOfInput,
}

impl fmt::Display for ExtractorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractorResult::Continue => f.write_str("continue"),
            ExtractorResult::EndOfInput => f.write_str("end of input"),
        }
    }
}

/// Elementary-stream demultiplexer driven by the host player.
pub trait Extractor: PlatformSend {
    type Error: std::error::Error + PlatformSend + 'static;

    /// Whether this extractor handles the stream behind `input`.
    fn sniff<I: ExtractorInput>(&mut self, input: &mut I) -> bool;

    /// Declare tracks on `output`.
    fn init(&mut self, output: &mut dyn ExtractorOutput);

    /// Consume input and emit at most one sample.
    fn read<I>(&mut self, input: &mut I) -> Result<ExtractorResult, Self::Error>
    where
        I: ExtractorInput,
        Self::Error: From<I::Error>;

    /// Reposition to `time_us`. `position` is the byte offset the host resumes
    /// reading from.
    fn seek(&mut self, position: u64, time_us: i64) -> Result<(), Self::Error>;

    /// Release extractor-local resources.
    fn release(&mut self);
}
