//! # Frame Pipeline Example
//!
//! Drives a session, frame source and extractor the way a host player would,
//! using a synthetic engine that produces numbered frames.
//!
//! Run with: `cargo run --example pipeline_demo --package core-playback`

use bridge_traits::{
    DataSource, DataSpec, DecodeEngine, EssenceInfo, Extractor, ExtractorOutput, ExtractorResult,
    KdmRecord, SampleFormat, SampleMetadata, SourceInput, TrackOutput, TrackType,
};
use core_playback::{AdapterConfig, FrameExtractor, FrameSource, Result, Session};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Synthetic Engine (for demonstration)
// ============================================================================

struct SyntheticEngine {
    frames: usize,
    frame_size: usize,
    next: Mutex<usize>,
}

impl SyntheticEngine {
    fn new(seconds: usize) -> Self {
        Self {
            frames: seconds * 24,
            frame_size: 250_000,
            next: Mutex::new(0),
        }
    }
}

impl DecodeEngine for SyntheticEngine {
    fn init(&self) -> bool {
        true
    }

    fn uninit(&self) {}

    fn validate_kdm(&self, _path: &Path) -> Option<KdmRecord> {
        None
    }

    fn bind_kdm(&self, _path: &Path) -> bool {
        true
    }

    fn open_essence(&self, _path: &Path) -> Option<EssenceInfo> {
        Some(EssenceInfo {
            width: 1998,
            height: 1080,
            frame_rate: 24.0,
            duration_us: self.duration(),
            codec: "jpeg2000".to_string(),
            is_encrypted: false,
        })
    }

    fn close_essence(&self) {}

    fn start_playback(&self) -> bool {
        true
    }

    fn stop_playback(&self) {}

    fn next_frame(&self, buffer: &mut [u8]) -> i32 {
        let mut next = self.next.lock();
        if *next >= self.frames || buffer.len() < self.frame_size {
            return 0;
        }
        buffer[..self.frame_size].fill((*next % 256) as u8);
        *next += 1;
        self.frame_size as i32
    }

    fn seek(&self, position_us: i64) {
        let frames = (position_us as f64 - 0.5) * 24.0 / 1_000_000.0;
        *self.next.lock() = frames.ceil().max(0.0) as usize;
    }

    fn duration(&self) -> i64 {
        self.frames as i64 * 1_000_000 / 24
    }

    fn frame_rate(&self) -> f32 {
        24.0
    }

    fn is_encrypted(&self) -> bool {
        false
    }
}

// ============================================================================
// Printing Player Output
// ============================================================================

#[derive(Default)]
struct PrintingOutput {
    samples: usize,
}

impl TrackOutput for PrintingOutput {
    fn format(&mut self, format: &SampleFormat) {
        println!(
            "  format: {} {:?} {}x{} @ {} fps",
            format.sample_mime_type,
            format.codecs,
            format.width.unwrap_or_default(),
            format.height.unwrap_or_default(),
            format.frame_rate.unwrap_or_default()
        );
    }

    fn sample_data(&mut self, _data: &[u8]) {}

    fn sample_metadata(&mut self, metadata: SampleMetadata) {
        self.samples += 1;
        if self.samples <= 5 || self.samples % 24 == 0 {
            println!(
                "  sample #{:<4} pts={:>9}us size={}",
                self.samples, metadata.time_us, metadata.size
            );
        }
    }
}

struct PrintingExtractorOutput;

impl ExtractorOutput for PrintingExtractorOutput {
    fn track(&mut self, id: u32, track_type: TrackType) -> Box<dyn TrackOutput> {
        println!("  track {id}: {track_type:?}");
        Box::new(PrintingOutput::default())
    }

    fn end_tracks(&mut self) {
        println!("  tracks complete");
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("core_playback=info")
        .init();

    println!("=== Frame Pipeline Demo ===\n");

    let session = Arc::new(Session::new(Arc::new(SyntheticEngine::new(3))));
    session.initialize()?;
    let info = session.open_essence(Path::new("demo_reel.mxf"))?;
    println!("Opened essence: {} us, {} fps", info.duration_us, info.frame_rate);
    session.start_playback()?;

    let config = AdapterConfig::default();
    let mut source = FrameSource::new(session.clone(), &config);
    let mut extractor = FrameExtractor::new(session.clone(), config);

    let duration = source.open(&DataSpec::new("dms://demo_reel"))?;
    println!("Source open, duration {duration} us\n");

    extractor.init(&mut PrintingExtractorOutput);

    println!("\nPlaying first second:");
    let mut input = SourceInput::new(&mut source);
    for _ in 0..24 {
        extractor.read(&mut input)?;
    }

    println!("\nSeeking to 2s:");
    extractor.seek(0, 2_000_000)?;
    let mut input = SourceInput::new(&mut source);
    let mut remaining = 0;
    while extractor.read(&mut input)? == ExtractorResult::Continue {
        remaining += 1;
    }
    println!("  {remaining} frames until end of stream");

    source.close()?;
    extractor.release();
    session.stop_playback()?;
    session.close_essence()?;
    session.uninitialize();

    println!("\nSession finished in phase: {}", session.phase());
    Ok(())
}
