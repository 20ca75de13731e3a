//! End-to-end tests of the frame source and extractor driven the way a host
//! player drives them.
//!
//! This test suite verifies:
//! - Sample timing at a constant frame rate
//! - Frame boundaries and byte fidelity
//! - Seeking, short buffers and end of stream
//! - Closing the source from another thread

mod common;

use bridge_traits::{
    DataSource, DataSpec, Extractor, ExtractorResult, ReadOutcome, SampleFlags, SourceInput,
    TrackType,
};
use common::{RecordingOutput, ScriptedEngine};
use core_playback::{
    AdapterConfig, FrameExtractor, FrameSource, PlaybackError, Session, SessionPhase,
    VIDEO_TRACK_ID,
};
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

struct Pipeline {
    engine: Arc<ScriptedEngine>,
    session: Arc<Session>,
    source: FrameSource,
    extractor: FrameExtractor,
    output: RecordingOutput,
}

fn playing_pipeline(engine: ScriptedEngine, config: AdapterConfig) -> Pipeline {
    let engine = Arc::new(engine);
    let session = Arc::new(Session::new(engine.clone()));
    session.initialize().unwrap();
    session.open_essence(Path::new("/dcp/reel1.mxf")).unwrap();
    session.start_playback().unwrap();

    let mut source = FrameSource::new(session.clone(), &config);
    source.open(&DataSpec::new("dms://reel1")).unwrap();

    let mut extractor = FrameExtractor::new(session.clone(), config);
    let mut output = RecordingOutput::default();
    assert!(extractor.sniff(&mut SourceInput::new(&mut source)));
    extractor.init(&mut output);

    Pipeline {
        engine,
        session,
        source,
        extractor,
        output,
    }
}

fn drain(pipeline: &mut Pipeline) -> usize {
    let mut input = SourceInput::new(&mut pipeline.source);
    let mut count = 0;
    while pipeline.extractor.read(&mut input).unwrap() == ExtractorResult::Continue {
        count += 1;
    }
    count
}

// ============================================================================
// Timing
// ============================================================================

#[test]
fn test_ten_frames_at_24fps() {
    let mut pipeline = playing_pipeline(
        ScriptedEngine::numbered(24.0, 10, 1000),
        AdapterConfig::default(),
    );

    assert_eq!(drain(&mut pipeline), 10);
    assert_eq!(
        pipeline.output.pts(),
        vec![0, 41_667, 83_333, 125_000, 166_667, 208_333, 250_000, 291_667, 333_333, 375_000]
    );

    let captured = pipeline.output.0.lock();
    assert_eq!(captured.tracks, vec![(VIDEO_TRACK_ID, TrackType::Video)]);
    assert!(captured.tracks_ended);
    assert_eq!(captured.formats.len(), 1);
    assert!(captured
        .samples
        .iter()
        .all(|(data, m)| data.len() == 1000 && m.size == 1000 && m.flags == SampleFlags::KEY_FRAME));
}

#[test]
fn test_frame_interval_stays_within_a_microsecond() {
    for frame_rate in [23.976f32, 24.0, 25.0, 29.97, 48.0, 60.0] {
        let mut pipeline = playing_pipeline(
            ScriptedEngine::numbered(frame_rate, 500, 8),
            AdapterConfig::default().with_max_frame_size(64),
        );
        drain(&mut pipeline);

        let interval = 1_000_000.0 / f64::from(frame_rate);
        let pts = pipeline.output.pts();
        for (k, window) in pts.windows(2).enumerate() {
            let delta = window[1] - window[0];
            assert!(
                (delta - interval.round() as i64).abs() <= 1,
                "{frame_rate} fps: delta {delta} at frame {k}"
            );
        }
        for (k, &t) in pts.iter().enumerate() {
            let exact = k as f64 * interval;
            assert!((t as f64 - exact).abs() <= 0.501, "{frame_rate} fps: drift at frame {k}");
        }
    }
}

#[test]
fn test_seek_restarts_at_target() {
    let mut pipeline = playing_pipeline(
        ScriptedEngine::numbered(24.0, 240, 32),
        AdapterConfig::default(),
    );
    {
        let mut input = SourceInput::new(&mut pipeline.source);
        for _ in 0..5 {
            pipeline.extractor.read(&mut input).unwrap();
        }
    }

    pipeline.extractor.seek(0, 2_000_000).unwrap();
    pipeline
        .extractor
        .read(&mut SourceInput::new(&mut pipeline.source))
        .unwrap();

    let pts = pipeline.output.pts();
    assert!(pts[5] >= 2_000_000);
    assert_eq!(pts[5], 2_000_000);
    assert_eq!(pipeline.output.first_bytes()[5], 48);
    assert_eq!(pipeline.session.cursor_us(), 2_000_000);
}

#[test]
fn test_off_grid_seek_never_lands_before_target() {
    let mut pipeline = playing_pipeline(
        ScriptedEngine::numbered(24.0, 240, 32),
        AdapterConfig::default(),
    );

    // 1.02 s sits between frame 24 (1_000_000) and frame 25 (1_041_667).
    pipeline.extractor.seek(0, 1_020_000).unwrap();
    pipeline
        .extractor
        .read(&mut SourceInput::new(&mut pipeline.source))
        .unwrap();

    let frame = usize::from(pipeline.output.first_bytes()[0]);
    assert_eq!(frame, 25);
    let frame_start_us = (frame as f64 * 1_000_000.0 / 24.0).round() as i64;
    assert!(frame_start_us >= 1_020_000);
    assert_eq!(pipeline.output.pts()[0], 1_020_000);
}

// ============================================================================
// Frame Delivery
// ============================================================================

#[test]
fn test_frames_are_copied_unchanged() {
    let frames: Vec<Vec<u8>> = (1..=5usize)
        .map(|n| (0..n * 97).map(|i| (i * 31 % 251) as u8).collect())
        .collect();
    let engine = Arc::new(ScriptedEngine::new(24.0, frames.clone()));
    let session = Arc::new(Session::new(engine));
    session.initialize().unwrap();
    session.open_essence(Path::new("reel.mxf")).unwrap();
    session.start_playback().unwrap();

    let mut source = FrameSource::new(session, &AdapterConfig::default());
    source.open(&DataSpec::new("dms://reel")).unwrap();

    let mut buf = vec![0u8; 1024];
    for frame in &frames {
        assert_eq!(source.read(&mut buf), Ok(ReadOutcome::Read(frame.len())));
        assert_eq!(&buf[..frame.len()], frame.as_slice());
    }
    assert_eq!(source.read(&mut buf), Ok(ReadOutcome::EndOfInput));
    assert_eq!(
        source.position(),
        frames.iter().map(|f| f.len() as u64).sum::<u64>()
    );
}

#[test]
fn test_short_buffer_never_copies_partially() {
    let mut pipeline = playing_pipeline(
        ScriptedEngine::numbered(24.0, 2, 100),
        AdapterConfig::default(),
    );

    let mut small = [0xAAu8; 50];
    assert_eq!(
        pipeline.source.read(&mut small),
        Err(PlaybackError::BufferTooSmall {
            required: 100,
            available: 50
        })
    );
    assert!(small.iter().all(|&b| b == 0xAA));

    let mut buf = [0u8; 100];
    assert_eq!(pipeline.source.read(&mut buf), Ok(ReadOutcome::Read(100)));
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn test_end_of_stream_then_stop_and_close() {
    let mut pipeline = playing_pipeline(
        ScriptedEngine::numbered(24.0, 3, 16),
        AdapterConfig::default(),
    );
    assert_eq!(drain(&mut pipeline), 3);

    pipeline.source.close().unwrap();
    pipeline.extractor.release();
    pipeline.session.stop_playback().unwrap();
    pipeline.session.close_essence().unwrap();
    pipeline.session.uninitialize();

    assert_eq!(pipeline.session.phase(), SessionPhase::Uninitialized);
    assert_eq!(
        pipeline.engine.calls(),
        vec![
            "init",
            "open_essence",
            "start_playback",
            "stop_playback",
            "close_essence",
            "report_playback",
            "uninit"
        ]
    );
    assert_eq!(pipeline.engine.windows().len(), 1);
}

#[test]
fn test_source_is_closed_from_another_thread() {
    let pipeline = playing_pipeline(
        ScriptedEngine::numbered(24.0, 10_000, 64),
        AdapterConfig::default().with_max_frame_size(64),
    );
    let Pipeline {
        session,
        mut source,
        ..
    } = pipeline;

    let reader = std::thread::spawn(move || {
        let mut buf = [0u8; 64];
        let mut frames = 0usize;
        loop {
            match source.read(&mut buf) {
                Ok(ReadOutcome::Read(_)) => frames += 1,
                Ok(ReadOutcome::EndOfInput) => return Ok(frames),
                Err(err) => return Err(err),
            }
        }
    });

    std::thread::sleep(std::time::Duration::from_millis(5));
    session.close_source();

    match reader.join().unwrap() {
        Err(PlaybackError::NotOpen) => {}
        Ok(frames) => assert_eq!(frames, 10_000),
        Err(other) => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.phase(), SessionPhase::Playing);
}

#[test]
fn test_pause_and_resume_keeps_the_cursor() {
    let mut pipeline = playing_pipeline(
        ScriptedEngine::numbered(24.0, 48, 8),
        AdapterConfig::default(),
    );
    {
        let mut input = SourceInput::new(&mut pipeline.source);
        for _ in 0..4 {
            pipeline.extractor.read(&mut input).unwrap();
        }
    }

    pipeline.session.stop_playback().unwrap();
    assert!(pipeline
        .extractor
        .read(&mut SourceInput::new(&mut pipeline.source))
        .is_err());

    pipeline.session.start_playback().unwrap();
    pipeline
        .extractor
        .read(&mut SourceInput::new(&mut pipeline.source))
        .unwrap();

    assert_eq!(pipeline.output.pts()[4], 166_667);
    assert_eq!(pipeline.output.first_bytes()[4], 4);
}
