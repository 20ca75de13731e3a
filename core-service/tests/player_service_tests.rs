//! End-to-end tests of the player service over an in-memory engine.

use bridge_traits::{
    CheckResult, DataSource, DataSpec, DecodeEngine, EssenceInfo, Extractor, ExtractorOutput,
    ExtractorResult, KdmRecord, SampleFormat, SampleMetadata, SourceInput, TrackOutput, TrackType,
};
use core_playback::{AdapterConfig, SessionPhase};
use core_runtime::events::{CoreEvent, KdmEvent, PlaybackEvent};
use core_runtime::CoreConfig;
use core_service::{PlayerService, ServiceError};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Test Doubles
// ============================================================================

/// Encrypted essence whose frames only decode once `feature.xml` is bound.
#[derive(Debug, Default)]
struct VaultEngine {
    bound: Mutex<bool>,
    cursor: Mutex<usize>,
    frames: usize,
}

impl VaultEngine {
    fn with_frames(frames: usize) -> Self {
        Self {
            frames,
            ..Default::default()
        }
    }
}

impl DecodeEngine for VaultEngine {
    fn init(&self) -> bool {
        true
    }

    fn uninit(&self) {}

    fn validate_kdm(&self, path: &Path) -> Option<KdmRecord> {
        let name = path.file_name()?.to_str()?;
        if !name.ends_with(".xml") {
            return None;
        }
        Some(KdmRecord {
            id: format!("urn:uuid:{}", name),
            recipient_subject_name: "CN=SM.ws-1".to_string(),
            cpl_id: "urn:uuid:ce3f8b28-8d52-4c8a-a2a6-7f1f0d3b2c11".to_string(),
            content_title: "Feature_FTR_F_EN-XX_51_2K".to_string(),
            valid_from: "2026-10-01T00:00:00+00:00".to_string(),
            valid_until: "2026-10-31T23:59:59+00:00".to_string(),
            session_count: 3,
            remaining_session_count: 3,
            time_window_check: CheckResult::Pass,
            recipient_check: CheckResult::from(name == "feature.xml"),
        })
    }

    fn bind_kdm(&self, path: &Path) -> bool {
        let ok = path.file_name().map_or(false, |n| n == "feature.xml");
        *self.bound.lock() = ok;
        ok
    }

    fn open_essence(&self, path: &Path) -> Option<EssenceInfo> {
        if path.extension()? != "mxf" {
            return None;
        }
        *self.cursor.lock() = 0;
        Some(EssenceInfo {
            width: 2048,
            height: 858,
            frame_rate: 24.0,
            duration_us: self.frames as i64 * 1_000_000 / 24,
            codec: "jpeg2000".to_string(),
            is_encrypted: true,
        })
    }

    fn close_essence(&self) {}

    fn start_playback(&self) -> bool {
        *self.bound.lock()
    }

    fn stop_playback(&self) {}

    fn next_frame(&self, buffer: &mut [u8]) -> i32 {
        let mut cursor = self.cursor.lock();
        if *cursor >= self.frames {
            return 0;
        }
        buffer[..64].fill(*cursor as u8);
        *cursor += 1;
        64
    }

    fn seek(&self, position_us: i64) {
        let frames = (position_us as f64 - 0.5) * 24.0 / 1_000_000.0;
        *self.cursor.lock() = frames.ceil().max(0.0) as usize;
    }

    fn duration(&self) -> i64 {
        self.frames as i64 * 1_000_000 / 24
    }

    fn frame_rate(&self) -> f32 {
        24.0
    }

    fn is_encrypted(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct Captured {
    formats: Vec<SampleFormat>,
    samples: Vec<SampleMetadata>,
}

#[derive(Debug, Default, Clone)]
struct Recorder(Arc<Mutex<Captured>>);

struct RecorderTrack(Arc<Mutex<Captured>>);

impl TrackOutput for RecorderTrack {
    fn format(&mut self, format: &SampleFormat) {
        self.0.lock().formats.push(format.clone());
    }

    fn sample_data(&mut self, _data: &[u8]) {}

    fn sample_metadata(&mut self, metadata: SampleMetadata) {
        self.0.lock().samples.push(metadata);
    }
}

impl ExtractorOutput for Recorder {
    fn track(&mut self, _id: u32, _track_type: TrackType) -> Box<dyn TrackOutput> {
        Box::new(RecorderTrack(self.0.clone()))
    }

    fn end_tracks(&mut self) {}
}

fn player(frames: usize) -> PlayerService {
    let config = CoreConfig::builder()
        .engine(Arc::new(VaultEngine::with_frames(frames)))
        .build()
        .unwrap();
    PlayerService::new(config, AdapterConfig::default()).unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_select_validate_play_to_the_end() {
    let player = player(48);
    player.select_kdm("/media/usb/feature.xml");
    player.select_essence("/media/usb/reel1.mxf");

    assert!(player.validate_kdm().unwrap().is_valid());
    assert_eq!(player.status(), "KDM Valid: Yes");

    let mut pipeline = player.start().unwrap();
    assert_eq!(player.status(), "Playing MXF: reel1.mxf");
    assert_eq!(pipeline.uri(), "dms://reel1.mxf");

    let spec = DataSpec::new(pipeline.uri().to_string());
    let duration = pipeline.source.open(&spec).unwrap();
    assert_eq!(duration, 2_000_000);

    let recorder = Recorder::default();
    let mut output = recorder.clone();
    pipeline.extractor.init(&mut output);

    let mut input = SourceInput::new(&mut pipeline.source);
    while pipeline.extractor.read(&mut input).unwrap() == ExtractorResult::Continue {}
    drop(input);

    let captured = recorder.0.lock();
    assert_eq!(captured.samples.len(), 48);
    assert_eq!(captured.formats[0].width, Some(2048));
    assert_eq!(captured.samples[24].time_us, 1_000_000);
    drop(captured);

    pipeline.source.close().unwrap();
    pipeline.extractor.release();
    player.on_end_of_stream().unwrap();
    assert_eq!(player.status(), "Playback finished");
    assert_eq!(player.phase(), SessionPhase::EssenceClosed);
}

#[test]
fn test_foreign_kdm_validates_but_cannot_bind() {
    let player = player(24);
    player.select_kdm("/media/usb/other_cinema.xml");
    player.select_essence("/media/usb/reel1.mxf");

    assert!(!player.validate_kdm().unwrap().is_valid());
    assert_eq!(player.status(), "KDM Valid: No");

    assert!(player.start().is_err());
    assert_eq!(player.status(), "Failed to bind KDM");
}

#[test]
fn test_wrong_file_kinds() {
    let player = player(24);
    player.select_kdm("/media/usb/poster.jpg");
    assert!(player.validate_kdm().is_err());
    assert_eq!(player.status(), "KDM validation failed");

    player.select_kdm("/media/usb/feature.xml");
    player.select_essence("/media/usb/feature.xml");
    assert!(player.start().is_err());
    assert_eq!(player.status(), "Failed to open MXF file");
}

#[test]
fn test_restart_after_stop() {
    let player = player(24);
    player.select_kdm("/media/usb/feature.xml");
    player.select_essence("/media/usb/reel1.mxf");

    let _first = player.start().unwrap();
    player.stop();
    assert_eq!(player.status(), "Playback stopped");
    assert!(!player.is_playing());

    let _second = player.start().unwrap();
    assert!(player.is_playing());
    assert_eq!(player.status(), "Playing MXF: reel1.mxf");
}

#[test]
fn test_nothing_selected_errors() {
    let player = player(24);
    assert!(matches!(
        player.start(),
        Err(ServiceError::NothingSelected(_))
    ));
    assert_eq!(player.status(), "No MXF file selected");
}

#[tokio::test]
async fn test_events_follow_the_session() {
    let player = player(24);
    let mut events = player
        .subscribe_events()
        .filter(|event| !matches!(event, CoreEvent::Session(_)));
    player.select_kdm("/media/usb/feature.xml");
    player.select_essence("/media/usb/reel1.mxf");

    let _pipeline = player.start().unwrap();

    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Kdm(KdmEvent::Bound { .. })
    ));
    match events.recv().await.unwrap() {
        CoreEvent::Playback(PlaybackEvent::EssenceOpened {
            file, encrypted, ..
        }) => {
            assert_eq!(file, "reel1.mxf");
            assert!(encrypted);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}
