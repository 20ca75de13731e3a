//! Scripted decode engine for integration tests.

#![allow(dead_code)]

use bridge_traits::{
    CheckResult, DecodeEngine, EssenceInfo, ExtractorOutput, KdmRecord, SampleFormat,
    SampleMetadata, TrackOutput, TrackType,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Scripted Engine
// ============================================================================

#[derive(Debug, Default)]
struct EngineState {
    cursor: usize,
    bound: bool,
    calls: Vec<String>,
    windows: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

/// In-memory engine that plays a fixed list of frames.
#[derive(Debug)]
pub struct ScriptedEngine {
    pub info: EssenceInfo,
    pub frames: Vec<Vec<u8>>,
    pub kdm_valid: bool,
    pub bind_succeeds: bool,
    state: Mutex<EngineState>,
}

impl ScriptedEngine {
    pub fn new(frame_rate: f32, frames: Vec<Vec<u8>>) -> Self {
        let duration_us = (frames.len() as f64 * 1_000_000.0 / f64::from(frame_rate)) as i64;
        Self {
            info: EssenceInfo {
                width: 1998,
                height: 1080,
                frame_rate,
                duration_us,
                codec: "jpeg2000".to_string(),
                is_encrypted: false,
            },
            frames,
            kdm_valid: true,
            bind_succeeds: true,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// `count` frames of `size` bytes, frame `n` filled with `n`.
    pub fn numbered(frame_rate: f32, count: usize, size: usize) -> Self {
        Self::new(frame_rate, (0..count).map(|n| vec![n as u8; size]).collect())
    }

    pub fn encrypted(mut self) -> Self {
        self.info.is_encrypted = true;
        self
    }

    pub fn without_geometry(mut self) -> Self {
        self.info.width = 0;
        self.info.height = 0;
        self
    }

    pub fn rejecting_bind(mut self) -> Self {
        self.bind_succeeds = false;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.state.lock().windows.clone()
    }

    fn log(&self, call: &str) {
        self.state.lock().calls.push(call.to_string());
    }
}

impl DecodeEngine for ScriptedEngine {
    fn init(&self) -> bool {
        self.log("init");
        true
    }

    fn uninit(&self) {
        self.log("uninit");
    }

    fn validate_kdm(&self, path: &Path) -> Option<KdmRecord> {
        self.log("validate_kdm");
        if path.extension().map_or(true, |ext| ext != "xml") {
            return None;
        }
        Some(KdmRecord {
            id: "urn:uuid:0b7d5bd2-4a3e-4c36-9f4e-3f3c0d9a1c11".to_string(),
            recipient_subject_name: "dnQualifier=test,CN=projector".to_string(),
            cpl_id: "urn:uuid:cpl".to_string(),
            content_title: "Test_FTR_F_EN-XX_51_2K_20260101".to_string(),
            valid_from: "2026-01-01 00:00:00".to_string(),
            valid_until: "2026-12-31 23:59:59".to_string(),
            session_count: 5,
            remaining_session_count: 4,
            time_window_check: CheckResult::from(self.kdm_valid),
            recipient_check: CheckResult::Pass,
        })
    }

    fn bind_kdm(&self, _path: &Path) -> bool {
        self.log("bind_kdm");
        if self.bind_succeeds {
            self.state.lock().bound = true;
        }
        self.bind_succeeds
    }

    fn open_essence(&self, _path: &Path) -> Option<EssenceInfo> {
        self.log("open_essence");
        self.state.lock().cursor = 0;
        Some(self.info.clone())
    }

    fn close_essence(&self) {
        self.log("close_essence");
    }

    fn start_playback(&self) -> bool {
        self.log("start_playback");
        true
    }

    fn stop_playback(&self) {
        self.log("stop_playback");
    }

    fn next_frame(&self, buffer: &mut [u8]) -> i32 {
        let mut state = self.state.lock();
        let Some(frame) = self.frames.get(state.cursor) else {
            return 0;
        };
        state.cursor += 1;
        let len = frame.len().min(buffer.len());
        buffer[..len].copy_from_slice(&frame[..len]);
        frame.len() as i32
    }

    fn seek(&self, position_us: i64) {
        self.log("seek");
        let frames = (position_us as f64 - 0.5) * f64::from(self.info.frame_rate) / 1_000_000.0;
        self.state.lock().cursor = frames.ceil().max(0.0) as usize;
    }

    fn duration(&self) -> i64 {
        self.info.duration_us
    }

    fn frame_rate(&self) -> f32 {
        self.info.frame_rate
    }

    fn is_encrypted(&self) -> bool {
        self.info.is_encrypted
    }

    fn report_playback(&self, started: DateTime<Utc>, ended: DateTime<Utc>) -> bool {
        self.log("report_playback");
        self.state.lock().windows.push((started, ended));
        true
    }
}

// ============================================================================
// Recording Player Output
// ============================================================================

#[derive(Debug, Default)]
pub struct Captured {
    pub tracks: Vec<(u32, TrackType)>,
    pub tracks_ended: bool,
    pub formats: Vec<SampleFormat>,
    pub samples: Vec<(Vec<u8>, SampleMetadata)>,
    pending: Vec<u8>,
}

/// Stands in for the host player's track and extractor outputs.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput(pub Arc<Mutex<Captured>>);

impl RecordingOutput {
    pub fn pts(&self) -> Vec<i64> {
        self.0.lock().samples.iter().map(|(_, m)| m.time_us).collect()
    }

    pub fn first_bytes(&self) -> Vec<u8> {
        self.0.lock().samples.iter().map(|(data, _)| data[0]).collect()
    }
}

impl TrackOutput for RecordingOutput {
    fn format(&mut self, format: &SampleFormat) {
        self.0.lock().formats.push(format.clone());
    }

    fn sample_data(&mut self, data: &[u8]) {
        self.0.lock().pending.extend_from_slice(data);
    }

    fn sample_metadata(&mut self, metadata: SampleMetadata) {
        let mut captured = self.0.lock();
        let data = std::mem::take(&mut captured.pending);
        captured.samples.push((data, metadata));
    }
}

impl ExtractorOutput for RecordingOutput {
    fn track(&mut self, id: u32, track_type: TrackType) -> Box<dyn TrackOutput> {
        self.0.lock().tracks.push((id, track_type));
        Box::new(self.clone())
    }

    fn end_tracks(&mut self) {
        self.0.lock().tracks_ended = true;
    }
}
