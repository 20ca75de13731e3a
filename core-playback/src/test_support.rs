//! Engine doubles shared by the unit tests.

use crate::session::Session;
use bridge_traits::{DecodeEngine, EssenceInfo, KdmRecord};
use chrono::{DateTime, Utc};
use mockall::mock;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

mock! {
    pub Engine {}

    impl DecodeEngine for Engine {
        fn init(&self) -> bool;
        fn uninit(&self);
        fn validate_kdm(&self, path: &Path) -> Option<KdmRecord>;
        fn bind_kdm(&self, path: &Path) -> bool;
        fn open_essence(&self, path: &Path) -> Option<EssenceInfo>;
        fn close_essence(&self);
        fn start_playback(&self) -> bool;
        fn stop_playback(&self);
        fn next_frame(&self, buffer: &mut [u8]) -> i32;
        fn seek(&self, position_us: i64);
        fn duration(&self) -> i64;
        fn frame_rate(&self) -> f32;
        fn is_encrypted(&self) -> bool;
        fn report_playback(&self, started: DateTime<Utc>, ended: DateTime<Utc>) -> bool;
    }
}

/// 2K, 24 fps, ten seconds.
pub fn essence(encrypted: bool) -> EssenceInfo {
    EssenceInfo {
        width: 2048,
        height: 1080,
        frame_rate: 24.0,
        duration_us: 10_000_000,
        codec: "jpeg2000".to_string(),
        is_encrypted: encrypted,
    }
}

/// Engine that accepts every lifecycle call. Frame pulls are left to the test.
pub fn permissive_engine(encrypted: bool) -> MockEngine {
    engine_with(essence(encrypted))
}

pub fn engine_with(info: EssenceInfo) -> MockEngine {
    let frame_rate = info.frame_rate;
    let duration = info.duration_us;
    let mut engine = MockEngine::new();
    engine.expect_init().returning(|| true);
    engine.expect_uninit().return_const(());
    engine.expect_bind_kdm().returning(|_| true);
    engine
        .expect_open_essence()
        .returning(move |_| Some(info.clone()));
    engine.expect_close_essence().return_const(());
    engine.expect_start_playback().returning(|| true);
    engine.expect_stop_playback().return_const(());
    engine.expect_duration().return_const(duration);
    engine.expect_frame_rate().return_const(frame_rate);
    engine.expect_report_playback().returning(|_, _| true);
    engine
}

/// Serve `frames` in order, then end of stream. Seeking jumps to the first
/// frame starting at or after the target time.
pub fn script_frames(engine: &mut MockEngine, frames: Vec<Vec<u8>>, frame_rate: f32) {
    let cursor = Arc::new(Mutex::new(0usize));

    let pull = cursor.clone();
    engine.expect_next_frame().returning(move |buf| {
        let mut index = pull.lock();
        let Some(frame) = frames.get(*index) else {
            return 0;
        };
        *index += 1;
        let len = frame.len().min(buf.len());
        buf[..len].copy_from_slice(&frame[..len]);
        frame.len() as i32
    });

    engine.expect_seek().returning(move |position_us| {
        let frames = (position_us as f64 - 0.5) * f64::from(frame_rate) / 1_000_000.0;
        *cursor.lock() = frames.ceil().max(0.0) as usize;
    });
}

/// `count` distinct frames of `size` bytes; frame `n` is filled with `n`.
pub fn numbered_frames(count: usize, size: usize) -> Vec<Vec<u8>> {
    (0..count).map(|n| vec![n as u8; size]).collect()
}

/// Session that has started playing the essence.
pub fn streaming_session(engine: MockEngine) -> Arc<Session> {
    let session = Arc::new(Session::new(Arc::new(engine)));
    session.initialize().unwrap();
    session.open_essence(Path::new("/dcp/reel1.mxf")).unwrap();
    session.start_playback().unwrap();
    session
}
