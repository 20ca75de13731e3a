//! Native decode engine bridge.
//!
//! The engine owns everything cryptographic and codec-related: KDM validation
//! and binding, MXF essence parsing, frame decryption and decompression. The
//! core only drives its lifecycle and pulls frames through the narrow surface
//! defined here.
//!
//! Implementations are injected explicitly (one handle per session) instead of
//! being reached through process-global state. All methods take `&self`; an
//! implementation that wraps a non-reentrant native library is expected to
//! serialise internally or rely on the caller, which never issues two
//! concurrent frame pulls or seeks against the same handle.

use crate::platform::PlatformSendSync;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Outcome of a single KDM check performed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckResult {
    Pass,
    Fail,
}

impl CheckResult {
    pub fn passed(self) -> bool {
        matches!(self, CheckResult::Pass)
    }
}

impl From<bool> for CheckResult {
    fn from(passed: bool) -> Self {
        if passed {
            CheckResult::Pass
        } else {
            CheckResult::Fail
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckResult::Pass => f.write_str("pass"),
            CheckResult::Fail => f.write_str("fail"),
        }
    }
}

/// Parsed Key Delivery Message as reported by the engine.
///
/// A record is produced for every KDM the engine can parse, including ones it
/// rejects; the check fields say why a parseable KDM is not usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdmRecord {
    pub id: String,
    pub recipient_subject_name: String,
    pub cpl_id: String,
    pub content_title: String,
    /// Start of the validity window, as printed in the KDM.
    pub valid_from: String,
    /// End of the validity window, as printed in the KDM.
    pub valid_until: String,
    pub session_count: u32,
    pub remaining_session_count: u32,
    pub time_window_check: CheckResult,
    pub recipient_check: CheckResult,
}

impl KdmRecord {
    /// `true` when every check performed by the engine passed.
    pub fn is_valid(&self) -> bool {
        self.time_window_check.passed() && self.recipient_check.passed()
    }
}

/// Properties of an opened essence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssenceInfo {
    /// Picture width in pixels, `0` when the engine does not know it.
    pub width: u32,
    /// Picture height in pixels, `0` when the engine does not know it.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: f32,
    /// Total duration in microseconds.
    pub duration_us: i64,
    /// Codec of the picture essence (e.g. `"jpeg2000"`).
    pub codec: String,
    pub is_encrypted: bool,
}

impl EssenceInfo {
    /// Geometry reported by the engine, if both dimensions are known.
    pub fn geometry(&self) -> Option<(u32, u32)> {
        if self.width > 0 && self.height > 0 {
            Some((self.width, self.height))
        } else {
            None
        }
    }
}

/// Capability surface of the native decode engine.
///
/// Boolean and `Option` returns mirror the native calling convention; the
/// playback core translates them into typed errors.
pub trait DecodeEngine: PlatformSendSync {
    /// Initialise the engine. Returns `false` when the native library could
    /// not be brought up.
    fn init(&self) -> bool;

    /// Tear the engine down. Safe to call on an engine that failed to init.
    fn uninit(&self);

    /// Parse and check a KDM. `None` means the file could not be parsed.
    fn validate_kdm(&self, path: &Path) -> Option<KdmRecord>;

    /// Bind the KDM so that encrypted essence can be decrypted.
    fn bind_kdm(&self, path: &Path) -> bool;

    /// Open an MXF essence. `None` means it could not be opened.
    fn open_essence(&self, path: &Path) -> Option<EssenceInfo>;

    fn close_essence(&self);

    fn start_playback(&self) -> bool;

    fn stop_playback(&self);

    /// Decode the next frame into `buffer`.
    ///
    /// Returns the frame size in bytes, or a value `<= 0` at end of stream
    /// (including decode failures the engine cannot recover from).
    fn next_frame(&self, buffer: &mut [u8]) -> i32;

    /// Reposition to the frame boundary nearest to `position_us`.
    fn seek(&self, position_us: i64);

    /// Duration of the opened essence in microseconds.
    fn duration(&self) -> i64;

    fn frame_rate(&self) -> f32;

    fn is_encrypted(&self) -> bool;

    /// Report the wall-clock window during which the essence was played.
    ///
    /// Engines that keep a playback log record the window here. The default
    /// accepts and discards it.
    fn report_playback(&self, _started: DateTime<Utc>, _ended: DateTime<Utc>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time_window: CheckResult, recipient: CheckResult) -> KdmRecord {
        KdmRecord {
            id: "urn:uuid:5d9f1e4a-0000-4000-8000-000000000001".to_string(),
            recipient_subject_name: "CN=projector".to_string(),
            cpl_id: "urn:uuid:5d9f1e4a-0000-4000-8000-000000000002".to_string(),
            content_title: "Feature_FTR_F_EN-XX".to_string(),
            valid_from: "2026-01-01 00:00:00".to_string(),
            valid_until: "2026-12-31 23:59:59".to_string(),
            session_count: 10,
            remaining_session_count: 9,
            time_window_check: time_window,
            recipient_check: recipient,
        }
    }

    #[test]
    fn kdm_valid_only_when_all_checks_pass() {
        assert!(record(CheckResult::Pass, CheckResult::Pass).is_valid());
        assert!(!record(CheckResult::Fail, CheckResult::Pass).is_valid());
        assert!(!record(CheckResult::Pass, CheckResult::Fail).is_valid());
    }

    #[test]
    fn check_result_from_bool() {
        assert_eq!(CheckResult::from(true), CheckResult::Pass);
        assert_eq!(CheckResult::from(false), CheckResult::Fail);
        assert_eq!(CheckResult::Fail.to_string(), "fail");
    }

    #[test]
    fn essence_geometry_requires_both_dimensions() {
        let mut info = EssenceInfo {
            width: 2048,
            height: 858,
            frame_rate: 24.0,
            duration_us: 120_000_000,
            codec: "jpeg2000".to_string(),
            is_encrypted: true,
        };
        assert_eq!(info.geometry(), Some((2048, 858)));

        info.height = 0;
        assert_eq!(info.geometry(), None);
    }

    #[test]
    fn kdm_record_serializes_check_results_by_name() {
        let json = serde_json::to_value(record(CheckResult::Pass, CheckResult::Fail)).unwrap();
        assert_eq!(json["time_window_check"], "Pass");
        assert_eq!(json["recipient_check"], "Fail");
        assert_eq!(json["remaining_session_count"], 9);
    }
}
