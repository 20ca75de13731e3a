//! # libdms Decode Engine
//!
//! [`DecodeEngine`] over the vendor's C library (`libdms`), linked at build
//! time when the `libdms` feature is enabled.
//!
//! ## Overview
//!
//! The library is process-global and not reentrant. All calls from one
//! [`LibDmsEngine`] go through its internal mutex; hosts must not create a
//! second engine while one is initialized.
//!
//! The C API positions by stream offset, not time. The engine records the
//! offset of every picture unit it hands out and seeks through that index,
//! decoding forward from the furthest known unit when the target has not
//! been reached yet.

use crate::status;
use bridge_traits::{CheckResult, DecodeEngine, EssenceInfo, KdmRecord};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::Path;
use std::ptr;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// ============================================================================
// FFI
// ============================================================================

mod ffi {
    use std::os::raw::{c_char, c_int};

    pub const DMS_MODE_PLAY: c_int = 0x0000_0001;

    #[repr(C)]
    pub struct DmsDataUnit {
        pub pos: i64,
        pub pts: i64,
        pub length: u32,
        pub data: *mut u8,
    }

    #[repr(C)]
    pub struct DmsMovieExtension {
        pub cpl_id: [c_char; 46],
        pub title: *mut c_char,
        pub director: *mut c_char,
        pub editor: *mut c_char,
        pub cast: *mut c_char,
        pub label: *mut c_char,
        pub country: *mut c_char,
        /// Seconds.
        pub duration: u16,
        pub intro: *mut c_char,
        pub manufacture_date: u16,
        pub poster_file_type: [c_char; 6],
        pub poster_length: u32,
        pub poster: *mut u8,
    }

    #[repr(C)]
    pub struct KdmInfomation {
        pub id: *mut c_char,
        pub recipient_subject_name: *mut c_char,
        pub cpl_id: *mut c_char,
        pub content_title: *mut c_char,
        pub not_valid_before: [c_char; 26],
        pub not_valid_after: [c_char; 26],
        pub session_count: u32,
        pub remain_session_count: u32,
        pub validate_time_window_result: c_int,
        pub validate_recipient_result: c_int,
    }

    pub type GetLocationFun =
        Option<extern "C" fn(*mut f32, *mut f32, *mut c_char, *mut c_char) -> c_int>;

    #[link(name = "dms")]
    extern "C" {
        pub fn _dms_library_initialize(
            mode: c_int,
            get_location: GetLocationFun,
            enable_log: bool,
        ) -> c_int;
        pub fn _dms_library_uninitialize();
        pub fn _dms_validate_kdm(path: *const c_char, info: *mut *mut KdmInfomation) -> c_int;
        pub fn _dms_free_kdm_infomation(info: *mut *mut KdmInfomation);
        pub fn _dms_bind_kdm(path: *const c_char) -> c_int;
        pub fn _dms_open_dcp(path: *const c_char, session_id: *const c_char, preview: bool)
            -> c_int;
        pub fn _dms_close_dcp();
        pub fn _dms_get_movie_extension() -> *mut DmsMovieExtension;
        pub fn _dms_free_movie_extension(extension: *mut *mut DmsMovieExtension);
        pub fn _dms_get_next_picture_unit(unit: *mut *mut DmsDataUnit) -> c_int;
        pub fn _dms_free_data_unit(unit: *mut *mut DmsDataUnit);
        pub fn _dms_goto_pos(pos: i64, breakpoint: bool) -> c_int;
        pub fn _dms_set_playback_ended(start: *const c_char, end: *const c_char) -> c_int;
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Properties the C API does not report, plus library switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibDmsConfig {
    /// Let the library write its own log.
    #[serde(default = "default_true")]
    pub native_log: bool,

    /// Open in preview mode (first five minutes, no screening consumed).
    #[serde(default)]
    pub preview: bool,

    /// Screening identifier passed to the library, `urn:uuid:` form. A fresh
    /// one is generated for every open when unset.
    #[serde(default)]
    pub screening_id: Option<String>,

    /// Frame rate of the picture track.
    ///
    /// Default: 24.0
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,

    /// Picture width, `0` when unknown.
    #[serde(default)]
    pub width: u32,

    /// Picture height, `0` when unknown.
    #[serde(default)]
    pub height: u32,

    /// Report opened essence as encrypted.
    ///
    /// Default: true
    #[serde(default = "default_true")]
    pub encrypted: bool,
}

impl Default for LibDmsConfig {
    fn default() -> Self {
        Self {
            native_log: true,
            preview: false,
            screening_id: None,
            frame_rate: default_frame_rate(),
            width: 0,
            height: 0,
            encrypted: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_frame_rate() -> f32 {
    24.0
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Default)]
struct EngineState {
    initialized: bool,
    essence_open: bool,
    duration_us: i64,
    /// Stream offset of every unit handed out, by frame number.
    positions: Vec<i64>,
    /// Frame number of the next unit.
    next_frame: usize,
}

/// Decode engine backed by `libdms`.
#[derive(Debug)]
pub struct LibDmsEngine {
    config: LibDmsConfig,
    state: Mutex<EngineState>,
}

impl LibDmsEngine {
    pub fn new(config: LibDmsConfig) -> Self {
        Self {
            config,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn config(&self) -> &LibDmsConfig {
        &self.config
    }

    /// First frame whose start is at or after `position_us`. Frame starts
    /// rounded to the microsecond still map to their own frame.
    fn frame_at(&self, position_us: i64) -> usize {
        let frames = (position_us as f64 - 0.5) * f64::from(self.config.frame_rate) / 1_000_000.0;
        frames.ceil().max(0.0) as usize
    }

    /// Pull one unit and hand its bytes to `consume`. Returns the unit
    /// length, or `None` at end of stream or on failure.
    fn pull_unit<F>(&self, state: &mut EngineState, consume: F) -> Option<usize>
    where
        F: FnOnce(&[u8]),
    {
        let mut unit: *mut ffi::DmsDataUnit = ptr::null_mut();
        // SAFETY: the library writes a unit pointer or leaves it null.
        let code = unsafe { ffi::_dms_get_next_picture_unit(&mut unit) } as u32;

        if !status::is_success(code) || unit.is_null() {
            if status::is_end_of_stream(code) {
                debug!(code = status::name(code), "Picture track finished");
            } else {
                warn!(
                    code = status::name(code),
                    reason = status::description(code),
                    "Picture unit unavailable"
                );
            }
            return None;
        }

        // SAFETY: non-null unit returned with SUCCESS; freed below.
        let length = unsafe {
            let unit_ref = &*unit;
            let length = unit_ref.length as usize;
            if !unit_ref.data.is_null() {
                consume(std::slice::from_raw_parts(unit_ref.data, length));
            }
            let frame = state.next_frame;
            if frame == state.positions.len() {
                state.positions.push(unit_ref.pos);
            }
            length
        };
        // SAFETY: unit came from _dms_get_next_picture_unit.
        unsafe { ffi::_dms_free_data_unit(&mut unit) };

        state.next_frame += 1;
        Some(length)
    }

    fn read_movie_duration(&self) -> i64 {
        // SAFETY: returns null or a struct owned by the caller.
        let mut extension = unsafe { ffi::_dms_get_movie_extension() };
        if extension.is_null() {
            debug!("Movie extension unavailable");
            return 0;
        }
        // SAFETY: non-null and freed right after.
        let seconds = unsafe { (*extension).duration };
        unsafe { ffi::_dms_free_movie_extension(&mut extension) };
        i64::from(seconds) * 1_000_000
    }
}

impl DecodeEngine for LibDmsEngine {
    fn init(&self) -> bool {
        let mut state = self.state.lock();
        // SAFETY: no location callback.
        let code = unsafe {
            ffi::_dms_library_initialize(ffi::DMS_MODE_PLAY, None, self.config.native_log)
        } as u32;

        if status::is_success(code) || code == status::LIB_INITIALIZED {
            state.initialized = true;
            info!("libdms initialized");
            true
        } else {
            error!(
                code = status::name(code),
                reason = status::description(code),
                "libdms failed to initialize"
            );
            false
        }
    }

    fn uninit(&self) {
        let mut state = self.state.lock();
        if state.essence_open {
            // SAFETY: an essence is open.
            unsafe { ffi::_dms_close_dcp() };
        }
        if state.initialized {
            // SAFETY: paired with a successful initialize.
            unsafe { ffi::_dms_library_uninitialize() };
        }
        *state = EngineState::default();
    }

    fn validate_kdm(&self, path: &Path) -> Option<KdmRecord> {
        let _state = self.state.lock();
        let path = c_path(path)?;
        let mut info: *mut ffi::KdmInfomation = ptr::null_mut();
        // SAFETY: path is NUL-terminated; info is written or left null.
        let code = unsafe { ffi::_dms_validate_kdm(path.as_ptr(), &mut info) } as u32;

        if !status::is_success(code) || info.is_null() {
            warn!(
                code = status::name(code),
                reason = status::description(code),
                "KDM validation failed"
            );
            return None;
        }

        // SAFETY: non-null info returned with SUCCESS; freed below.
        let record = unsafe {
            let kdm = &*info;
            KdmRecord {
                id: owned(kdm.id),
                recipient_subject_name: owned(kdm.recipient_subject_name),
                cpl_id: owned(kdm.cpl_id),
                content_title: owned(kdm.content_title),
                valid_from: fixed(&kdm.not_valid_before),
                valid_until: fixed(&kdm.not_valid_after),
                session_count: kdm.session_count,
                remaining_session_count: kdm.remain_session_count,
                time_window_check: CheckResult::from(kdm.validate_time_window_result == 0),
                recipient_check: CheckResult::from(kdm.validate_recipient_result == 0),
            }
        };
        // SAFETY: info came from _dms_validate_kdm.
        unsafe { ffi::_dms_free_kdm_infomation(&mut info) };
        Some(record)
    }

    fn bind_kdm(&self, path: &Path) -> bool {
        let _state = self.state.lock();
        let Some(path) = c_path(path) else {
            return false;
        };
        // SAFETY: path is NUL-terminated.
        let code = unsafe { ffi::_dms_bind_kdm(path.as_ptr()) } as u32;
        if let Err(err) = status::check("_dms_bind_kdm", code) {
            warn!(error = %err, reason = status::description(code), "KDM bind refused");
            return false;
        }
        true
    }

    fn open_essence(&self, path: &Path) -> Option<EssenceInfo> {
        let mut state = self.state.lock();
        let path = c_path(path)?;
        let screening = self
            .config
            .screening_id
            .clone()
            .unwrap_or_else(|| format!("urn:uuid:{}", Uuid::new_v4()));
        let screening = CString::new(screening).ok()?;

        // SAFETY: both strings are NUL-terminated.
        let code = unsafe {
            ffi::_dms_open_dcp(path.as_ptr(), screening.as_ptr(), self.config.preview)
        } as u32;
        if let Err(err) = status::check("_dms_open_dcp", code) {
            warn!(error = %err, reason = status::description(code), "Essence open refused");
            return None;
        }

        state.essence_open = true;
        state.positions.clear();
        state.next_frame = 0;
        state.duration_us = self.read_movie_duration();

        Some(EssenceInfo {
            width: self.config.width,
            height: self.config.height,
            frame_rate: self.config.frame_rate,
            duration_us: state.duration_us,
            codec: "jpeg2000".to_string(),
            is_encrypted: self.config.encrypted,
        })
    }

    fn close_essence(&self) {
        let mut state = self.state.lock();
        if state.essence_open {
            // SAFETY: an essence is open.
            unsafe { ffi::_dms_close_dcp() };
        }
        state.essence_open = false;
        state.positions.clear();
        state.next_frame = 0;
        state.duration_us = 0;
    }

    fn start_playback(&self) -> bool {
        self.state.lock().essence_open
    }

    fn stop_playback(&self) {}

    fn next_frame(&self, buffer: &mut [u8]) -> i32 {
        let mut state = self.state.lock();
        if !state.essence_open {
            return -1;
        }
        let pulled = self.pull_unit(&mut state, |data| {
            let len = data.len().min(buffer.len());
            buffer[..len].copy_from_slice(&data[..len]);
        });
        match pulled {
            Some(length) => i32::try_from(length).unwrap_or(i32::MAX),
            None => 0,
        }
    }

    fn seek(&self, position_us: i64) {
        let mut state = self.state.lock();
        if !state.essence_open {
            return;
        }
        let target = self.frame_at(position_us);

        let (frame, pos) = match state.positions.get(target) {
            Some(&pos) => (target, pos),
            None => match state.positions.last() {
                Some(&pos) => (state.positions.len() - 1, pos),
                None => (0, 0),
            },
        };

        // SAFETY: plain value arguments.
        let code = unsafe { ffi::_dms_goto_pos(pos, false) } as u32;
        if let Err(err) = status::check("_dms_goto_pos", code) {
            warn!(error = %err, "Seek refused");
            return;
        }
        state.next_frame = frame;

        // Decode forward to frames never handed out before.
        while state.next_frame < target {
            if self.pull_unit(&mut state, |_| {}).is_none() {
                break;
            }
        }
        debug!(position_us, frame = state.next_frame, "Seeked");
    }

    fn duration(&self) -> i64 {
        self.state.lock().duration_us
    }

    fn frame_rate(&self) -> f32 {
        self.config.frame_rate
    }

    fn is_encrypted(&self) -> bool {
        self.config.encrypted
    }

    fn report_playback(&self, started: DateTime<Utc>, ended: DateTime<Utc>) -> bool {
        if self.config.preview {
            return true;
        }
        let _state = self.state.lock();
        let (Ok(start), Ok(end)) = (
            CString::new(log_timestamp(started)),
            CString::new(log_timestamp(ended)),
        ) else {
            return false;
        };
        // SAFETY: both strings are NUL-terminated.
        let code = unsafe { ffi::_dms_set_playback_ended(start.as_ptr(), end.as_ptr()) } as u32;
        match status::check("_dms_set_playback_ended", code) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "Playback log not written");
                false
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn c_path(path: &Path) -> Option<CString> {
    match CString::new(path.to_string_lossy().as_bytes()) {
        Ok(path) => Some(path),
        Err(_) => {
            warn!("Path contains an interior NUL byte");
            None
        }
    }
}

/// Copy a library-owned C string, empty for null.
///
/// # Safety
///
/// `ptr` is null or points to a NUL-terminated string.
unsafe fn owned(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Read a fixed-size, NUL-padded character field.
fn fixed(field: &[c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// UTC timestamp in the form the playback log expects.
fn log_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
