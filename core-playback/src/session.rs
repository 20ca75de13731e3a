//! # Playback Session
//!
//! Lifecycle state machine around one decode engine handle.
//!
//! ## Overview
//!
//! ```text
//! Uninitialized ──initialize──> Initialized ──open_essence──> EssenceOpened
//!                                    ^                           │      ^
//!                                    │                 start_playback   │
//!                               (EssenceClosed)                  v      │
//!                                    ^                        Playing   │
//!                                    │                   stop │ ^ start │
//!                                    │                        v │       │
//!                                    └──────close_essence─── Stopped ───┘
//! ```
//!
//! KDM validation and binding are orthogonal to the phases above: both are
//! accepted any time after `initialize`, but binding is refused while
//! `Playing`. Encrypted essence cannot enter `Playing` until a KDM is bound.
//! `uninitialize` is accepted from every phase and always lands in
//! `Uninitialized`.
//!
//! A rejected transition returns [`PlaybackError::InvalidState`] and leaves
//! the session untouched.
//!
//! ## Locking
//!
//! Two locks, always taken in this order:
//!
//! 1. `engine_io` serialises every call that drives the engine handle:
//!    lifecycle calls, frame pulls and seeks. It is held across a blocking
//!    frame pull.
//! 2. `state` guards the phase, the source open flag and the cursor. It is
//!    only held for a check or a transition, never across a frame pull, so
//!    [`Session::phase`] and [`Session::close_source`] never wait on the
//!    engine.

use crate::error::{PlaybackError, Result};
use crate::timing::validate_frame_rate;
use bridge_traits::{Clock, DecodeEngine, EssenceInfo, KdmRecord, SystemClock};
use chrono::{DateTime, Utc};
use core_runtime::events::{CoreEvent, EventBus, KdmEvent, PlaybackEvent, SessionEvent};
use core_runtime::logging::strip_path;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

// ============================================================================
// Phases and Operations
// ============================================================================

/// Lifecycle phase of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    Uninitialized,
    Initialized,
    EssenceOpened,
    Playing,
    Stopped,
    EssenceClosed,
}

impl SessionPhase {
    /// `true` while an essence is open (opened, playing or stopped).
    pub fn has_essence(self) -> bool {
        matches!(
            self,
            SessionPhase::EssenceOpened | SessionPhase::Playing | SessionPhase::Stopped
        )
    }

    /// `true` once the engine is up.
    pub fn is_initialized(self) -> bool {
        !matches!(self, SessionPhase::Uninitialized)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::Initialized => "initialized",
            SessionPhase::EssenceOpened => "essence opened",
            SessionPhase::Playing => "playing",
            SessionPhase::Stopped => "stopped",
            SessionPhase::EssenceClosed => "essence closed",
        };
        f.write_str(name)
    }
}

/// Operation attempted on a [`Session`], reported by
/// [`PlaybackError::InvalidState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionOp {
    Initialize,
    ValidateKdm,
    BindKdm,
    OpenEssence,
    StartPlayback,
    StopPlayback,
    CloseEssence,
    OpenSource,
    ReadFrame,
    Seek,
}

impl fmt::Display for SessionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionOp::Initialize => "initialize",
            SessionOp::ValidateKdm => "validate KDM",
            SessionOp::BindKdm => "bind KDM",
            SessionOp::OpenEssence => "open essence",
            SessionOp::StartPlayback => "start playback",
            SessionOp::StopPlayback => "stop playback",
            SessionOp::CloseEssence => "close essence",
            SessionOp::OpenSource => "open source",
            SessionOp::ReadFrame => "read frame",
            SessionOp::Seek => "seek",
        };
        f.write_str(name)
    }
}

/// Unique identifier of a session, used in log spans and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one frame pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePull {
    /// `size` bytes were written to the front of the buffer.
    Frame { size: usize, generation: u64 },
    /// The engine has no more frames.
    EndOfStream,
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug)]
struct OpenEssence {
    path: PathBuf,
    info: EssenceInfo,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    bound_kdm: Option<PathBuf>,
    essence: Option<OpenEssence>,
    source_open: bool,
    cursor_us: i64,
    /// Bumped on every seek so stale buffered frames can be recognised.
    seek_generation: u64,
    end_of_stream: bool,
    playback_started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            bound_kdm: None,
            essence: None,
            source_open: false,
            cursor_us: 0,
            seek_generation: 0,
            end_of_stream: false,
            playback_started_at: None,
        }
    }

    fn require(&self, attempted: SessionOp, allowed: &[SessionPhase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(PlaybackError::InvalidState {
                from: self.phase,
                attempted,
            })
        }
    }

    fn clear_essence(&mut self) {
        self.essence = None;
        self.bound_kdm = None;
        self.source_open = false;
        self.cursor_us = 0;
        self.end_of_stream = false;
        self.playback_started_at = None;
    }
}

/// One playback session bound to one decode engine handle.
///
/// Shared between the lifecycle thread (through `PlayerService`) and the host
/// player's streaming thread (through `FrameSource` and `FrameExtractor`),
/// typically as `Arc<Session>`.
pub struct Session {
    id: SessionId,
    engine: Arc<dyn DecodeEngine>,
    clock: Arc<dyn Clock>,
    events: Option<EventBus>,
    engine_io: Mutex<()>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(engine: Arc<dyn DecodeEngine>) -> Self {
        Self {
            id: SessionId::new(),
            engine,
            clock: Arc::new(SystemClock),
            events: None,
            engine_io: Mutex::new(()),
            state: Mutex::new(SessionState::new()),
        }
    }

    /// Use `clock` to stamp the playback window.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish lifecycle events on `events`.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase
    }

    /// Info of the open essence, if any.
    pub fn essence(&self) -> Option<EssenceInfo> {
        self.state.lock().essence.as_ref().map(|e| e.info.clone())
    }

    pub fn is_kdm_bound(&self) -> bool {
        self.state.lock().bound_kdm.is_some()
    }

    pub fn is_source_open(&self) -> bool {
        self.state.lock().source_open
    }

    /// Presentation time of the last delivered frame, or of the last seek.
    pub fn cursor_us(&self) -> i64 {
        self.state.lock().cursor_us
    }

    pub fn seek_generation(&self) -> u64 {
        self.state.lock().seek_generation
    }

    /// Frame rate reported by the engine for the open essence.
    pub fn frame_rate(&self) -> Result<f32> {
        {
            let state = self.state.lock();
            if !state.phase.has_essence() {
                return Err(PlaybackError::InvalidState {
                    from: state.phase,
                    attempted: SessionOp::ReadFrame,
                });
            }
        }
        let frame_rate = self.engine.frame_rate();
        validate_frame_rate(frame_rate)?;
        Ok(frame_rate)
    }

    // ========================================================================
    // Engine Lifecycle
    // ========================================================================

    #[instrument(skip(self), fields(session = %self.id))]
    pub fn initialize(&self) -> Result<()> {
        let _io = self.engine_io.lock();
        let mut state = self.state.lock();
        state.require(SessionOp::Initialize, &[SessionPhase::Uninitialized])?;

        if !self.engine.init() {
            error!("Decode engine failed to initialize");
            return Err(self.failed(PlaybackError::Initialization));
        }

        self.transition(&mut state, SessionPhase::Initialized);
        self.publish(CoreEvent::Session(SessionEvent::EngineInitialized {
            session_id: self.id.to_string(),
        }));
        info!("Decode engine initialized");
        Ok(())
    }

    /// Stop and close whatever is open, then release the engine. Accepted in
    /// every phase; a session that never initialised is left as is.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn uninitialize(&self) {
        let _io = self.engine_io.lock();
        let mut state = self.state.lock();

        if state.phase == SessionPhase::Uninitialized {
            debug!("Uninitialize on an uninitialized session");
            return;
        }

        if state.phase == SessionPhase::Playing {
            self.engine.stop_playback();
            self.transition(&mut state, SessionPhase::Stopped);
        }
        if state.phase.has_essence() {
            self.close_essence_locked(&mut state);
        }

        self.engine.uninit();
        let phase = state.phase;
        *state = SessionState {
            phase,
            ..SessionState::new()
        };
        self.transition(&mut state, SessionPhase::Uninitialized);
        self.publish(CoreEvent::Session(SessionEvent::EngineReleased {
            session_id: self.id.to_string(),
        }));
        info!("Decode engine released");
    }

    // ========================================================================
    // KDM
    // ========================================================================

    /// Parse and check a KDM without changing the session.
    ///
    /// A parseable KDM is returned even when its checks fail; inspect
    /// [`KdmRecord::is_valid`]. Only an unparseable file is an error.
    #[instrument(skip(self, path), fields(session = %self.id, kdm = %display_name(path)))]
    pub fn validate_kdm(&self, path: &Path) -> Result<KdmRecord> {
        let _io = self.engine_io.lock();
        let state = self.state.lock();
        if !state.phase.is_initialized() {
            return Err(PlaybackError::InvalidState {
                from: state.phase,
                attempted: SessionOp::ValidateKdm,
            });
        }

        let Some(record) = self.engine.validate_kdm(path) else {
            warn!("KDM could not be parsed");
            self.publish(CoreEvent::Kdm(KdmEvent::ValidationFailed {
                file: display_name(path),
            }));
            return Err(self.failed(PlaybackError::KdmInvalid {
                path: display_name(path),
            }));
        };

        info!(
            valid = record.is_valid(),
            time_window = %record.time_window_check,
            recipient = %record.recipient_check,
            remaining_sessions = record.remaining_session_count,
            "KDM validated"
        );
        self.publish(CoreEvent::Kdm(KdmEvent::Validated {
            kdm_id: record.id.clone(),
            content_title: record.content_title.clone(),
            valid: record.is_valid(),
        }));
        Ok(record)
    }

    /// Bind a KDM for decrypting the essence. Refused while `Playing`.
    #[instrument(skip(self, path), fields(session = %self.id, kdm = %display_name(path)))]
    pub fn bind_kdm(&self, path: &Path) -> Result<()> {
        let _io = self.engine_io.lock();
        let mut state = self.state.lock();
        state.require(
            SessionOp::BindKdm,
            &[
                SessionPhase::Initialized,
                SessionPhase::EssenceOpened,
                SessionPhase::Stopped,
                SessionPhase::EssenceClosed,
            ],
        )?;

        if !self.engine.bind_kdm(path) {
            warn!("Engine rejected KDM binding");
            self.publish(CoreEvent::Kdm(KdmEvent::BindFailed {
                file: display_name(path),
            }));
            return Err(self.failed(PlaybackError::KdmBind {
                path: display_name(path),
            }));
        }

        state.bound_kdm = Some(path.to_path_buf());
        self.publish(CoreEvent::Kdm(KdmEvent::Bound {
            file: display_name(path),
        }));
        info!("KDM bound");
        Ok(())
    }

    // ========================================================================
    // Essence
    // ========================================================================

    #[instrument(skip(self, path), fields(session = %self.id, essence = %display_name(path)))]
    pub fn open_essence(&self, path: &Path) -> Result<EssenceInfo> {
        let _io = self.engine_io.lock();
        let mut state = self.state.lock();
        state.require(
            SessionOp::OpenEssence,
            &[SessionPhase::Initialized, SessionPhase::EssenceClosed],
        )?;

        let Some(info) = self.engine.open_essence(path) else {
            warn!("Engine could not open essence");
            return Err(self.failed(PlaybackError::EssenceOpen {
                path: display_name(path),
            }));
        };

        if let Err(err) = validate_frame_rate(info.frame_rate) {
            error!(frame_rate = info.frame_rate, "Essence reports an unusable frame rate");
            self.engine.close_essence();
            return Err(self.failed(err));
        }

        // A KDM bound before opening stays bound to this essence.
        state.source_open = false;
        state.cursor_us = 0;
        state.end_of_stream = false;
        state.essence = Some(OpenEssence {
            path: path.to_path_buf(),
            info: info.clone(),
        });
        self.transition(&mut state, SessionPhase::EssenceOpened);
        self.publish(CoreEvent::Playback(PlaybackEvent::EssenceOpened {
            file: display_name(path),
            duration_ms: micros_to_millis(info.duration_us),
            encrypted: info.is_encrypted,
        }));
        info!(
            width = info.width,
            height = info.height,
            frame_rate = info.frame_rate,
            duration_us = info.duration_us,
            codec = %info.codec,
            encrypted = info.is_encrypted,
            "Essence opened"
        );
        Ok(info)
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub fn close_essence(&self) -> Result<()> {
        let _io = self.engine_io.lock();
        let mut state = self.state.lock();
        state.require(
            SessionOp::CloseEssence,
            &[SessionPhase::EssenceOpened, SessionPhase::Stopped],
        )?;
        self.close_essence_locked(&mut state);
        Ok(())
    }

    fn close_essence_locked(&self, state: &mut SessionState) {
        self.engine.close_essence();

        let played_secs = state.playback_started_at.map(|started| {
            let ended = self.clock.now();
            if !self.engine.report_playback(started, ended) {
                warn!(%started, %ended, "Engine did not record the playback window");
            }
            (ended - started).num_seconds().max(0) as u64
        });
        let file = state
            .essence
            .as_ref()
            .map(|e| display_name(&e.path))
            .unwrap_or_default();

        state.clear_essence();
        self.transition(state, SessionPhase::EssenceClosed);
        self.publish(CoreEvent::Playback(PlaybackEvent::EssenceClosed {
            file,
            played_secs,
        }));
        info!(?played_secs, "Essence closed");
    }

    // ========================================================================
    // Playback
    // ========================================================================

    #[instrument(skip(self), fields(session = %self.id))]
    pub fn start_playback(&self) -> Result<()> {
        let _io = self.engine_io.lock();
        let mut state = self.state.lock();
        state.require(
            SessionOp::StartPlayback,
            &[SessionPhase::EssenceOpened, SessionPhase::Stopped],
        )?;

        let encrypted = state
            .essence
            .as_ref()
            .map_or(false, |e| e.info.is_encrypted);
        if encrypted && state.bound_kdm.is_none() {
            warn!("Refusing to play encrypted essence without a bound KDM");
            return Err(self.failed(PlaybackError::NotReady));
        }

        if !self.engine.start_playback() {
            warn!("Engine refused to start playback");
            return Err(self.failed(PlaybackError::PlaybackStart));
        }

        if state.playback_started_at.is_none() {
            state.playback_started_at = Some(self.clock.now());
        }
        self.transition(&mut state, SessionPhase::Playing);
        self.publish(CoreEvent::Playback(PlaybackEvent::Started {
            file: state
                .essence
                .as_ref()
                .map(|e| display_name(&e.path))
                .unwrap_or_default(),
        }));
        info!("Playback started");
        Ok(())
    }

    /// Stop frame delivery. Stopping a stopped session is a no-op.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn stop_playback(&self) -> Result<()> {
        let _io = self.engine_io.lock();
        let mut state = self.state.lock();
        if state.phase == SessionPhase::Stopped {
            debug!("Already stopped");
            return Ok(());
        }
        state.require(SessionOp::StopPlayback, &[SessionPhase::Playing])?;

        self.engine.stop_playback();
        self.transition(&mut state, SessionPhase::Stopped);
        self.publish(CoreEvent::Playback(PlaybackEvent::Stopped {
            position_ms: micros_to_millis(state.cursor_us),
        }));
        info!(cursor_us = state.cursor_us, "Playback stopped");
        Ok(())
    }

    // ========================================================================
    // Frame Delivery
    // ========================================================================

    /// Mark the frame source live and return the essence duration in
    /// microseconds.
    pub fn open_source(&self) -> Result<i64> {
        let mut state = self.state.lock();
        if !state.phase.has_essence() {
            return Err(PlaybackError::InvalidState {
                from: state.phase,
                attempted: SessionOp::OpenSource,
            });
        }
        state.source_open = true;
        drop(state);

        let duration = self.engine.duration();
        debug!(session = %self.id, duration_us = duration, "Frame source opened");
        Ok(duration)
    }

    /// Mark the frame source closed. Idempotent. A pull already in flight
    /// completes; the next one fails with [`PlaybackError::NotOpen`].
    pub fn close_source(&self) {
        let mut state = self.state.lock();
        if state.source_open {
            state.source_open = false;
            debug!(session = %self.id, "Frame source closed");
        }
    }

    /// Check that frames may flow right now and return the current seek
    /// generation.
    pub fn frame_gate(&self) -> Result<u64> {
        let state = self.state.lock();
        Self::check_gate(&state)
    }

    fn check_gate(state: &SessionState) -> Result<u64> {
        if !state.source_open {
            return Err(PlaybackError::NotOpen);
        }
        if state.phase != SessionPhase::Playing {
            return Err(PlaybackError::InvalidState {
                from: state.phase,
                attempted: SessionOp::ReadFrame,
            });
        }
        Ok(state.seek_generation)
    }

    /// Pull exactly one frame from the engine into `buf`.
    pub fn read_frame(&self, buf: &mut [u8]) -> Result<FramePull> {
        let _io = self.engine_io.lock();
        let generation = {
            let state = self.state.lock();
            Self::check_gate(&state)?
        };

        let size = self.engine.next_frame(buf);
        if size <= 0 {
            let mut state = self.state.lock();
            if !state.end_of_stream {
                state.end_of_stream = true;
                self.publish(CoreEvent::Playback(PlaybackEvent::EndOfStream {
                    position_ms: micros_to_millis(state.cursor_us),
                }));
                info!(session = %self.id, cursor_us = state.cursor_us, "End of stream");
            }
            return Ok(FramePull::EndOfStream);
        }

        let size = size as usize;
        if size > buf.len() {
            error!(
                session = %self.id,
                size,
                capacity = buf.len(),
                "Engine reported a frame larger than the pull buffer"
            );
            return Err(PlaybackError::BufferTooSmall {
                required: size,
                available: buf.len(),
            });
        }

        trace!(session = %self.id, size, "Frame pulled");
        Ok(FramePull::Frame { size, generation })
    }

    /// Reposition the engine to `time_us`.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn seek(&self, time_us: i64) -> Result<()> {
        if time_us < 0 {
            return Err(PlaybackError::InvalidSeek(time_us));
        }

        let _io = self.engine_io.lock();
        {
            let mut state = self.state.lock();
            if !state.phase.has_essence() {
                return Err(PlaybackError::InvalidState {
                    from: state.phase,
                    attempted: SessionOp::Seek,
                });
            }
            state.cursor_us = time_us;
            state.seek_generation += 1;
            state.end_of_stream = false;
        }

        self.engine.seek(time_us);
        self.publish(CoreEvent::Playback(PlaybackEvent::Seeked {
            position_ms: micros_to_millis(time_us),
        }));
        debug!("Seeked");
        Ok(())
    }

    /// Record the presentation time of a delivered frame.
    pub fn record_presentation(&self, time_us: i64) {
        self.state.lock().cursor_us = time_us;
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn transition(&self, state: &mut SessionState, to: SessionPhase) {
        let from = state.phase;
        if from == to {
            return;
        }
        state.phase = to;
        debug!(session = %self.id, %from, %to, "Session phase changed");
        self.publish(CoreEvent::Session(SessionEvent::PhaseChanged {
            session_id: self.id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }));
    }

    fn publish(&self, event: CoreEvent) {
        if let Some(events) = &self.events {
            events.emit(event).ok();
        }
    }

    fn failed(&self, err: PlaybackError) -> PlaybackError {
        self.publish(CoreEvent::Playback(PlaybackEvent::Error {
            message: err.status_message(),
            recoverable: err.is_recoverable(),
        }));
        err
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// File name of `path`, for logs, events and error messages.
pub(crate) fn display_name(path: &Path) -> String {
    strip_path(&path.to_string_lossy()).to_string()
}

fn micros_to_millis(us: i64) -> u64 {
    (us.max(0) / 1_000) as u64
}
