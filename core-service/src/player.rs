//! # Player Service
//!
//! Host-facing view of one playback session: what the user selected, the
//! status line to show, and the frame pipeline to hand to the media player.
//!
//! ## Overview
//!
//! ```text
//! new ──> select_kdm / select_essence ──> validate_kdm (optional)
//!                                      └─> start ──> PlaybackPipeline
//!                                                      │
//!                    on_end_of_stream / stop <─────────┘
//!                               │
//!                            release
//! ```
//!
//! Every operation updates [`PlayerService::status`]. Failures also come
//! back as a [`ServiceError`] so hosts can branch on them.

use crate::error::{MediaKind, Result, ServiceError};
use bridge_traits::KdmRecord;
use core_playback::{
    AdapterConfig, FrameExtractor, FrameSource, PlaybackError, Session, SessionPhase,
};
use core_runtime::events::{EventBus, EventStream};
use core_runtime::logging::strip_path;
use core_runtime::CoreConfig;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const STATUS_READY: &str = "Ready";
pub const STATUS_FINISHED: &str = "Playback finished";
pub const STATUS_STOPPED: &str = "Playback stopped";

/// Frame source and extractor wired to the service's session.
///
/// Register the source as the player's data source and the extractor as its
/// demuxer for the `dms://` URI returned by [`PlaybackPipeline::uri`].
#[derive(Debug)]
pub struct PlaybackPipeline {
    pub source: FrameSource,
    pub extractor: FrameExtractor,
    uri: String,
}

impl PlaybackPipeline {
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[derive(Debug, Default)]
struct Selection {
    kdm: Option<PathBuf>,
    essence: Option<PathBuf>,
}

/// Owns the session and tracks user-visible state.
pub struct PlayerService {
    session: Arc<Session>,
    events: EventBus,
    adapter: AdapterConfig,
    status: Mutex<String>,
    selection: Mutex<Selection>,
}

impl PlayerService {
    /// Build the session from `config` and initialize the engine.
    #[instrument(skip_all)]
    pub fn new(config: CoreConfig, adapter: AdapterConfig) -> Result<Self> {
        config.validate()?;
        adapter.validate().map_err(PlaybackError::Config)?;

        let events = EventBus::new(config.event_buffer_size);
        let session = Session::new(config.engine)
            .with_clock(config.clock)
            .with_event_bus(events.clone());
        session.initialize()?;
        info!(session = %session.id(), "Player service ready");

        Ok(Self {
            session: Arc::new(session),
            events,
            adapter,
            status: Mutex::new(STATUS_READY.to_string()),
            selection: Mutex::new(Selection::default()),
        })
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub fn select_kdm(&self, path: impl Into<PathBuf>) {
        self.selection.lock().kdm = Some(path.into());
    }

    pub fn select_essence(&self, path: impl Into<PathBuf>) {
        self.selection.lock().essence = Some(path.into());
    }

    pub fn selected_kdm(&self) -> Option<PathBuf> {
        self.selection.lock().kdm.clone()
    }

    pub fn selected_essence(&self) -> Option<PathBuf> {
        self.selection.lock().essence.clone()
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Check the selected KDM and report the verdict in the status line.
    pub fn validate_kdm(&self) -> Result<KdmRecord> {
        let kdm = self
            .selected_kdm()
            .ok_or(ServiceError::NothingSelected(MediaKind::Kdm))
            .map_err(|err| self.fail(err))?;

        let record = self
            .session
            .validate_kdm(&kdm)
            .map_err(|err| self.fail(err.into()))?;
        let verdict = if record.is_valid() { "Yes" } else { "No" };
        self.set_status(format!("KDM Valid: {}", verdict));
        Ok(record)
    }

    /// Bind the selected KDM (if any), open the selected essence and start
    /// playback.
    ///
    /// An essence left open by a failed start is closed again so the next
    /// attempt starts clean.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<PlaybackPipeline> {
        let Selection { kdm, essence } = {
            let selection = self.selection.lock();
            Selection {
                kdm: selection.kdm.clone(),
                essence: selection.essence.clone(),
            }
        };
        let essence = essence
            .ok_or(ServiceError::NothingSelected(MediaKind::Essence))
            .map_err(|err| self.fail(err))?;

        if let Some(kdm) = &kdm {
            self.session
                .bind_kdm(kdm)
                .map_err(|err| self.fail(err.into()))?;
        }

        self.session
            .open_essence(&essence)
            .map_err(|err| self.fail(err.into()))?;

        if let Err(err) = self.session.start_playback() {
            if let Err(close_err) = self.session.close_essence() {
                warn!(error = %close_err, "Could not close essence after failed start");
            }
            return Err(self.fail(err.into()));
        }

        let file = file_name(&essence);
        self.set_status(format!("Playing MXF: {}", file));

        Ok(PlaybackPipeline {
            source: FrameSource::new(self.session.clone(), &self.adapter),
            extractor: FrameExtractor::new(self.session.clone(), self.adapter.clone()),
            uri: format!("dms://{}", file),
        })
    }

    /// The player drained the stream: stop and close.
    pub fn on_end_of_stream(&self) -> Result<()> {
        self.session
            .stop_playback()
            .and_then(|_| self.session.close_essence())
            .map_err(|err| self.fail(err.into()))?;
        self.set_status(STATUS_FINISHED);
        Ok(())
    }

    /// Stop whatever is playing and close the essence. Never fails; a step
    /// that does not apply in the current phase is skipped.
    pub fn stop(&self) {
        self.session.close_source();

        if self.session.phase() == SessionPhase::Playing {
            if let Err(err) = self.session.stop_playback() {
                warn!(error = %err, "Stop playback failed");
            }
        }
        if self.session.phase().has_essence() {
            if let Err(err) = self.session.close_essence() {
                warn!(error = %err, "Close essence failed");
            }
        }
        self.set_status(STATUS_STOPPED);
    }

    /// Release the engine. The service can not be used afterwards.
    pub fn release(&self) {
        self.session.uninitialize();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn status(&self) -> String {
        self.status.lock().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn is_playing(&self) -> bool {
        self.phase() == SessionPhase::Playing
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        info!(%status, "Status");
        *self.status.lock() = status;
    }

    fn fail(&self, err: ServiceError) -> ServiceError {
        self.set_status(err.status_message());
        err
    }
}

impl std::fmt::Debug for PlayerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerService")
            .field("session", &self.session.id())
            .field("status", &*self.status.lock())
            .finish()
    }
}

fn file_name(path: &Path) -> String {
    strip_path(&path.to_string_lossy()).to_string()
}
