//! # Playback Error Types
//!
//! Every boolean or null failure reported by the decode engine is translated
//! into one of these variants at the session boundary.

use crate::session::{SessionOp, SessionPhase};
use thiserror::Error;

/// Errors that can occur while driving a session or pulling frames.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Engine Lifecycle Errors
    // ========================================================================
    /// The decode engine could not be initialised.
    #[error("Decode engine failed to initialize")]
    Initialization,

    /// The KDM file could not be parsed at all.
    #[error("KDM could not be parsed: {path}")]
    KdmInvalid { path: String },

    /// The engine rejected the KDM binding.
    #[error("Failed to bind KDM: {path}")]
    KdmBind { path: String },

    /// The essence could not be opened (unreadable, unsupported, or
    /// encrypted without a usable key).
    #[error("Failed to open essence: {path}")]
    EssenceOpen { path: String },

    /// Playback of encrypted essence was requested before a KDM was bound.
    #[error("Encrypted essence requires a bound KDM before playback")]
    NotReady,

    /// The engine refused to start playback.
    #[error("Decode engine refused to start playback")]
    PlaybackStart,

    /// The operation is not valid in the session's current phase.
    #[error("Cannot {attempted} while session is {from}")]
    InvalidState {
        from: SessionPhase,
        attempted: SessionOp,
    },

    // ========================================================================
    // Frame Delivery Errors
    // ========================================================================
    /// The caller's buffer cannot hold the next frame.
    #[error("Frame of {required} bytes does not fit in a {available} byte buffer")]
    BufferTooSmall { required: usize, available: usize },

    /// The source or extractor was used before being opened, or after close.
    #[error("Frame source is not open")]
    NotOpen,

    /// Seek target before the start of the stream.
    #[error("Invalid seek position: {0}us")]
    InvalidSeek(i64),

    // ========================================================================
    // Format Errors
    // ========================================================================
    /// Frame rate is zero, negative, or not a number.
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f32),

    /// Geometry is required but the engine did not report it.
    #[error("Decode engine did not report picture geometry")]
    MissingGeometry,

    /// Configuration failed validation.
    #[error("Invalid playback configuration: {0}")]
    Config(String),
}

impl PlaybackError {
    /// Returns `true` if the session stays drivable after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PlaybackError::Initialization
                | PlaybackError::InvalidFrameRate(_)
                | PlaybackError::MissingGeometry
                | PlaybackError::Config(_)
        )
    }

    /// Returns `true` if the only way forward is `uninitialize` followed by a
    /// fresh `initialize`.
    pub fn requires_reinitialize(&self) -> bool {
        matches!(self, PlaybackError::Initialization)
    }

    /// Returns `true` if this error came from the KDM checks or binding.
    pub fn is_kdm_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::KdmInvalid { .. } | PlaybackError::KdmBind { .. } | PlaybackError::NotReady
        )
    }

    /// Single human-readable status line for this error.
    pub fn status_message(&self) -> String {
        match self {
            PlaybackError::Initialization => "Player engine failed to start".to_string(),
            PlaybackError::KdmInvalid { .. } => "KDM validation failed".to_string(),
            PlaybackError::KdmBind { .. } => "Failed to bind KDM".to_string(),
            PlaybackError::EssenceOpen { .. } => "Failed to open MXF file".to_string(),
            PlaybackError::NotReady => "Select and bind a KDM before playing encrypted content".to_string(),
            PlaybackError::PlaybackStart => "Playback could not be started".to_string(),
            PlaybackError::InvalidState { from, attempted } => {
                format!("Cannot {} while {}", attempted, from)
            }
            PlaybackError::BufferTooSmall { .. } => "Frame too large for player buffer".to_string(),
            PlaybackError::NotOpen => "Playback source is closed".to_string(),
            PlaybackError::InvalidSeek(_) => "Invalid seek position".to_string(),
            PlaybackError::InvalidFrameRate(_) => "Unsupported frame rate".to_string(),
            PlaybackError::MissingGeometry => "Picture size unknown".to_string(),
            PlaybackError::Config(_) => "Invalid player configuration".to_string(),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
