use core_playback::PlaybackError;
use std::fmt;
use thiserror::Error;

/// Which user selection an operation needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Kdm,
    Essence,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Kdm => f.write_str("KDM"),
            MediaKind::Essence => f.write_str("MXF"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("No {0} file selected")]
    NothingSelected(MediaKind),
}

impl ServiceError {
    /// The status line shown to the user for this error.
    pub fn status_message(&self) -> String {
        match self {
            ServiceError::Playback(
                err @ (PlaybackError::KdmInvalid { .. }
                | PlaybackError::KdmBind { .. }
                | PlaybackError::EssenceOpen { .. }),
            ) => err.status_message(),
            ServiceError::Playback(err) => format!("Error: {}", err.status_message()),
            ServiceError::Runtime(err) => format!("Error: {}", err),
            ServiceError::NothingSelected(kind) => format!("No {} file selected", kind),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
