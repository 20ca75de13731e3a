//! # Player Service
//!
//! Host-facing façade over the playback core.
//!
//! ## Overview
//!
//! This crate wires a host-provided [`DecodeEngine`](bridge_traits::DecodeEngine)
//! into a [`Session`](core_playback::Session) and exposes the handful of
//! operations a player screen needs: select a KDM and an essence, check the
//! KDM, start, stop, and react to end of stream. Each operation leaves a
//! single human-readable status line behind.
//!
//! Desktop hosts that link the native DMS library enable the `libdms`
//! feature and use [`bootstrap_libdms`]; other hosts build a
//! [`CoreConfig`](core_runtime::CoreConfig) with their own engine and call
//! [`PlayerService::new`].

pub mod error;
pub mod player;

pub use error::{MediaKind, Result, ServiceError};
pub use player::{PlaybackPipeline, PlayerService};

#[cfg(feature = "libdms")]
pub use bridge_desktop::{LibDmsConfig, LibDmsEngine};

/// Convenience bootstrapper for desktop hosts linking the native library.
///
/// ```ignore
/// use core_service::{bootstrap_libdms, LibDmsConfig};
/// use core_playback::AdapterConfig;
///
/// let player = bootstrap_libdms(LibDmsConfig::default(), AdapterConfig::default())?;
/// player.select_kdm("/media/usb/KDM_Feature.xml");
/// player.select_essence("/media/usb/Feature_j2c.mxf");
/// let pipeline = player.start()?;
/// ```
#[cfg(feature = "libdms")]
pub fn bootstrap_libdms(
    engine_config: LibDmsConfig,
    adapter: core_playback::AdapterConfig,
) -> Result<PlayerService> {
    let config = core_runtime::CoreConfig::builder()
        .engine(std::sync::Arc::new(LibDmsEngine::new(engine_config)))
        .build()?;
    if let Err(err) = core_runtime::logging::init_logging(config.logging_config()) {
        tracing::warn!(error = %err, "Logging already initialized by the host");
    }
    PlayerService::new(config, adapter)
}
