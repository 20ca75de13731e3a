//! # Adapter Configuration
//!
//! Settings shared by the frame source and the extractor.

use serde::{Deserialize, Serialize};

/// Largest frame the engine is expected to deliver (4 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Upper bound accepted by [`AdapterConfig::validate`].
pub const MAX_FRAME_SIZE_LIMIT: usize = 64 * 1024 * 1024;

/// What to do when the engine does not report picture geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryPolicy {
    /// Declare the configured fallback size and log a warning.
    #[default]
    Fallback,
    /// Refuse to declare a track format.
    Strict,
}

/// Frame adapter configuration.
///
/// Controls the frame arena size and how the video track format is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Capacity of the pre-allocated frame buffers, in bytes.
    ///
    /// Default: 4 MiB.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    /// Behaviour when the engine reports no width/height.
    ///
    /// Default: [`GeometryPolicy::Fallback`].
    #[serde(default)]
    pub geometry: GeometryPolicy,

    /// Width declared under [`GeometryPolicy::Fallback`].
    ///
    /// Default: 1920.
    #[serde(default = "default_fallback_width")]
    pub fallback_width: u32,

    /// Height declared under [`GeometryPolicy::Fallback`].
    ///
    /// Default: 1080.
    #[serde(default = "default_fallback_height")]
    pub fallback_height: u32,

    /// MIME type of the samples handed to the player. The engine decodes
    /// internally, so samples are raw pictures.
    ///
    /// Default: `video/raw`.
    #[serde(default = "default_sample_mime_type")]
    pub sample_mime_type: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            geometry: GeometryPolicy::default(),
            fallback_width: default_fallback_width(),
            fallback_height: default_fallback_height(),
            sample_mime_type: default_sample_mime_type(),
        }
    }
}

impl AdapterConfig {
    /// Configuration that never invents geometry.
    pub fn strict() -> Self {
        Self {
            geometry: GeometryPolicy::Strict,
            ..Default::default()
        }
    }

    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    pub fn with_fallback_geometry(mut self, width: u32, height: u32) -> Self {
        self.fallback_width = width;
        self.fallback_height = height;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_frame_size == 0 {
            return Err("max_frame_size must be > 0".to_string());
        }

        if self.max_frame_size > MAX_FRAME_SIZE_LIMIT {
            return Err(format!(
                "max_frame_size cannot exceed {} bytes",
                MAX_FRAME_SIZE_LIMIT
            ));
        }

        if self.geometry == GeometryPolicy::Fallback
            && (self.fallback_width == 0 || self.fallback_height == 0)
        {
            return Err("fallback geometry must be non-zero".to_string());
        }

        if self.sample_mime_type.trim().is_empty() {
            return Err("sample_mime_type cannot be empty".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

fn default_fallback_width() -> u32 {
    1920
}

fn default_fallback_height() -> u32 {
    1080
}

fn default_sample_mime_type() -> String {
    "video/raw".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AdapterConfig::default();
        assert_eq!(config.max_frame_size, 4 * 1024 * 1024);
        assert_eq!(config.geometry, GeometryPolicy::Fallback);
        assert_eq!((config.fallback_width, config.fallback_height), (1920, 1080));
        assert_eq!(config.sample_mime_type, "video/raw");
        assert!(config.validate().is_ok());
        assert!(AdapterConfig::strict().validate().is_ok());
    }

    #[test]
    fn rejects_bad_frame_sizes() {
        assert!(AdapterConfig::default()
            .with_max_frame_size(0)
            .validate()
            .is_err());
        assert!(AdapterConfig::default()
            .with_max_frame_size(MAX_FRAME_SIZE_LIMIT + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn zero_fallback_only_matters_when_falling_back() {
        let fallback = AdapterConfig::default().with_fallback_geometry(0, 1080);
        assert!(fallback.validate().is_err());

        let strict = AdapterConfig::strict().with_fallback_geometry(0, 0);
        assert!(strict.validate().is_ok());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: AdapterConfig = serde_json::from_str(r#"{"geometry":"strict"}"#).unwrap();
        assert_eq!(config.geometry, GeometryPolicy::Strict);
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(config.sample_mime_type, "video/raw");
    }
}
