//! Integration tests for logging system

use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CapturingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl LoggerSink for CapturingSink {
    fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

#[test]
fn test_init_logging_forwards_to_sink_once() {
    // Logging can only be initialized once per process, so this is the only
    // test in this binary that installs a subscriber.
    let sink = Arc::new(CapturingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());
    init_logging(config).unwrap();

    tracing::info!(
        target: "core_playback::session",
        kdm = "/media/keys/kdm_feature.xml",
        "KDM bound"
    );
    tracing::debug!(target: "hyper::client", "filtered out by default");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "KDM bound");
        assert_eq!(
            entries[0].fields.get("kdm"),
            Some(&"kdm_feature.xml".to_string())
        );
    }

    let again = init_logging(LoggingConfig::default());
    assert!(matches!(again, Err(Error::Config(_))));
}

#[test]
fn test_key_material_is_redacted() {
    assert_eq!(redact_if_sensitive("content_key", "8f3a..."), "[REDACTED]");
    assert_eq!(redact_if_sensitive("KeyId", "urn:uuid:1"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("signer_certificate", "MII"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("private_key", "-----BEGIN"), "[REDACTED]");
}

#[test]
fn test_normal_values_pass_through() {
    assert_eq!(redact_if_sensitive("frame_rate", "24"), "24");
    assert_eq!(redact_if_sensitive("phase", "playing"), "playing");
    assert_eq!(
        redact_if_sensitive("cpl_id", "urn:uuid:cpl"),
        "urn:uuid:cpl"
    );
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/media/dcp/Feature_FTR/reel1.mxf"), "reel1.mxf");
    assert_eq!(strip_path("D:\\keys\\kdm.xml"), "kdm.xml");
    assert_eq!(strip_path("kdm.xml"), "kdm.xml");
    assert_eq!(strip_path("/media/dcp/"), "");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_sensitive);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
