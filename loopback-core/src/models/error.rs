use thiserror::Error;

use super::config::CaptureEffect;

/// Which side of the loopback path an endpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Capture,
    Playback,
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture => f.write_str("capture"),
            Self::Playback => f.write_str("playback"),
        }
    }
}

/// Failures of the system audio routing layer (focus, SCO link, audio mode).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("audio focus denied")]
    FocusDenied,

    #[error("bluetooth SCO unavailable: {0}")]
    ScoUnavailable(String),

    #[error("audio mode change failed: {0}")]
    ModeChangeFailed(String),

    #[error("stream volume change failed: {0}")]
    VolumeFailed(String),

    #[error("not supported on this platform: {0}")]
    Unsupported(&'static str),

    #[error("routing platform error: {0}")]
    Platform(String),
}

/// Failures of native capture/playback endpoints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("failed to open {endpoint} endpoint: {reason}")]
    OpenFailed { endpoint: EndpointKind, reason: String },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid session state: {0}")]
    InvalidState(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("endpoint released")]
    Released,

    #[error("{consecutive} consecutive I/O failures, last: {last}")]
    TooManyFailures { consecutive: u32, last: String },

    #[error("audio backend error: {0}")]
    Backend(String),
}

impl DeviceError {
    pub fn open_failed(endpoint: EndpointKind, reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            endpoint,
            reason: reason.into(),
        }
    }
}

/// Echo-cancel / noise-suppress attachment failure. Never fatal to a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessingAttachError {
    #[error("{0} not available on this device")]
    Unavailable(CaptureEffect),

    #[error("failed to attach {effect}: {reason}")]
    Failed { effect: CaptureEffect, reason: String },
}

/// Errors surfaced by the loopback engine's control operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("loopback already running")]
    AlreadyRunning,

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("invalid engine state: {0}")]
    InvalidState(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to spawn loopback thread: {0}")]
    Spawn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failed_display_names_endpoint() {
        let err = DeviceError::open_failed(EndpointKind::Playback, "no device");
        assert_eq!(err.to_string(), "failed to open playback endpoint: no device");
    }

    #[test]
    fn engine_error_wraps_routing_transparently() {
        let err: EngineError = RoutingError::FocusDenied.into();
        assert_eq!(err, EngineError::Routing(RoutingError::FocusDenied));
        assert_eq!(err.to_string(), "audio focus denied");
    }

    #[test]
    fn attach_error_mentions_effect() {
        let err = ProcessingAttachError::Unavailable(CaptureEffect::NoiseSuppression);
        assert_eq!(err.to_string(), "noise suppression not available on this device");
    }
}
