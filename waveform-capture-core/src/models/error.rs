use thiserror::Error;

/// Errors that can occur while opening, running, or tearing down a capture
/// session.
///
/// Faults inside the real-time callback are deliberately absent: they are
/// swallowed at the callback boundary and surface as an empty chunk for that
/// period, never as a value crossing the real-time boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no input device available")]
    DeviceUnavailable,

    #[error("audio subsystem initialisation failed: {0}")]
    DeviceInitFailed(String),

    #[error("failed to open input stream: {0}")]
    StreamOpenFailed(String),

    #[error("failed to start input stream: {0}")]
    StreamStartFailed(String),

    #[error("failed to close input stream: {0}")]
    CloseFailed(String),

    #[error("session already closed")]
    SessionClosed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}
