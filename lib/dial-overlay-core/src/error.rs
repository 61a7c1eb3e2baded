use crate::platform::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("No element matches root selector '{0}'")]
    RootNotFound(String),
    #[error("Overlay with id '{0}' does not exist")]
    UnknownOverlay(String),
    #[error("Overlay with id '{0}' already exists")]
    DuplicateOverlay(String),
    #[error("Invalid overlay options: {0}")]
    InvalidOptions(String),
    #[error("Fullscreen is not allowed for this overlay, call allow_fullscreen() first")]
    FullscreenNotAllowed,
    #[error("Overlay iframe has no content window")]
    NoContentWindow,
    #[error("Request {request_type} timed out after {timeout_ms}ms")]
    Timeout {
        request_type: String,
        timeout_ms: u64,
    },
    #[error("Readiness task failed: {0}")]
    TaskFailed(String),
    #[error("Overlay was destroyed before the request settled")]
    Closed,
    #[error("Overlays must be created inside a tokio runtime")]
    NoRuntime,
    #[error("Failed to serialize overlay message: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Host platform error: {0}")]
    Platform(#[from] PlatformError),
}

pub type OverlayResult<T> = Result<T, OverlayError>;
