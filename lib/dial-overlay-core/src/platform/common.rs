use serde_json::Value;
use std::backtrace::Backtrace;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

#[derive(Debug)]
pub struct PlatformError {
    pub error_type: PlatformErrorType,
    pub backtrace: Backtrace,
}

#[derive(Debug)]
pub enum PlatformErrorType {
    Error(String),
}

impl Display for PlatformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.error_type {
            PlatformErrorType::Error(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for PlatformError {}

impl From<PlatformErrorType> for PlatformError {
    fn from(error_type: PlatformErrorType) -> Self {
        Self {
            error_type,
            backtrace: Backtrace::capture(),
        }
    }
}

impl From<&str> for PlatformError {
    fn from(error: &str) -> Self {
        PlatformErrorType::Error(error.to_string()).into()
    }
}

impl From<String> for PlatformError {
    fn from(error: String) -> Self {
        PlatformErrorType::Error(error).into()
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;

pub type ElementId = u64;
pub type ListenerId = u64;

/// A `message` event as seen by a window listener.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub data: Value,
    /// Origin of the sending browsing context. Not used for filtering; the iframe sandbox and the
    /// `hostDomain` handshake are the trust boundary.
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Message(MessageEvent),
    Resize,
    OrientationChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowEventKind {
    Message,
    Resize,
    OrientationChange,
}

impl WindowEvent {
    pub fn kind(&self) -> WindowEventKind {
        match self {
            WindowEvent::Message(_) => WindowEventKind::Message,
            WindowEvent::Resize => WindowEventKind::Resize,
            WindowEvent::OrientationChange => WindowEventKind::OrientationChange,
        }
    }
}

pub type WindowListener = Arc<dyn Fn(&WindowEvent) + Send + Sync>;
pub type ClickHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}
