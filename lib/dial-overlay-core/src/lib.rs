pub mod config;
pub mod deferred;
mod error;
pub mod layout;
pub mod overlay;
pub mod paths;
pub mod platform;
pub mod protocol;
pub mod style;
pub mod task;

pub use config::Config;
pub use deferred::{DeferredRequest, PendingReply};
pub use error::{OverlayError, OverlayResult};
pub use overlay::{
    ChatOverlay, ChatOverlayManager, ChatOverlayManagerOptions, ChatOverlayOptions, Feature,
    OverlayRoot, Unsubscribe,
};
pub use task::{Task, TaskState};

pub fn version() -> &'static str {
    option_env!("VERSION").unwrap_or("v0.0.0-dev")
}
