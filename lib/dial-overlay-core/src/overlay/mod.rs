mod chrome;
mod config;
mod handle;
mod manager;

pub use chrome::OverlayChrome;
pub use config::{ChatOverlayManagerOptions, ChatOverlayOptions, Feature, SignInOptions};
pub use handle::{ChatOverlay, EventCallback, OverlayRoot, Unsubscribe, SANDBOX_FLAGS};
pub use manager::ChatOverlayManager;
