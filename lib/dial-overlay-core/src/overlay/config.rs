use crate::config::Config;
use crate::error::{OverlayError, OverlayResult};
use crate::layout::{LayoutSize, OverlayPosition};
use crate::style::StyleMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Features of the embedded chat the host can switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    ConversationsSection,
    PromptsSection,
    TopSettings,
    TopClearConversation,
    TopChatInfo,
    TopChatModelSettings,
    EmptyChatSettings,
    Header,
    Footer,
    RequestApiKey,
    ReportAnIssue,
    Likes,
    ConversationsSharing,
    PromptsSharing,
    InputFiles,
    AttachmentsManager,
    ConversationsPublishing,
    PromptsPublishing,
    CustomLogo,
    InputLinks,
    CustomApplications,
    MessageTemplates,
    Marketplace,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInOptions {
    #[serde(default)]
    pub auto_sign_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_in_provider: Option<String>,
}

/// Options for one embedded chat. The whole object is sent to the iframe on every
/// `set_overlay_options`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOverlayOptions {
    /// URL of the chat application loaded into the iframe
    pub domain: String,
    /// Origin of the embedding page
    pub host_domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_features: Option<BTreeSet<Feature>>,
    /// Milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader_styles: Option<StyleMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_in_options: Option<SignInOptions>,
}

impl ChatOverlayOptions {
    pub fn new(domain: impl Into<String>, host_domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            host_domain: host_domain.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> OverlayResult<()> {
        if self.domain.trim().is_empty() {
            return Err(OverlayError::InvalidOptions("domain is required".to_string()));
        }
        if self.host_domain.trim().is_empty() {
            return Err(OverlayError::InvalidOptions(
                "hostDomain is required".to_string(),
            ));
        }
        if self.request_timeout == Some(0) {
            return Err(OverlayError::InvalidOptions(
                "requestTimeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(
            self.request_timeout
                .unwrap_or_else(Config::request_timeout_ms),
        )
    }
}

/// A managed overlay: the chat options plus the chrome around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOverlayManagerOptions {
    /// Key used by every manager call for this overlay
    pub id: String,
    #[serde(flatten)]
    pub overlay: ChatOverlayOptions,
    #[serde(default)]
    pub position: OverlayPosition,
    #[serde(default)]
    pub allow_fullscreen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<String>,
    /// Inline SVG for the toggle button
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_svg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_height: Option<String>,
}

impl ChatOverlayManagerOptions {
    pub fn new(id: impl Into<String>, overlay: ChatOverlayOptions) -> Self {
        Self {
            id: id.into(),
            overlay,
            position: OverlayPosition::default(),
            allow_fullscreen: false,
            width: None,
            height: None,
            z_index: None,
            icon_svg: None,
            icon_bg_color: None,
            icon_color: None,
            icon_width: None,
            icon_height: None,
        }
    }

    pub fn validate(&self) -> OverlayResult<()> {
        if self.id.trim().is_empty() {
            return Err(OverlayError::InvalidOptions("id is required".to_string()));
        }
        self.overlay.validate()
    }

    pub fn layout_size(&self) -> LayoutSize {
        LayoutSize {
            width: self.width.clone().unwrap_or_else(Config::default_width),
            height: self.height.clone().unwrap_or_else(Config::default_height),
            z_index: self.z_index.clone().unwrap_or_else(Config::default_z_index),
        }
    }
}
