//! Placement math for managed overlays. Everything here is pure so it can be recomputed on every
//! resize.

use crate::platform::{HostWindow, Viewport};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const VISIBLE_TRANSFORM: &str = "scale(1) translate(0, 0)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayPosition {
    LeftBottom,
    LeftTop,
    #[default]
    RightBottom,
    RightTop,
}

impl OverlayPosition {
    pub fn is_left(self) -> bool {
        matches!(self, OverlayPosition::LeftBottom | OverlayPosition::LeftTop)
    }

    pub fn is_top(self) -> bool {
        matches!(self, OverlayPosition::LeftTop | OverlayPosition::RightTop)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OverlayPosition::LeftBottom => "left-bottom",
            OverlayPosition::LeftTop => "left-top",
            OverlayPosition::RightBottom => "right-bottom",
            OverlayPosition::RightTop => "right-top",
        }
    }
}

impl Display for OverlayPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlayPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left-bottom" => Ok(OverlayPosition::LeftBottom),
            "left-top" => Ok(OverlayPosition::LeftTop),
            "right-bottom" => Ok(OverlayPosition::RightBottom),
            "right-top" => Ok(OverlayPosition::RightTop),
            other => Err(format!(
                "Unknown overlay position '{other}', expected one of left-bottom, left-top, right-bottom, right-top"
            )),
        }
    }
}

/// Edge offsets for a corner plus the transform that parks the overlay off-screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionStyles {
    pub top: String,
    pub bottom: String,
    pub left: String,
    pub right: String,
    pub transform: String,
}

impl PositionStyles {
    pub fn edges(&self) -> [(&'static str, &str); 4] {
        [
            ("top", self.top.as_str()),
            ("bottom", self.bottom.as_str()),
            ("left", self.left.as_str()),
            ("right", self.right.as_str()),
        ]
    }
}

fn anchored_edges(position: OverlayPosition, offset: &str) -> (String, String, String, String) {
    let initial = || "initial".to_string();
    let (top, bottom) = if position.is_top() {
        (offset.to_string(), initial())
    } else {
        (initial(), offset.to_string())
    };
    let (left, right) = if position.is_left() {
        (offset.to_string(), initial())
    } else {
        (initial(), offset.to_string())
    };
    (top, bottom, left, right)
}

/// The hidden transform throws the overlay twice the viewport size towards its corner, which is
/// off-screen whatever the overlay's own size.
pub fn corner_position(position: OverlayPosition, viewport: Viewport, offset: &str) -> PositionStyles {
    let (top, bottom, left, right) = anchored_edges(position, offset);

    let x = 2 * viewport.width as i64 * if position.is_left() { -1 } else { 1 };
    let y = 2 * viewport.height as i64 * if position.is_top() { -1 } else { 1 };

    PositionStyles {
        top,
        bottom,
        left,
        right,
        transform: format!("scale(0.5) translate({x}px, {y}px)"),
    }
}

/// Placement of the floating toggle button. It sits in the same corner as its overlay.
pub fn toggle_button_position(position: OverlayPosition, offset: &str) -> PositionStyles {
    let (top, bottom, left, right) = anchored_edges(position, offset);
    PositionStyles {
        top,
        bottom,
        left,
        right,
        transform: "none".to_string(),
    }
}

pub fn mobile_media_queries(max_width: u32, max_height: u32) -> [String; 2] {
    [
        format!("(orientation: landscape) and (max-height: {max_height}px)"),
        format!("(orientation: portrait) and (max-width: {max_width}px)"),
    ]
}

pub fn is_mobile_view(window: &dyn HostWindow, max_width: u32, max_height: u32) -> bool {
    mobile_media_queries(max_width, max_height)
        .iter()
        .any(|query| window.matches_media(query))
}

/// Fully resolved container layout for one overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayLayout {
    pub top: String,
    pub bottom: String,
    pub left: String,
    pub right: String,
    pub width: String,
    pub height: String,
    pub z_index: String,
    pub transform: String,
    pub transition: String,
}

/// Size settings the layout falls back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSize {
    pub width: String,
    pub height: String,
    pub z_index: String,
}

impl OverlayLayout {
    pub fn resolve(
        position: &PositionStyles,
        size: &LayoutSize,
        is_hidden: bool,
        mobile: bool,
        viewport: Viewport,
        animation_ms: u32,
    ) -> Self {
        let transform = if is_hidden {
            position.transform.clone()
        } else {
            VISIBLE_TRANSFORM.to_string()
        };
        let transition = format!("transform {}s", animation_ms as f64 / 1000.0);

        if mobile {
            let zero = || "0".to_string();
            return Self {
                top: zero(),
                bottom: zero(),
                left: zero(),
                right: zero(),
                width: "100vw".to_string(),
                height: format!("{}px", viewport.height),
                z_index: size.z_index.clone(),
                transform,
                transition,
            };
        }

        Self {
            top: position.top.clone(),
            bottom: position.bottom.clone(),
            left: position.left.clone(),
            right: position.right.clone(),
            width: size.width.clone(),
            height: size.height.clone(),
            z_index: size.z_index.clone(),
            transform,
            transition,
        }
    }

    pub fn styles(&self) -> [(&'static str, &str); 9] {
        [
            ("top", self.top.as_str()),
            ("bottom", self.bottom.as_str()),
            ("left", self.left.as_str()),
            ("right", self.right.as_str()),
            ("width", self.width.as_str()),
            ("height", self.height.as_str()),
            ("z-index", self.z_index.as_str()),
            ("transition", self.transition.as_str()),
            ("transform", self.transform.as_str()),
        ]
    }
}
