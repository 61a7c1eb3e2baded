use crate::platform::{
    ClickHandler, ElementId, ListenerId, PlatformResult, Viewport, WindowEventKind,
    WindowListener,
};
use serde_json::Value;
use std::sync::Arc;

/// The page's document. Elements are addressed by id and must stay valid until removed.
pub trait HostDocument: Send + Sync {
    fn create_element(&self, tag: &str) -> ElementId;

    fn body(&self) -> ElementId;

    /// Returns the first element matching `selector`, if any.
    fn query_selector(&self, selector: &str) -> Option<ElementId>;

    /// Appends `child` to `parent`, detaching it from any previous parent first.
    fn append_child(&self, parent: ElementId, child: ElementId) -> PlatformResult<()>;

    /// Removes the element and its subtree. Removing an unknown element is a no-op.
    fn remove_element(&self, element: ElementId);

    fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> PlatformResult<()>;

    fn set_style(&self, element: ElementId, property: &str, value: &str) -> PlatformResult<()>;

    fn style(&self, element: ElementId, property: &str) -> Option<String>;

    fn set_class_name(&self, element: ElementId, class_name: &str) -> PlatformResult<()>;

    fn set_inner_html(&self, element: ElementId, html: &str) -> PlatformResult<()>;

    fn on_click(&self, element: ElementId, handler: ClickHandler) -> PlatformResult<()>;

    /// The browsing context of an iframe. `None` once the frame is detached.
    fn content_window(&self, frame: ElementId) -> Option<Arc<dyn FrameWindow>>;

    /// Should fail when the element is not allowed to go fullscreen.
    fn request_fullscreen(&self, element: ElementId) -> PlatformResult<()>;
}

/// The page's top-level window.
pub trait HostWindow: Send + Sync {
    fn inner_width(&self) -> u32;

    fn inner_height(&self) -> u32;

    fn viewport(&self) -> Viewport {
        Viewport::new(self.inner_width(), self.inner_height())
    }

    fn matches_media(&self, query: &str) -> bool;

    fn add_event_listener(&self, kind: WindowEventKind, listener: WindowListener) -> ListenerId;

    /// Removing an unknown listener is a no-op.
    fn remove_event_listener(&self, id: ListenerId);
}

/// The window inside an embedded iframe.
pub trait FrameWindow: Send + Sync {
    fn post_message(&self, message: &Value, target_origin: &str) -> PlatformResult<()>;
}

/// Everything the overlay layer needs from the embedding page.
#[derive(Clone)]
pub struct Host {
    pub document: Arc<dyn HostDocument>,
    pub window: Arc<dyn HostWindow>,
}

impl Host {
    pub fn new(document: Arc<dyn HostDocument>, window: Arc<dyn HostWindow>) -> Self {
        Self { document, window }
    }

    pub fn from_shared<T>(host: Arc<T>) -> Self
    where
        T: HostDocument + HostWindow + 'static,
    {
        Self {
            document: host.clone(),
            window: host,
        }
    }
}
