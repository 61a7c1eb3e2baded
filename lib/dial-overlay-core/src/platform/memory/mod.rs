//! In-memory host page. Used by the test suite and by the `dial-overlay` demo binary, which
//! pairs it with a simulated embedded chat application.

pub mod media_query;

use crate::platform::{
    ClickHandler, ElementId, FrameWindow, HostDocument, HostWindow, ListenerId, MessageEvent,
    PlatformResult, Viewport, WindowEvent, WindowEventKind, WindowListener,
};
use indexmap::IndexMap;
use log::trace;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// A message posted into one of the host's iframes.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePost {
    pub frame: ElementId,
    pub message: Value,
    pub target_origin: String,
}

type FrameTap = Arc<Mutex<Option<mpsc::UnboundedSender<FramePost>>>>;

pub struct MemoryFrame {
    element: ElementId,
    posted: Mutex<Vec<Value>>,
    tap: FrameTap,
}

impl MemoryFrame {
    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn posted_messages(&self) -> Vec<Value> {
        self.posted.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl FrameWindow for MemoryFrame {
    fn post_message(&self, message: &Value, target_origin: &str) -> PlatformResult<()> {
        trace!("Frame {} <- {}", self.element, message);
        self.posted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());

        if let Some(tap) = self.tap.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            // If the receiver is gone nobody is simulating the frame anymore.
            let _ = tap.send(FramePost {
                frame: self.element,
                message: message.clone(),
                target_origin: target_origin.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct ElementNode {
    tag: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    attributes: IndexMap<String, String>,
    styles: IndexMap<String, String>,
    class_name: String,
    inner_html: String,
    click_handlers: Vec<ClickHandler>,
}

struct MemoryState {
    next_element_id: ElementId,
    body: ElementId,
    elements: HashMap<ElementId, ElementNode>,
    frames: HashMap<ElementId, Arc<MemoryFrame>>,
    next_listener_id: ListenerId,
    listeners: IndexMap<ListenerId, (WindowEventKind, WindowListener)>,
    viewport: Viewport,
    fullscreen_element: Option<ElementId>,
}

pub struct MemoryHost {
    state: Mutex<MemoryState>,
    tap: FrameTap,
}

impl MemoryHost {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        let body = 1;
        let mut elements = HashMap::new();
        elements.insert(
            body,
            ElementNode {
                tag: "body".to_string(),
                ..Default::default()
            },
        );

        Arc::new(Self {
            state: Mutex::new(MemoryState {
                next_element_id: body + 1,
                body,
                elements,
                frames: HashMap::new(),
                next_listener_id: 1,
                listeners: IndexMap::new(),
                viewport: Viewport::new(width, height),
                fullscreen_element: None,
            }),
            tap: Arc::new(Mutex::new(None)),
        })
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Streams every message posted into any iframe of this host. Replaces a previous stream.
    pub fn frame_messages(&self) -> mpsc::UnboundedReceiver<FramePost> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tap.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        rx
    }

    pub fn frame(&self, frame: ElementId) -> Option<Arc<MemoryFrame>> {
        self.state().frames.get(&frame).cloned()
    }

    /// Messages posted into the iframe, oldest first. Empty for unknown frames.
    pub fn posted_messages(&self, frame: ElementId) -> Vec<Value> {
        self.frame(frame)
            .map(|frame| frame.posted_messages())
            .unwrap_or_default()
    }

    /// Delivers a `message` event to every message listener, as if posted by an iframe.
    pub fn dispatch_message(&self, data: Value, origin: &str) {
        self.dispatch(WindowEvent::Message(MessageEvent {
            data,
            origin: origin.to_string(),
        }));
    }

    pub fn dispatch(&self, event: WindowEvent) {
        let kind = event.kind();
        let listeners: Vec<WindowListener> = self
            .state()
            .listeners
            .values()
            .filter(|(listener_kind, _)| *listener_kind == kind)
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&event);
        }
    }

    /// Resizes the viewport and fires `resize`, plus `orientationchange` when the orientation
    /// flips.
    pub fn set_viewport(&self, width: u32, height: u32) {
        let orientation_changed = {
            let mut state = self.state();
            let was_landscape = state.viewport.is_landscape();
            state.viewport = Viewport::new(width, height);
            was_landscape != state.viewport.is_landscape()
        };

        self.dispatch(WindowEvent::Resize);
        if orientation_changed {
            self.dispatch(WindowEvent::OrientationChange);
        }
    }

    /// Runs the element's click handlers. Returns false if the element doesn't exist.
    pub fn click(&self, element: ElementId) -> bool {
        let handlers = match self.state().elements.get(&element) {
            Some(node) => node.click_handlers.clone(),
            None => return false,
        };

        for handler in handlers {
            handler();
        }
        true
    }

    pub fn contains(&self, element: ElementId) -> bool {
        self.state().elements.contains_key(&element)
    }

    /// Whether the element is reachable from `<body>`.
    pub fn is_attached(&self, element: ElementId) -> bool {
        let state = self.state();
        let mut current = Some(element);
        while let Some(id) = current {
            if id == state.body {
                return true;
            }
            current = state.elements.get(&id).and_then(|node| node.parent);
        }
        false
    }

    pub fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.state().elements.get(&element)?.parent
    }

    pub fn children(&self, element: ElementId) -> Vec<ElementId> {
        self.state()
            .elements
            .get(&element)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn tag(&self, element: ElementId) -> Option<String> {
        Some(self.state().elements.get(&element)?.tag.clone())
    }

    pub fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.state()
            .elements
            .get(&element)?
            .attributes
            .get(name)
            .cloned()
    }

    pub fn class_name(&self, element: ElementId) -> Option<String> {
        Some(self.state().elements.get(&element)?.class_name.clone())
    }

    pub fn inner_html(&self, element: ElementId) -> Option<String> {
        Some(self.state().elements.get(&element)?.inner_html.clone())
    }

    pub fn fullscreen_element(&self) -> Option<ElementId> {
        self.state().fullscreen_element
    }

    pub fn listener_count(&self, kind: WindowEventKind) -> usize {
        self.state()
            .listeners
            .values()
            .filter(|(listener_kind, _)| *listener_kind == kind)
            .count()
    }

    fn with_node<R>(
        &self,
        element: ElementId,
        f: impl FnOnce(&mut ElementNode) -> R,
    ) -> PlatformResult<R> {
        let mut state = self.state();
        let node = state
            .elements
            .get_mut(&element)
            .ok_or_else(|| format!("Element {element} does not exist"))?;
        Ok(f(node))
    }
}

fn matches_selector(node: &ElementNode, selector: &str) -> bool {
    if let Some(id) = selector.strip_prefix('#') {
        node.attributes.get("id").is_some_and(|value| value == id)
    } else if let Some(class) = selector.strip_prefix('.') {
        node.class_name.split_whitespace().any(|c| c == class)
    } else {
        node.tag.eq_ignore_ascii_case(selector)
    }
}

impl HostDocument for MemoryHost {
    fn create_element(&self, tag: &str) -> ElementId {
        let mut state = self.state();
        let id = state.next_element_id;
        state.next_element_id += 1;
        state.elements.insert(
            id,
            ElementNode {
                tag: tag.to_ascii_lowercase(),
                ..Default::default()
            },
        );

        if tag.eq_ignore_ascii_case("iframe") {
            state.frames.insert(
                id,
                Arc::new(MemoryFrame {
                    element: id,
                    posted: Mutex::new(Vec::new()),
                    tap: self.tap.clone(),
                }),
            );
        }
        id
    }

    fn body(&self) -> ElementId {
        self.state().body
    }

    fn query_selector(&self, selector: &str) -> Option<ElementId> {
        let selector = selector.trim();
        let state = self.state();

        // Depth-first from <body> so the result follows document order.
        let mut stack = vec![state.body];
        while let Some(id) = stack.pop() {
            let Some(node) = state.elements.get(&id) else {
                continue;
            };
            if id != state.body && matches_selector(node, selector) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    fn append_child(&self, parent: ElementId, child: ElementId) -> PlatformResult<()> {
        let mut state = self.state();
        if !state.elements.contains_key(&parent) {
            return Err(format!("Parent element {parent} does not exist").into());
        }
        if parent == child {
            return Err("Cannot append an element to itself".into());
        }

        let previous_parent = state
            .elements
            .get(&child)
            .ok_or_else(|| format!("Child element {child} does not exist"))?
            .parent;
        if let Some(previous) = previous_parent.and_then(|p| state.elements.get_mut(&p)) {
            previous.children.retain(|c| *c != child);
        }

        if let Some(node) = state.elements.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = state.elements.get_mut(&parent) {
            node.children.push(child);
        }
        Ok(())
    }

    fn remove_element(&self, element: ElementId) {
        let mut state = self.state();
        if element == state.body {
            return;
        }

        let Some(node) = state.elements.get(&element) else {
            return;
        };
        if let Some(parent) = node.parent.and_then(|p| state.elements.get_mut(&p)) {
            parent.children.retain(|c| *c != element);
        }

        let mut stack = vec![element];
        while let Some(id) = stack.pop() {
            if let Some(node) = state.elements.remove(&id) {
                stack.extend(node.children);
            }
            state.frames.remove(&id);
            if state.fullscreen_element == Some(id) {
                state.fullscreen_element = None;
            }
        }
    }

    fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> PlatformResult<()> {
        self.with_node(element, |node| {
            node.attributes.insert(name.to_string(), value.to_string());
        })
    }

    fn set_style(&self, element: ElementId, property: &str, value: &str) -> PlatformResult<()> {
        self.with_node(element, |node| {
            node.styles.insert(property.to_string(), value.to_string());
        })
    }

    fn style(&self, element: ElementId, property: &str) -> Option<String> {
        self.state()
            .elements
            .get(&element)?
            .styles
            .get(property)
            .cloned()
    }

    fn set_class_name(&self, element: ElementId, class_name: &str) -> PlatformResult<()> {
        self.with_node(element, |node| node.class_name = class_name.to_string())
    }

    fn set_inner_html(&self, element: ElementId, html: &str) -> PlatformResult<()> {
        self.with_node(element, |node| node.inner_html = html.to_string())
    }

    fn on_click(&self, element: ElementId, handler: ClickHandler) -> PlatformResult<()> {
        self.with_node(element, |node| node.click_handlers.push(handler))
    }

    fn content_window(&self, frame: ElementId) -> Option<Arc<dyn FrameWindow>> {
        let state = self.state();
        state.elements.get(&frame)?.parent?;
        let frame: Arc<dyn FrameWindow> = state.frames.get(&frame)?.clone();
        Some(frame)
    }

    fn request_fullscreen(&self, element: ElementId) -> PlatformResult<()> {
        let mut state = self.state();
        let node = state
            .elements
            .get(&element)
            .ok_or_else(|| format!("Element {element} does not exist"))?;

        let allowed = node.tag != "iframe"
            || node.attributes.contains_key("allowfullscreen")
            || node
                .attributes
                .get("allow")
                .is_some_and(|allow| allow.split(';').any(|p| p.trim() == "fullscreen"));
        if !allowed {
            return Err("Fullscreen is not allowed for this frame".into());
        }

        state.fullscreen_element = Some(element);
        Ok(())
    }
}

impl HostWindow for MemoryHost {
    fn inner_width(&self) -> u32 {
        self.state().viewport.width
    }

    fn inner_height(&self) -> u32 {
        self.state().viewport.height
    }

    fn matches_media(&self, query: &str) -> bool {
        media_query::evaluate(query, self.state().viewport)
    }

    fn add_event_listener(&self, kind: WindowEventKind, listener: WindowListener) -> ListenerId {
        let mut state = self.state();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.insert(id, (kind, listener));
        id
    }

    fn remove_event_listener(&self, id: ListenerId) {
        self.state().listeners.shift_remove(&id);
    }
}
