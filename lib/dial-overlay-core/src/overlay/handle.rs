use crate::deferred::{DeferredRequest, PendingReply};
use crate::error::{OverlayError, OverlayResult};
use crate::overlay::ChatOverlayOptions;
use crate::platform::{ElementId, Host, ListenerId, MessageEvent, WindowEvent, WindowEventKind};
use crate::protocol::{self, InboundMessage, OutboundMessage};
use crate::style::{apply_style_map, set_styles};
use crate::task::{Task, TaskState};
use log::{debug, error, trace, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

pub const SANDBOX_FLAGS: &str = "allow-same-origin allow-scripts allow-modals allow-forms allow-popups allow-popups-to-escape-sandbox";

pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Where a [`ChatOverlay`] mounts its iframe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayRoot {
    Element(ElementId),
    Selector(String),
}

impl From<ElementId> for OverlayRoot {
    fn from(element: ElementId) -> Self {
        OverlayRoot::Element(element)
    }
}

impl From<&str> for OverlayRoot {
    fn from(selector: &str) -> Self {
        OverlayRoot::Selector(selector.to_string())
    }
}

impl From<String> for OverlayRoot {
    fn from(selector: String) -> Self {
        OverlayRoot::Selector(selector)
    }
}

struct Subscription {
    id: u64,
    event_type: String,
    callback: EventCallback,
}

#[derive(Default)]
struct Subscriptions {
    next_id: u64,
    entries: Vec<Subscription>,
}

type SharedSubscriptions = Arc<Mutex<Subscriptions>>;

/// Returned by [`ChatOverlay::subscribe`]. Dropping it keeps the subscription.
#[must_use = "dropping the handle keeps the subscription alive; call unsubscribe() to remove it"]
pub struct Unsubscribe {
    subscriptions: Weak<Mutex<Subscriptions>>,
    id: u64,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        if let Some(subscriptions) = self.subscriptions.upgrade() {
            subscriptions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .entries
                .retain(|subscription| subscription.id != self.id);
        }
    }
}

struct OverlayState {
    options: ChatOverlayOptions,
    requests: HashMap<String, DeferredRequest>,
    /// Ids of requests registered before the iframe was ready, in call order
    outbox: Vec<String>,
    /// Set while READY drains the outbox; sends keep queueing behind it until it is empty
    flushing: bool,
    listener: Option<ListenerId>,
    loader_requests: usize,
    fullscreen_allowed: bool,
    destroyed: bool,
}

struct OverlayInner {
    host: Host,
    root: ElementId,
    frame: ElementId,
    loader: ElementId,
    task: Task,
    state: Mutex<OverlayState>,
    subscriptions: SharedSubscriptions,
}

/// One embedded chat iframe and the request/event protocol spoken with it.
///
/// Cheap to clone; every clone drives the same iframe.
#[derive(Clone)]
pub struct ChatOverlay {
    inner: Arc<OverlayInner>,
}

impl ChatOverlay {
    /// Mounts the iframe and loader into `root` and starts syncing `options`. Must be called from
    /// inside a tokio runtime.
    pub fn new(
        host: Host,
        root: impl Into<OverlayRoot>,
        options: ChatOverlayOptions,
    ) -> OverlayResult<Self> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| OverlayError::NoRuntime)?;
        options.validate()?;

        let document = host.document.clone();
        let root = match root.into() {
            OverlayRoot::Element(element) => element,
            OverlayRoot::Selector(selector) => document
                .query_selector(&selector)
                .ok_or(OverlayError::RootNotFound(selector))?,
        };

        let frame = document.create_element("iframe");
        document.set_attribute(frame, "src", &options.domain)?;
        document.set_attribute(frame, "sandbox", SANDBOX_FLAGS)?;
        set_styles(
            document.as_ref(),
            frame,
            [("height", "100%"), ("width", "100%"), ("border", "none")],
        )?;

        let loader = document.create_element("div");
        set_styles(
            document.as_ref(),
            loader,
            [
                ("position", "absolute"),
                ("top", "0"),
                ("left", "0"),
                ("width", "100%"),
                ("height", "100%"),
                ("display", "flex"),
                ("align-items", "center"),
                ("justify-content", "center"),
                ("background-color", "#ffffff"),
            ],
        )?;
        if let Some(styles) = &options.loader_styles {
            apply_style_map(document.as_ref(), loader, styles)?;
        }
        if let Some(class_name) = &options.loader_class {
            document.set_class_name(loader, class_name)?;
        }
        document.set_inner_html(loader, "Loading...")?;

        document.append_child(root, frame)?;
        document.append_child(root, loader)?;
        document.set_style(root, "position", "relative")?;

        let overlay = Self {
            inner: Arc::new(OverlayInner {
                host,
                root,
                frame,
                loader,
                task: Task::new(),
                state: Mutex::new(OverlayState {
                    options: options.clone(),
                    requests: HashMap::new(),
                    outbox: Vec::new(),
                    flushing: false,
                    listener: None,
                    loader_requests: 0,
                    fullscreen_allowed: false,
                    destroyed: false,
                }),
                subscriptions: Arc::new(Mutex::new(Subscriptions::default())),
            }),
        };

        let weak = Arc::downgrade(&overlay.inner);
        let listener = overlay.inner.host.window.add_event_listener(
            WindowEventKind::Message,
            Arc::new(move |event| {
                let WindowEvent::Message(message) = event else {
                    return;
                };
                if let Some(inner) = weak.upgrade() {
                    ChatOverlay { inner }.process(message);
                }
            }),
        );
        overlay.inner.state().listener = Some(listener);

        debug!(
            "Created overlay for {} (frame: {}, root: {})",
            options.domain, frame, root
        );

        let sync = overlay.set_overlay_options(options);
        runtime.spawn(async move {
            match sync.await {
                Ok(()) => {}
                Err(OverlayError::Closed) => {
                    debug!("Overlay closed before its initial options were synced")
                }
                Err(e) => error!("Failed to sync initial overlay options: {e}"),
            }
        });

        Ok(overlay)
    }

    pub fn frame(&self) -> ElementId {
        self.inner.frame
    }

    pub fn loader(&self) -> ElementId {
        self.inner.loader
    }

    pub fn root(&self) -> ElementId {
        self.inner.root
    }

    pub fn options(&self) -> ChatOverlayOptions {
        self.inner.state().options.clone()
    }

    pub fn is_loader_visible(&self) -> bool {
        self.inner.state().loader_requests > 0
    }

    /// Requests that are waiting to be posted or answered.
    pub fn pending_requests(&self) -> usize {
        self.inner.state().requests.len()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.task.is_ready()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state().destroyed
    }

    /// Resolves once the iframe has announced `@DIAL_OVERLAY/READY`.
    pub async fn ready(&self) -> OverlayResult<bool> {
        self.inner.task.ready().await
    }

    /// Sends a request to the iframe. The request is registered immediately, so requests leave in
    /// call order even if the iframe is not ready yet. The timeout clock starts now.
    pub fn send(&self, request_type: &str, payload: Option<Value>) -> PendingReply {
        let timeout = self.inner.state().options.request_timeout();
        let (request, pending) = DeferredRequest::new(request_type, payload, timeout);
        let request_id = request.request_id().to_string();

        let message = {
            let mut state = self.inner.state();
            if state.destroyed {
                return PendingReply::failed(request_type, OverlayError::Closed);
            }

            let message = request.to_post_message();
            state.requests.insert(request_id.clone(), request);

            if !self.inner.task.is_ready() || state.flushing {
                trace!("Queued {} ({}) until the overlay is ready", request_type, request_id);
                state.outbox.push(request_id);
                return pending;
            }
            message
        };

        self.post(vec![message]);
        pending
    }

    /// Registers `callback` for broadcast events of `event_type`.
    pub fn subscribe<F>(&self, event_type: &str, callback: F) -> Unsubscribe
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut subscriptions = self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subscriptions.next_id += 1;
        let id = subscriptions.next_id;
        subscriptions.entries.push(Subscription {
            id,
            event_type: event_type.to_string(),
            callback: Arc::new(callback),
        });

        Unsubscribe {
            subscriptions: Arc::downgrade(&self.inner.subscriptions),
            id,
        }
    }

    /// Handles a `message` event from the window.
    pub fn process(&self, event: &MessageEvent) {
        let Some(message) = InboundMessage::parse(&event.data) else {
            return;
        };

        match message {
            InboundMessage::Ready => self.handle_ready(),
            InboundMessage::Event {
                message_type,
                payload,
            } => self.broadcast(&message_type, &payload),
            InboundMessage::Response {
                message_type,
                request_id,
                payload,
            } => self.handle_response(&message_type, &request_id, payload),
        }
    }

    fn handle_ready(&self) {
        {
            let mut state = self.inner.state();
            if state.destroyed || !self.inner.task.complete() {
                return;
            }
            state.flushing = true;
            debug!(
                "Overlay is ready, flushing {} queued requests",
                state.outbox.len()
            );
        }

        // Sends that race the flush land in the outbox and go out in a later round.
        loop {
            let queued = {
                let mut state = self.inner.state();
                let queued = Self::drain_outbox(&mut state);
                if queued.is_empty() {
                    state.flushing = false;
                    break;
                }
                queued
            };
            self.post(queued);
        }
    }

    /// Takes the queued requests in call order, dropping the ones whose deadline already passed.
    fn drain_outbox(state: &mut OverlayState) -> Vec<OutboundMessage> {
        let outbox = std::mem::take(&mut state.outbox);
        let mut queued = Vec::with_capacity(outbox.len());
        for request_id in outbox {
            let expired = match state.requests.get(&request_id) {
                Some(request) if request.is_expired() => true,
                Some(request) => {
                    queued.push(request.to_post_message());
                    false
                }
                None => false,
            };
            if expired {
                debug!(
                    "Dropping request {} that timed out before the overlay was ready",
                    request_id
                );
                state.requests.remove(&request_id);
            }
        }
        queued
    }

    fn broadcast(&self, event_type: &str, payload: &Value) {
        let callbacks: Vec<EventCallback> = self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .iter()
            .filter(|subscription| subscription.event_type == event_type)
            .map(|subscription| subscription.callback.clone())
            .collect();

        trace!("Event {} -> {} subscribers", event_type, callbacks.len());
        for callback in callbacks {
            callback(payload);
        }
    }

    fn handle_response(&self, message_type: &str, request_id: &str, payload: Value) {
        let mut state = self.inner.state();
        let matched = state
            .requests
            .get(request_id)
            .is_some_and(|request| request.matches(message_type, request_id));

        if !matched {
            trace!("Ignoring unmatched response {} ({})", message_type, request_id);
            return;
        }

        if let Some(mut request) = state.requests.remove(request_id) {
            if request.is_expired() {
                warn!(
                    "Late response for {} ({}) arrived after its timeout",
                    request.request_type(),
                    request_id
                );
            }
            request.reply(payload);
        }
    }

    /// Posts messages to the iframe. Never called with the state lock held, so a host that
    /// delivers responses synchronously can re-enter `process`.
    fn post(&self, messages: Vec<OutboundMessage>) {
        if messages.is_empty() {
            return;
        }

        let Some(window) = self.inner.host.document.content_window(self.inner.frame) else {
            for message in messages {
                self.fail_request(&message.request_id, OverlayError::NoContentWindow);
            }
            return;
        };

        for message in messages {
            let result = message
                .to_value()
                .map_err(OverlayError::from)
                .and_then(|value| window.post_message(&value, "*").map_err(OverlayError::from));

            match result {
                Ok(()) => trace!("Posted {} ({})", message.message_type, message.request_id),
                Err(e) => {
                    warn!("Failed to post {}: {}", message.message_type, e);
                    self.fail_request(&message.request_id, e);
                }
            }
        }
    }

    fn fail_request(&self, request_id: &str, error: OverlayError) {
        let request = self.inner.state().requests.remove(request_id);
        if let Some(mut request) = request {
            request.reject(error);
        }
    }

    pub fn allow_fullscreen(&self) -> OverlayResult<()> {
        let document = &self.inner.host.document;
        document.set_attribute(self.inner.frame, "allow", "fullscreen")?;
        document.set_attribute(self.inner.frame, "allowfullscreen", "true")?;
        self.inner.state().fullscreen_allowed = true;
        Ok(())
    }

    pub fn open_fullscreen(&self) -> OverlayResult<()> {
        if !self.inner.state().fullscreen_allowed {
            return Err(OverlayError::FullscreenNotAllowed);
        }
        self.inner
            .host
            .document
            .request_fullscreen(self.inner.frame)?;
        Ok(())
    }

    pub fn show_loader(&self) {
        self.inner.state().loader_requests += 1;
        self.set_loader_display("flex");
    }

    pub fn hide_loader(&self) {
        let visible = {
            let mut state = self.inner.state();
            state.loader_requests = state.loader_requests.saturating_sub(1);
            state.loader_requests > 0
        };
        if !visible {
            self.set_loader_display("none");
        }
    }

    fn set_loader_display(&self, display: &str) {
        if let Err(e) = self
            .inner
            .host
            .document
            .set_style(self.inner.loader, "display", display)
        {
            // Fails once the loader was removed by destroy()
            trace!("Could not toggle loader: {e}");
        }
    }

    pub fn get_messages(&self) -> PendingReply {
        self.send(protocol::GET_MESSAGES, None)
    }

    pub fn send_message(&self, content: &str) -> PendingReply {
        self.send(
            protocol::SEND_MESSAGE,
            Some(protocol::send_message_payload(content)),
        )
    }

    pub fn set_system_prompt(&self, system_prompt: &str) -> PendingReply {
        self.send(
            protocol::SET_SYSTEM_PROMPT,
            Some(protocol::system_prompt_payload(system_prompt)),
        )
    }

    pub fn get_conversations(&self) -> PendingReply {
        self.send(protocol::GET_CONVERSATIONS, None)
    }

    pub fn create_conversation(&self, parent_path: Option<&str>) -> PendingReply {
        self.send(
            protocol::CREATE_CONVERSATION,
            Some(protocol::create_conversation_payload(parent_path)),
        )
    }

    pub fn select_conversation(&self, conversation_id: &str) -> PendingReply {
        self.send(
            protocol::SELECT_CONVERSATION,
            Some(protocol::select_conversation_payload(conversation_id)),
        )
    }

    /// Replaces the options and sends them to the iframe. The loader stays visible until the
    /// round trip settles.
    pub fn set_overlay_options(
        &self,
        options: ChatOverlayOptions,
    ) -> impl Future<Output = OverlayResult<()>> + Send + 'static {
        let prepared = options
            .validate()
            .and_then(|_| Ok(serde_json::to_value(&options)?));

        let reply = prepared.map(|payload| {
            self.inner.state().options = options;
            self.show_loader();
            self.send(protocol::SET_OVERLAY_OPTIONS, Some(payload))
        });

        let overlay = self.clone();
        async move {
            let result = reply?.await;
            overlay.hide_loader();
            result.map(|_| ())
        }
    }

    /// Stops listening, fails the readiness gate, and removes the iframe. Outstanding requests
    /// fail with [`OverlayError::Closed`]. Safe to call more than once.
    pub fn destroy(&self) {
        let (listener, requests) = {
            let mut state = self.inner.state();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.outbox.clear();
            state.loader_requests = 0;
            let requests: Vec<DeferredRequest> =
                state.requests.drain().map(|(_, request)| request).collect();
            (state.listener.take(), requests)
        };

        if let Some(listener) = listener {
            self.inner.host.window.remove_event_listener(listener);
        }
        self.inner.task.fail("overlay destroyed");

        for mut request in requests {
            request.reject(OverlayError::Closed);
        }

        let document = &self.inner.host.document;
        document.remove_element(self.inner.frame);
        document.remove_element(self.inner.loader);
        debug!("Destroyed overlay (frame: {})", self.inner.frame);
    }

    pub fn task_state(&self) -> TaskState {
        self.inner.task.state()
    }
}

impl OverlayInner {
    fn state(&self) -> MutexGuard<'_, OverlayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for OverlayInner {
    fn drop(&mut self) {
        let listener = self
            .state
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .listener
            .take();
        if let Some(listener) = listener {
            self.host.window.remove_event_listener(listener);
        }
    }
}
