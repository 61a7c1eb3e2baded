use crate::config::Config;
use crate::deferred::PendingReply;
use crate::error::{OverlayError, OverlayResult};
use crate::layout::{corner_position, is_mobile_view, OverlayLayout, PositionStyles};
use crate::overlay::chrome::OverlayChrome;
use crate::overlay::handle::{ChatOverlay, Unsubscribe};
use crate::overlay::{ChatOverlayManagerOptions, ChatOverlayOptions};
use crate::platform::{ElementId, Host, ListenerScope, WindowEventKind};
use crate::style::set_styles;
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

struct ManagedOverlay {
    overlay: ChatOverlay,
    options: ChatOverlayManagerOptions,
    chrome: OverlayChrome,
    position: PositionStyles,
    is_hidden: bool,
}

struct ManagerInner {
    host: Host,
    overlays: Mutex<IndexMap<String, ManagedOverlay>>,
    listeners: ListenerScope,
}

impl ManagerInner {
    fn overlays(&self) -> MutexGuard<'_, IndexMap<String, ManagedOverlay>> {
        self.overlays.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registry of named overlays with their chrome and responsive layout.
///
/// Every method taking an `id` fails with [`OverlayError::UnknownOverlay`] before touching the
/// page or the iframe when no overlay is registered under that id.
#[derive(Clone)]
pub struct ChatOverlayManager {
    inner: Arc<ManagerInner>,
}

impl ChatOverlayManager {
    pub fn new(host: Host) -> Self {
        let inner = Arc::new(ManagerInner {
            listeners: ListenerScope::new(host.window.clone()),
            host,
            overlays: Mutex::new(IndexMap::new()),
        });

        for kind in [WindowEventKind::Resize, WindowEventKind::OrientationChange] {
            let weak = Arc::downgrade(&inner);
            inner.listeners.listen(
                kind,
                Arc::new(move |_| {
                    if let Some(inner) = weak.upgrade() {
                        ChatOverlayManager { inner }.update_all();
                    }
                }),
            );
        }

        Self { inner }
    }

    /// Builds the chrome and the iframe for `options.id`. The overlay starts hidden behind its
    /// toggle button.
    pub fn create_overlay(&self, options: ChatOverlayManagerOptions) -> OverlayResult<()> {
        options.validate()?;
        let id = options.id.clone();
        if self.inner.overlays().contains_key(&id) {
            return Err(OverlayError::DuplicateOverlay(id));
        }

        let document = self.inner.host.document.clone();
        let chrome = OverlayChrome::build(document.as_ref(), &options)?;

        let overlay = match ChatOverlay::new(
            self.inner.host.clone(),
            chrome.overlay_container,
            options.overlay.clone(),
        ) {
            Ok(overlay) => overlay,
            Err(e) => {
                chrome.remove(document.as_ref());
                return Err(e);
            }
        };

        if let Err(e) = self.wire_controls(&id, &overlay, &chrome, options.allow_fullscreen) {
            overlay.destroy();
            chrome.remove(document.as_ref());
            return Err(e);
        }

        let position = corner_position(
            options.position,
            self.inner.host.window.viewport(),
            &Config::edge_offset(),
        );

        {
            let mut overlays = self.inner.overlays();
            if overlays.contains_key(&id) {
                drop(overlays);
                overlay.destroy();
                chrome.remove(document.as_ref());
                return Err(OverlayError::DuplicateOverlay(id));
            }
            overlays.insert(
                id.clone(),
                ManagedOverlay {
                    overlay,
                    options,
                    chrome,
                    position,
                    is_hidden: false,
                },
            );
        }

        self.update_overlay(&id)?;
        self.hide_overlay(&id)?;
        chrome.attach(document.as_ref())?;

        debug!("Created managed overlay '{}'", id);
        Ok(())
    }

    fn wire_controls(
        &self,
        id: &str,
        overlay: &ChatOverlay,
        chrome: &OverlayChrome,
        allow_fullscreen: bool,
    ) -> OverlayResult<()> {
        let document = &self.inner.host.document;

        let on_click = |action: fn(&ChatOverlayManager, &str) -> OverlayResult<()>| {
            let weak: Weak<ManagerInner> = Arc::downgrade(&self.inner);
            let id = id.to_string();
            Arc::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = action(&ChatOverlayManager { inner }, &id) {
                    warn!("Overlay '{}' control failed: {}", id, e);
                }
            })
        };

        document.on_click(chrome.toggle_button, on_click(Self::show_overlay))?;
        document.on_click(chrome.close_button, on_click(Self::hide_overlay))?;

        if allow_fullscreen {
            overlay.allow_fullscreen()?;
            if let Some(button) = chrome.fullscreen_button {
                document.on_click(button, on_click(Self::open_fullscreen))?;
            }
        }
        Ok(())
    }

    /// Destroys the overlay and removes its container and toggle button.
    pub fn remove_overlay(&self, id: &str) -> OverlayResult<()> {
        let managed = self
            .inner
            .overlays()
            .shift_remove(id)
            .ok_or_else(|| OverlayError::UnknownOverlay(id.to_string()))?;

        managed.overlay.destroy();
        managed.chrome.remove(self.inner.host.document.as_ref());
        debug!("Removed managed overlay '{}'", id);
        Ok(())
    }

    pub fn show_overlay(&self, id: &str) -> OverlayResult<()> {
        self.set_hidden(id, false)
    }

    pub fn hide_overlay(&self, id: &str) -> OverlayResult<()> {
        self.set_hidden(id, true)
    }

    fn set_hidden(&self, id: &str, is_hidden: bool) -> OverlayResult<()> {
        self.with_overlay(id, |managed| managed.is_hidden = is_hidden)?;
        self.update_overlay(id)
    }

    /// Recomputes position, size and visibility from the current viewport.
    pub fn update_overlay(&self, id: &str) -> OverlayResult<()> {
        let window = &self.inner.host.window;
        let viewport = window.viewport();
        let mobile = is_mobile_view(
            window.as_ref(),
            Config::mobile_max_width(),
            Config::mobile_max_height(),
        );

        let (chrome, layout, is_hidden) = self.with_overlay(id, |managed| {
            managed.position =
                corner_position(managed.options.position, viewport, &Config::edge_offset());
            let layout = OverlayLayout::resolve(
                &managed.position,
                &managed.options.layout_size(),
                managed.is_hidden,
                mobile,
                viewport,
                Config::animation_ms(),
            );
            (managed.chrome, layout, managed.is_hidden)
        })?;

        let document = self.inner.host.document.as_ref();
        set_styles(document, chrome.container, layout.styles())?;
        document.set_style(
            chrome.toggle_button,
            "display",
            if is_hidden { "flex" } else { "none" },
        )?;
        Ok(())
    }

    fn update_all(&self) {
        let ids = self.overlay_ids();
        for id in ids {
            if let Err(e) = self.update_overlay(&id) {
                warn!("Failed to update layout of overlay '{}': {}", id, e);
            }
        }
    }

    fn with_overlay<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut ManagedOverlay) -> R,
    ) -> OverlayResult<R> {
        let mut overlays = self.inner.overlays();
        let managed = overlays
            .get_mut(id)
            .ok_or_else(|| OverlayError::UnknownOverlay(id.to_string()))?;
        Ok(f(managed))
    }

    pub fn get_overlay(&self, id: &str) -> OverlayResult<ChatOverlay> {
        self.with_overlay(id, |managed| managed.overlay.clone())
    }

    pub async fn ready(&self, id: &str) -> OverlayResult<bool> {
        self.get_overlay(id)?.ready().await
    }

    pub fn send(&self, id: &str, request_type: &str, payload: Option<Value>) -> OverlayResult<PendingReply> {
        Ok(self.get_overlay(id)?.send(request_type, payload))
    }

    pub fn open_fullscreen(&self, id: &str) -> OverlayResult<()> {
        self.get_overlay(id)?.open_fullscreen()
    }

    pub fn set_system_prompt(&self, id: &str, system_prompt: &str) -> OverlayResult<PendingReply> {
        Ok(self.get_overlay(id)?.set_system_prompt(system_prompt))
    }

    pub fn get_messages(&self, id: &str) -> OverlayResult<PendingReply> {
        Ok(self.get_overlay(id)?.get_messages())
    }

    pub fn send_message(&self, id: &str, content: &str) -> OverlayResult<PendingReply> {
        Ok(self.get_overlay(id)?.send_message(content))
    }

    pub fn get_conversations(&self, id: &str) -> OverlayResult<PendingReply> {
        Ok(self.get_overlay(id)?.get_conversations())
    }

    pub fn create_conversation(
        &self,
        id: &str,
        parent_path: Option<&str>,
    ) -> OverlayResult<PendingReply> {
        Ok(self.get_overlay(id)?.create_conversation(parent_path))
    }

    pub fn select_conversation(
        &self,
        id: &str,
        conversation_id: &str,
    ) -> OverlayResult<PendingReply> {
        Ok(self.get_overlay(id)?.select_conversation(conversation_id))
    }

    pub fn set_overlay_options(
        &self,
        id: &str,
        options: ChatOverlayOptions,
    ) -> OverlayResult<impl Future<Output = OverlayResult<()>> + Send + 'static> {
        options.validate()?;
        let overlay = self.with_overlay(id, |managed| {
            managed.options.overlay = options.clone();
            managed.overlay.clone()
        })?;
        Ok(overlay.set_overlay_options(options))
    }

    pub fn subscribe<F>(&self, id: &str, event_type: &str, callback: F) -> OverlayResult<Unsubscribe>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Ok(self.get_overlay(id)?.subscribe(event_type, callback))
    }

    /// Stops listening for viewport changes and tears down every overlay, including its toggle
    /// button.
    pub fn destroy(&self) {
        self.inner.listeners.abort();

        let overlays: Vec<(String, ManagedOverlay)> = self.inner.overlays().drain(..).collect();
        let document = self.inner.host.document.as_ref();
        for (id, managed) in overlays {
            managed.overlay.destroy();
            managed.chrome.remove(document);
            debug!("Destroyed managed overlay '{}'", id);
        }
    }

    pub fn overlay_ids(&self) -> Vec<String> {
        self.inner.overlays().keys().cloned().collect()
    }

    pub fn is_hidden(&self, id: &str) -> OverlayResult<bool> {
        self.with_overlay(id, |managed| managed.is_hidden)
    }

    pub fn chrome(&self, id: &str) -> OverlayResult<OverlayChrome> {
        self.with_overlay(id, |managed| managed.chrome)
    }

    pub fn container(&self, id: &str) -> OverlayResult<ElementId> {
        self.with_overlay(id, |managed| managed.chrome.container)
    }

    pub fn toggle_button(&self, id: &str) -> OverlayResult<ElementId> {
        self.with_overlay(id, |managed| managed.chrome.toggle_button)
    }

    /// The off-screen transform used while the overlay is hidden.
    pub fn hidden_transform(&self, id: &str) -> OverlayResult<String> {
        self.with_overlay(id, |managed| managed.position.transform.clone())
    }

    pub fn options(&self, id: &str) -> OverlayResult<ChatOverlayManagerOptions> {
        self.with_overlay(id, |managed| managed.options.clone())
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        let overlays = std::mem::take(self.overlays.get_mut().unwrap_or_else(|e| e.into_inner()));
        if overlays.is_empty() {
            return;
        }

        warn!("Overlay manager dropped with {} live overlays", overlays.len());
        for (_, managed) in overlays {
            managed.overlay.destroy();
            managed.chrome.remove(self.host.document.as_ref());
        }
    }
}
