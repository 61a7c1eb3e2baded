use crate::platform::{HostWindow, ListenerId, WindowEventKind, WindowListener};
use std::sync::{Arc, Mutex};

/// A set of window listeners that are removed together, like listeners registered with an
/// `AbortController` signal. Aborted on drop as well.
pub struct ListenerScope {
    window: Arc<dyn HostWindow>,
    listeners: Mutex<Option<Vec<ListenerId>>>,
}

impl ListenerScope {
    pub fn new(window: Arc<dyn HostWindow>) -> Self {
        Self {
            window,
            listeners: Mutex::new(Some(Vec::new())),
        }
    }

    /// Registers a listener in this scope. Returns `None` if the scope was already aborted.
    pub fn listen(&self, kind: WindowEventKind, listener: WindowListener) -> Option<ListenerId> {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let listeners = listeners.as_mut()?;
        let id = self.window.add_event_listener(kind, listener);
        listeners.push(id);
        Some(id)
    }

    pub fn is_aborted(&self) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    pub fn abort(&self) {
        let taken = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        for id in taken.into_iter().flatten() {
            self.window.remove_event_listener(id);
        }
    }
}

impl Drop for ListenerScope {
    fn drop(&mut self) {
        self.abort();
    }
}
