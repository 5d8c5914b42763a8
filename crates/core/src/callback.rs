// Callback mechanism for player events
// Events are dispatched from the command stream; callbacks must not block it

use crate::error::MediaError;
use crate::state::PlayerState;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// Player event types
#[derive(Debug, Clone)]
pub enum CallbackEvent {
    /// Player state changed
    StateChanged {
        old_state: PlayerState,
        new_state: PlayerState,
    },

    /// Frames started or stopped reaching a live surface
    RenderingChanged { live: bool },

    /// A picked reference resolved to a readable local source
    SourceResolved {
        reference_id: u64,
        path: PathBuf,
        length: u64,
    },

    /// A picked reference could not be resolved or prepared
    SourceFailed { reference_id: u64, error: MediaError },

    /// A user command was refused
    CommandRejected {
        command: &'static str,
        reason: MediaError,
    },

    /// Playback error occurred
    Error { message: String },
}

/// Player callback trait
/// Implementations should be lightweight and non-blocking
pub trait PlayerCallback: Send + Sync {
    /// Called when an event occurs
    fn on_event(&self, event: CallbackEvent);
}

/// Callback manager for handling multiple callbacks
#[derive(Clone)]
pub struct CallbackManager {
    callbacks: Arc<Mutex<Vec<Arc<dyn PlayerCallback>>>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self {
            callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_callback(&self, callback: Arc<dyn PlayerCallback>) {
        self.callbacks.lock().push(callback);
    }

    pub fn clear_callbacks(&self) {
        self.callbacks.lock().clear();
    }

    pub fn dispatch_event(&self, event: CallbackEvent) {
        // Snapshot so a callback may register others without deadlocking
        let callbacks: Vec<_> = self.callbacks.lock().iter().cloned().collect();
        for callback in callbacks {
            callback.on_event(event.clone());
        }
    }
}

impl Default for CallbackManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple callback implementation for testing
#[cfg(test)]
pub struct TestCallback {
    events: Arc<Mutex<Vec<CallbackEvent>>>,
}

#[cfg(test)]
impl TestCallback {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn get_events(&self) -> Vec<CallbackEvent> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
impl PlayerCallback for TestCallback {
    fn on_event(&self, event: CallbackEvent) {
        self.events.lock().push(event);
    }
}
