// Surface lifecycle: owns the identity of the current rendering surface and
// turns platform create/resize/destroy callbacks into ordered events.

use glmedia_core::{SurfaceHandle, SurfaceSize};
use std::sync::Arc;

/// Surface lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Created(SurfaceHandle),
    Changed(SurfaceHandle, SurfaceSize),
    Destroyed(SurfaceHandle),
}

impl SurfaceEvent {
    pub fn handle(&self) -> SurfaceHandle {
        match self {
            SurfaceEvent::Created(h) | SurfaceEvent::Changed(h, _) | SurfaceEvent::Destroyed(h) => *h,
        }
    }
}

/// Receiver of surface events.
///
/// `Destroyed` is delivered synchronously; the listener returns only once the
/// surface is no longer used.
pub trait SurfaceListener: Send + Sync {
    fn on_surface_event(&self, event: SurfaceEvent);
}

#[derive(Debug, Clone, Copy)]
struct CurrentSurface {
    handle: SurfaceHandle,
    size: Option<SurfaceSize>,
}

/// Owner of the current `SurfaceHandle`.
///
/// For every handle it hands out, listeners see `Created` before any
/// `Changed`/`Destroyed`, and `Destroyed` is always delivered eventually: when
/// a newer surface replaces it, on `teardown()`, or on drop.
pub struct SurfaceLifecycleManager {
    current: Option<CurrentSurface>,
    listener: Option<Arc<dyn SurfaceListener>>,
    next_id: u64,
}

impl SurfaceLifecycleManager {
    pub fn new() -> Self {
        Self {
            current: None,
            listener: None,
            next_id: 1,
        }
    }

    /// Register the single listener, replacing (and returning) the previous one.
    ///
    /// A live surface is destroyed on the outgoing listener and replayed to
    /// the new one, so each sees a `Destroyed` for every `Created` it got and
    /// never a `Destroyed` without its `Created`.
    pub fn set_listener(&mut self, listener: Arc<dyn SurfaceListener>) -> Option<Arc<dyn SurfaceListener>> {
        self.hand_off();
        let previous = self.listener.replace(listener);
        if let Some(current) = self.current {
            log::debug!("[surface] replaying {} to new listener", current.handle);
            self.emit(SurfaceEvent::Created(current.handle));
            if let Some(size) = current.size {
                self.emit(SurfaceEvent::Changed(current.handle, size));
            }
        }
        previous
    }

    /// Detach the listener; it is told the live surface is gone first
    pub fn clear_listener(&mut self) -> Option<Arc<dyn SurfaceListener>> {
        self.hand_off();
        self.listener.take()
    }

    fn hand_off(&self) {
        if let (Some(current), Some(_)) = (self.current, &self.listener) {
            log::debug!("[surface] destroying {} on outgoing listener", current.handle);
            self.emit(SurfaceEvent::Destroyed(current.handle));
        }
    }

    pub fn current(&self) -> Option<SurfaceHandle> {
        self.current.map(|c| c.handle)
    }

    pub fn current_size(&self) -> Option<SurfaceSize> {
        self.current.and_then(|c| c.size)
    }

    /// Platform callback: a new surface exists. `token` names the native window.
    pub fn surface_created(&mut self, token: u64) -> SurfaceHandle {
        if let Some(stale) = self.current.take() {
            log::warn!(
                "[surface] created without destroy of {}, destroying it first",
                stale.handle
            );
            self.emit(SurfaceEvent::Destroyed(stale.handle));
        }

        let handle = SurfaceHandle::new(self.next_id, token);
        self.next_id += 1;
        self.current = Some(CurrentSurface { handle, size: None });

        log::info!("[surface] created {}", handle);
        self.emit(SurfaceEvent::Created(handle));
        handle
    }

    /// Platform callback: the current surface changed size
    pub fn surface_changed(&mut self, size: SurfaceSize) -> Option<SurfaceHandle> {
        let Some(current) = self.current.as_mut() else {
            log::warn!("[surface] size change {}x{} without a surface, ignored", size.width, size.height);
            return None;
        };
        current.size = Some(size);
        let handle = current.handle;

        log::info!("[surface] {} changed to {}x{}", handle, size.width, size.height);
        self.emit(SurfaceEvent::Changed(handle, size));
        Some(handle)
    }

    /// Platform callback: the current surface is about to be destroyed.
    /// Returns after the listener has stopped using it.
    pub fn surface_destroyed(&mut self) -> Option<SurfaceHandle> {
        let Some(current) = self.current.take() else {
            log::warn!("[surface] destroy without a surface, ignored");
            return None;
        };

        log::info!("[surface] destroying {}", current.handle);
        self.emit(SurfaceEvent::Destroyed(current.handle));
        Some(current.handle)
    }

    /// Destroy whatever surface is current; used on abrupt host teardown
    pub fn teardown(&mut self) {
        if self.current.is_some() {
            self.surface_destroyed();
        }
    }

    fn emit(&self, event: SurfaceEvent) {
        match &self.listener {
            Some(listener) => listener.on_surface_event(event),
            None => log::debug!("[surface] no listener for {:?}", event),
        }
    }
}

impl Default for SurfaceLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SurfaceLifecycleManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<SurfaceEvent>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<SurfaceEvent> {
            self.events.lock().clone()
        }
    }

    impl SurfaceListener for RecordingListener {
        fn on_surface_event(&self, event: SurfaceEvent) {
            self.events.lock().push(event);
        }
    }

    /// Every Changed/Destroyed must follow a Created for the same handle
    fn assert_well_ordered(events: &[SurfaceEvent]) {
        let mut live = HashSet::new();
        for event in events {
            match event {
                SurfaceEvent::Created(h) => {
                    assert!(live.insert(*h), "double create of {}", h);
                }
                SurfaceEvent::Changed(h, _) => assert!(live.contains(h), "change before create: {}", h),
                SurfaceEvent::Destroyed(h) => {
                    assert!(live.remove(h), "destroy before create: {}", h);
                }
            }
        }
    }

    #[test]
    fn test_create_change_destroy() {
        let listener = Arc::new(RecordingListener::default());
        let mut manager = SurfaceLifecycleManager::new();
        manager.set_listener(listener.clone());

        let handle = manager.surface_created(0xdead);
        assert_eq!(manager.current(), Some(handle));
        assert_eq!(manager.surface_changed(SurfaceSize::new(1280, 720)), Some(handle));
        assert_eq!(manager.current_size(), Some(SurfaceSize::new(1280, 720)));
        assert_eq!(manager.surface_destroyed(), Some(handle));
        assert_eq!(manager.current(), None);

        assert_eq!(
            listener.events(),
            vec![
                SurfaceEvent::Created(handle),
                SurfaceEvent::Changed(handle, SurfaceSize::new(1280, 720)),
                SurfaceEvent::Destroyed(handle),
            ]
        );
    }

    #[test]
    fn test_events_without_surface_are_dropped() {
        let listener = Arc::new(RecordingListener::default());
        let mut manager = SurfaceLifecycleManager::new();
        manager.set_listener(listener.clone());

        assert_eq!(manager.surface_changed(SurfaceSize::new(10, 10)), None);
        assert_eq!(manager.surface_destroyed(), None);
        assert!(listener.events().is_empty());
    }

    #[test]
    fn test_recreate_destroys_previous_first() {
        let listener = Arc::new(RecordingListener::default());
        let mut manager = SurfaceLifecycleManager::new();
        manager.set_listener(listener.clone());

        let first = manager.surface_created(0x1000);
        // Same native window address, new instance
        let second = manager.surface_created(0x1000);
        assert_ne!(first, second);

        assert_eq!(
            listener.events(),
            vec![
                SurfaceEvent::Created(first),
                SurfaceEvent::Destroyed(first),
                SurfaceEvent::Created(second),
            ]
        );
    }

    #[test]
    fn test_new_listener_gets_replay() {
        let first_listener = Arc::new(RecordingListener::default());
        let second_listener = Arc::new(RecordingListener::default());
        let mut manager = SurfaceLifecycleManager::new();
        manager.set_listener(first_listener.clone());

        let handle = manager.surface_created(0x2000);
        manager.surface_changed(SurfaceSize::new(640, 480));

        assert!(manager.set_listener(second_listener.clone()).is_some());
        manager.surface_destroyed();

        assert_eq!(
            first_listener.events(),
            vec![
                SurfaceEvent::Created(handle),
                SurfaceEvent::Changed(handle, SurfaceSize::new(640, 480)),
                SurfaceEvent::Destroyed(handle),
            ]
        );
        assert_eq!(
            second_listener.events(),
            vec![
                SurfaceEvent::Created(handle),
                SurfaceEvent::Changed(handle, SurfaceSize::new(640, 480)),
                SurfaceEvent::Destroyed(handle),
            ]
        );
    }

    #[test]
    fn test_cleared_listener_sees_destroy() {
        let listener = Arc::new(RecordingListener::default());
        let mut manager = SurfaceLifecycleManager::new();
        manager.set_listener(listener.clone());

        let handle = manager.surface_created(0x4000);
        assert!(manager.clear_listener().is_some());
        manager.surface_destroyed();

        let events = listener.events();
        assert_well_ordered(&events);
        assert_eq!(
            events,
            vec![SurfaceEvent::Created(handle), SurfaceEvent::Destroyed(handle)]
        );
    }

    #[test]
    fn test_drop_delivers_destroy() {
        let listener = Arc::new(RecordingListener::default());
        let handle = {
            let mut manager = SurfaceLifecycleManager::new();
            manager.set_listener(listener.clone());
            manager.surface_created(0x3000)
        };

        assert_eq!(listener.events().last(), Some(&SurfaceEvent::Destroyed(handle)));
    }

    #[test]
    fn test_ordering_under_arbitrary_callbacks() {
        let listener = Arc::new(RecordingListener::default());
        let mut manager = SurfaceLifecycleManager::new();
        manager.set_listener(listener.clone());

        // Deterministic pseudo-random platform callback sequence
        let mut seed = 0x2545_f491_u64;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            match seed % 4 {
                0 => {
                    manager.surface_created(seed & 0xffff);
                }
                1 => {
                    manager.surface_changed(SurfaceSize::new((seed % 1920) as u32, (seed % 1080) as u32));
                }
                2 => {
                    manager.surface_destroyed();
                }
                _ => manager.teardown(),
            }
        }
        manager.teardown();

        let events = listener.events();
        assert_well_ordered(&events);
        let creates = events.iter().filter(|e| matches!(e, SurfaceEvent::Created(_))).count();
        let destroys = events.iter().filter(|e| matches!(e, SurfaceEvent::Destroyed(_))).count();
        assert_eq!(creates, destroys);
    }
}
