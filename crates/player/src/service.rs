// Host-facing player service: owns the surface lifecycle and the command thread

use crate::command::ControllerHandle;
use crate::config::PlayerConfig;
use crate::controller::Controller;
use crossbeam_channel::unbounded;
use glmedia_core::{
    CallbackManager, MediaError, MediaReference, PlaybackStatus, PlayerCallback, PlayerState,
    PlayerStateContainer, Result, SurfaceHandle, SurfaceSize,
};
use glmedia_renderer_api::RendererFactory;
use glmedia_resolver::{ContentProvider, PermissionGate, SourceResolver};
use glmedia_surface::SurfaceLifecycleManager;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// One player instance as seen by a host.
///
/// Commands are queued onto the controller's stream and return immediately;
/// outcomes arrive through callbacks and the state container. Platform
/// surface callbacks go through the surface manager, and
/// `surface_destroyed()` blocks until the engine has let go of the surface.
/// Only this player's surface calls wait on each other meanwhile.
pub struct PlayerService {
    handle: ControllerHandle,
    surfaces: Mutex<SurfaceLifecycleManager>,
    state_container: PlayerStateContainer,
    callback_manager: CallbackManager,
    command_thread: Option<thread::JoinHandle<()>>,
}

impl PlayerService {
    pub fn new(
        config: PlayerConfig,
        provider: Arc<dyn ContentProvider>,
        permission: Arc<dyn PermissionGate>,
        factory: Arc<dyn RendererFactory>,
    ) -> Result<Self> {
        log::info!(
            "[player] creating player, scratch dir {}",
            config.resolver.scratch_dir.display()
        );

        let resolver = Arc::new(SourceResolver::new(provider, permission, config.resolver));
        let state_container = PlayerStateContainer::new();
        let callback_manager = CallbackManager::new();
        let (sender, receiver) = unbounded();

        let controller = Controller::new(
            resolver,
            factory,
            state_container.clone(),
            callback_manager.clone(),
            sender.clone(),
            config.worker_name_prefix,
        );
        let command_thread = thread::Builder::new()
            .name("glmedia-command".to_string())
            .spawn(move || controller.run(receiver))
            .map_err(|e| MediaError::ThreadError(format!("spawn command stream: {}", e)))?;

        let handle = ControllerHandle::new(sender);
        let mut surfaces = SurfaceLifecycleManager::new();
        surfaces.set_listener(Arc::new(handle.clone()));

        Ok(Self {
            handle,
            surfaces: Mutex::new(surfaces),
            state_container,
            callback_manager,
            command_thread: Some(command_thread),
        })
    }

    /// Handle for posting commands from other threads
    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// Callbacks run on the command stream and must not block
    pub fn add_callback(&self, callback: Arc<dyn PlayerCallback>) {
        self.callback_manager.add_callback(callback);
    }

    pub fn get_state(&self) -> PlayerState {
        self.state_container.get_state()
    }

    pub fn get_status(&self) -> PlaybackStatus {
        self.state_container.get_status()
    }

    pub fn pick_and_prepare(&self, reference: MediaReference) -> Result<()> {
        log::info!("[player] picked {}", reference);
        self.handle.pick_and_prepare(reference)
    }

    pub fn playback(&self) -> Result<()> {
        self.handle.playback()
    }

    pub fn pause(&self) -> Result<()> {
        self.handle.pause()
    }

    pub fn release(&self) -> Result<()> {
        self.handle.release()
    }

    pub fn start(&self) -> Result<()> {
        self.handle.start()
    }

    pub fn stop(&self) -> Result<()> {
        self.handle.stop()
    }

    pub fn purge_cache(&self) -> Result<usize> {
        self.handle.purge_cache()
    }

    pub fn current_surface(&self) -> Option<SurfaceHandle> {
        self.surfaces.lock().current()
    }

    pub fn surface_created(&self, token: u64) -> SurfaceHandle {
        self.surfaces.lock().surface_created(token)
    }

    pub fn surface_changed(&self, width: u32, height: u32) -> Option<SurfaceHandle> {
        self.surfaces
            .lock()
            .surface_changed(SurfaceSize::new(width, height))
    }

    pub fn surface_destroyed(&self) -> Option<SurfaceHandle> {
        self.surfaces.lock().surface_destroyed()
    }

    /// Destroy any live surface, release exactly once and stop the command stream
    pub fn teardown(&mut self) {
        let Some(command_thread) = self.command_thread.take() else {
            return;
        };
        log::info!("[player] teardown");

        self.surfaces.get_mut().teardown();
        if let Err(e) = self.handle.teardown() {
            log::warn!("[player] {}", e);
        }
        if command_thread.join().is_err() {
            log::error!("[player] command stream panicked");
        }
        self.surfaces.get_mut().clear_listener();
    }
}

impl Drop for PlayerService {
    fn drop(&mut self) {
        self.teardown();
    }
}
