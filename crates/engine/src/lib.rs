// Playback engine: state machine over one native decode + render bundle.
//
// The engine only references the current surface; the surface manager owns
// it. Every transition goes through the shared PlayerStateContainer so hosts
// can query state without touching the engine.

use glmedia_core::{
    CallbackEvent, CallbackManager, MediaError, PlayerState, PlayerStateContainer, ResolvedSource,
    Result, SurfaceHandle, SurfaceSize,
};
use glmedia_renderer_api::{NativeRenderer, PlaybackControl, RendererFactory};
use std::sync::Arc;

pub struct PlaybackEngine {
    factory: Arc<dyn RendererFactory>,
    state_container: PlayerStateContainer,
    callback_manager: CallbackManager,
    /// The one native bundle; rebuilt wholesale on every prepare
    renderer: Option<Box<dyn NativeRenderer>>,
    surface: Option<SurfaceHandle>,
    surface_size: Option<SurfaceSize>,
    source: Option<ResolvedSource>,
    /// Playback was requested or interrupted without a surface; resumes on the next bind
    resume_on_bind: bool,
    rendering: bool,
    /// Terminal; the shared container may already belong to a newer engine
    released: bool,
}

impl PlaybackEngine {
    pub fn new(
        factory: Arc<dyn RendererFactory>,
        state_container: PlayerStateContainer,
        callback_manager: CallbackManager,
    ) -> Self {
        log::info!("[engine] created");
        state_container.reset(PlayerState::Idle);
        Self {
            factory,
            state_container,
            callback_manager,
            renderer: None,
            surface: None,
            surface_size: None,
            source: None,
            resume_on_bind: false,
            rendering: false,
            released: false,
        }
    }

    pub fn state(&self) -> PlayerState {
        if self.released {
            return PlayerState::Released;
        }
        self.state_container.get_state()
    }

    /// Whether frames may currently reach a live surface
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }

    /// The source currently held by the decode pipeline
    pub fn source(&self) -> Option<&ResolvedSource> {
        self.source.as_ref()
    }

    pub fn resume_pending(&self) -> bool {
        self.resume_on_bind
    }

    /// Associate the engine with a new surface.
    ///
    /// A target bound to an older handle is detached first. With a prepared
    /// source rendering goes live immediately.
    pub fn bind_surface(&mut self, handle: SurfaceHandle) -> Result<()> {
        self.ensure_live()?;

        if self.surface == Some(handle) {
            log::debug!("[engine] {} already bound", handle);
            return Ok(());
        }

        if let Some(stale) = self.surface.take() {
            log::warn!("[engine] binding {} while {} is still bound, detaching it", handle, stale);
            if self.renderer.is_some() {
                self.with_renderer("detach", |r| r.detach())?;
            }
        }

        self.surface = Some(handle);
        self.surface_size = None;
        log::info!("[engine] bound {}", handle);

        if self.renderer.is_some() {
            self.with_renderer("attach", |r| r.attach(handle))?;
        }

        match self.state() {
            PlayerState::Idle => self.set_state(PlayerState::SurfaceBound)?,
            PlayerState::Prepared | PlayerState::Paused if self.resume_on_bind => {
                log::info!("[engine] resuming playback on {}", handle);
                self.with_renderer("playback", |r| r.control(PlaybackControl::Playback))?;
                self.resume_on_bind = false;
                self.set_state(PlayerState::Playing)?;
            }
            _ => {}
        }

        self.refresh_rendering();
        Ok(())
    }

    /// The surface `handle` is about to be destroyed.
    ///
    /// Returns once the native target is torn down; no frame reaches
    /// `handle` afterwards. A handle that is not the current one is ignored.
    pub fn unbind_surface(&mut self, handle: SurfaceHandle) -> Result<()> {
        self.ensure_live()?;

        if self.surface != Some(handle) {
            log::debug!("[engine] ignoring unbind of stale {}", handle);
            return Ok(());
        }

        if self.state() == PlayerState::Playing {
            self.with_renderer("pause", |r| r.control(PlaybackControl::Pause))?;
            self.resume_on_bind = true;
            self.set_state(PlayerState::Paused)?;
            log::info!("[engine] playback paused by surface loss");
        }

        if self.renderer.is_some() {
            self.with_renderer("detach", |r| r.detach())?;
        }
        self.surface = None;
        self.surface_size = None;
        log::info!("[engine] unbound {}", handle);

        if self.state() == PlayerState::SurfaceBound {
            self.set_state(PlayerState::Idle)?;
        }

        self.refresh_rendering();
        Ok(())
    }

    /// The current surface changed size; stale handles are ignored
    pub fn resize(&mut self, handle: SurfaceHandle, size: SurfaceSize) -> Result<()> {
        self.ensure_live()?;

        if self.surface != Some(handle) {
            log::debug!("[engine] ignoring resize of stale {}", handle);
            return Ok(());
        }

        self.surface_size = Some(size);
        self.state_container
            .update_status(|status| status.surface_size = Some(size));

        if self.renderer.is_some() {
            self.with_renderer("resize", |r| r.resize(size))?;
        }
        Ok(())
    }

    /// Load `source` into a freshly built native bundle.
    ///
    /// Fails with `InvalidSource`, leaving the state untouched, when the file
    /// no longer passes the readability checks. Any previous bundle is
    /// released before the new one loads, so no frame of the old source is
    /// presented once this returns.
    pub fn prepare(&mut self, source: ResolvedSource) -> Result<()> {
        self.ensure_live()?;

        let length = source.revalidate()?;
        log::info!(
            "[engine] preparing {} ({} bytes)",
            source.path().display(),
            length
        );

        self.set_state(PlayerState::SourceReady)?;
        self.resume_on_bind = false;

        if let Some(mut previous) = self.renderer.take() {
            log::info!("[engine] discarding previous pipeline");
            previous.release();
        }
        self.source = None;
        self.refresh_rendering();

        let spec = self.factory.preferred_spec();
        let renderer = match self.factory.create_renderer(spec) {
            Ok(renderer) => renderer,
            Err(e) => return Err(self.fail_native("create", e)),
        };
        self.renderer = Some(renderer);

        let path = source.path().to_path_buf();
        self.with_renderer("load", |r| r.load(&path))?;

        if let Some(handle) = self.surface {
            self.with_renderer("attach", |r| r.attach(handle))?;
        }
        if let Some(size) = self.surface_size {
            self.with_renderer("resize", |r| r.resize(size))?;
        }

        self.state_container.update_status(|status| {
            status.source_path = Some(path.clone());
            status.source_length = length;
        });
        self.source = Some(source);

        self.set_state(PlayerState::Prepared)?;
        self.refresh_rendering();
        Ok(())
    }

    /// Start or resume playback.
    ///
    /// Already playing is a no-op. Without a bound surface the request is
    /// remembered and honoured by the next `bind_surface`.
    pub fn playback(&mut self) -> Result<()> {
        self.ensure_live()?;

        match self.state() {
            PlayerState::Playing => Ok(()),
            PlayerState::Prepared | PlayerState::Paused => {
                if self.surface.is_none() {
                    log::info!("[engine] no surface bound, playback deferred until bind");
                    self.resume_on_bind = true;
                    return Ok(());
                }
                self.with_renderer("playback", |r| r.control(PlaybackControl::Playback))?;
                self.resume_on_bind = false;
                self.set_state(PlayerState::Playing)
            }
            _ => Err(MediaError::NotPrepared),
        }
    }

    /// Pause playback; a no-op unless playing
    pub fn pause(&mut self) -> Result<()> {
        self.ensure_live()?;

        self.resume_on_bind = false;
        if self.state() != PlayerState::Playing {
            return Ok(());
        }
        self.with_renderer("pause", |r| r.control(PlaybackControl::Pause))?;
        self.set_state(PlayerState::Paused)
    }

    /// Free every native resource. Safe from any state and safe to repeat.
    pub fn release(&mut self) {
        if self.released {
            log::debug!("[engine] already released");
            return;
        }
        self.released = true;

        if let Some(mut renderer) = self.renderer.take() {
            if self.surface.is_some() {
                if let Err(e) = renderer.detach() {
                    log::warn!("[engine] detach during release failed: {}", e);
                }
            }
            renderer.release();
        }
        self.surface = None;
        self.surface_size = None;
        self.source = None;
        self.resume_on_bind = false;

        if let Err(e) = self.set_state(PlayerState::Released) {
            log::error!("[engine] release transition failed: {}", e);
        }
        self.refresh_rendering();
        self.state_container.update_status(|status| {
            status.source_path = None;
            status.source_length = 0;
            status.surface_size = None;
        });
        log::info!("[engine] released");
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released {
            return Err(MediaError::Released);
        }
        Ok(())
    }

    fn set_state(&self, to: PlayerState) -> Result<()> {
        let from = self.state_container.transition(to)?;
        if from != to {
            log::info!("[engine] {:?} -> {:?}", from, to);
            self.callback_manager.dispatch_event(CallbackEvent::StateChanged {
                old_state: from,
                new_state: to,
            });
        }
        Ok(())
    }

    fn refresh_rendering(&mut self) {
        let live = self.surface.is_some() && self.renderer.is_some() && self.state().has_source();
        if live == self.rendering {
            return;
        }
        self.rendering = live;
        self.state_container.update_status(|status| status.rendering = live);
        log::info!("[engine] rendering {}", if live { "live" } else { "stopped" });
        self.callback_manager
            .dispatch_event(CallbackEvent::RenderingChanged { live });
    }

    /// Run `f` on the native bundle; a failure ends the session through `release()`
    fn with_renderer<F>(&mut self, op: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn NativeRenderer) -> Result<()>,
    {
        let result = match self.renderer.as_deref_mut() {
            Some(renderer) => f(renderer),
            None => Err(MediaError::NativeFailure(format!("{}: no native pipeline", op))),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail_native(op, e)),
        }
    }

    fn fail_native(&mut self, op: &'static str, err: MediaError) -> MediaError {
        let err = match err {
            MediaError::NativeFailure(_) => err,
            other => MediaError::NativeFailure(other.to_string()),
        };
        log::error!("[engine] native {} failed, releasing session: {}", op, err);
        self.callback_manager.dispatch_event(CallbackEvent::Error {
            message: format!("{} failed: {}", op, err),
        });
        self.release();
        err
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.release();
    }
}
