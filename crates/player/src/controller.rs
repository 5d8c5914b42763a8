// Controller: single command stream sequencing picks, surface events and
// playback commands onto the engine.

use crate::command::Command;
use crossbeam_channel::{Receiver, Sender};
use glmedia_core::{
    CallbackEvent, CallbackManager, MediaError, MediaReference, PlayerState, PlayerStateContainer,
    ResolvedSource, Result, SurfaceHandle, SurfaceSize,
};
use glmedia_engine::PlaybackEngine;
use glmedia_renderer_api::RendererFactory;
use glmedia_resolver::SourceResolver;
use glmedia_surface::SurfaceEvent;
use std::sync::Arc;
use std::thread;

/// Owns the engine and everything that decides what it is told.
///
/// Runs on exactly one thread; results of background resolution come back as
/// commands, so engine state is only ever touched here.
pub(crate) struct Controller {
    resolver: Arc<SourceResolver>,
    factory: Arc<dyn RendererFactory>,
    state_container: PlayerStateContainer,
    callback_manager: CallbackManager,
    engine: PlaybackEngine,
    /// Feeds resolution results back onto the stream
    sender: Sender<Command>,
    worker_name_prefix: String,
    /// Bumped by every pick and by release; results of older generations are stale
    generation: u64,
    /// At most one queued playback request
    pending_playback: bool,
    surface: Option<SurfaceHandle>,
    surface_size: Option<SurfaceSize>,
    torn_down: bool,
}

impl Controller {
    pub(crate) fn new(
        resolver: Arc<SourceResolver>,
        factory: Arc<dyn RendererFactory>,
        state_container: PlayerStateContainer,
        callback_manager: CallbackManager,
        sender: Sender<Command>,
        worker_name_prefix: String,
    ) -> Self {
        let engine = PlaybackEngine::new(
            factory.clone(),
            state_container.clone(),
            callback_manager.clone(),
        );
        Self {
            resolver,
            factory,
            state_container,
            callback_manager,
            engine,
            sender,
            worker_name_prefix,
            generation: 0,
            pending_playback: false,
            surface: None,
            surface_size: None,
            torn_down: false,
        }
    }

    /// Drain the stream until teardown
    pub(crate) fn run(mut self, receiver: Receiver<Command>) {
        log::info!("[controller] command stream started");
        for command in receiver.iter() {
            if !self.handle(command) {
                break;
            }
        }
        self.teardown();
        // Unblock anyone still waiting on a reply
        for command in receiver.try_iter() {
            log::debug!("[controller] dropping {} after teardown", command.name());
        }
        log::info!("[controller] command stream stopped");
    }

    /// Apply one command; false ends the stream
    pub(crate) fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::PickAndPrepare(reference) => self.pick_and_prepare(reference),
            Command::Resolved {
                generation,
                reference,
                result,
            } => self.on_resolved(generation, reference, result),
            Command::Playback => self.playback(),
            Command::Pause => self.pause(),
            Command::Release => self.release(),
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::Surface { event, ack } => {
                self.on_surface_event(event);
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            Command::PurgeCache(reply) => {
                let _ = reply.send(self.purge_cache());
            }
            Command::Teardown => return false,
        }
        true
    }

    fn pick_and_prepare(&mut self, reference: MediaReference) {
        if self.engine.state() == PlayerState::Released {
            self.restart_session();
        }

        self.generation += 1;
        let generation = self.generation;
        let reference_id = reference.id();
        log::info!("[controller] resolving {} (generation {})", reference, generation);

        let resolver = self.resolver.clone();
        let sender = self.sender.clone();
        let name = format!("{}-{}", self.worker_name_prefix, generation);
        let spawned = thread::Builder::new().name(name).spawn(move || {
            let result = resolver.resolve(&reference);
            // Stream gone means the player was torn down meanwhile
            let _ = sender.send(Command::Resolved {
                generation,
                reference,
                result,
            });
        });

        if let Err(e) = spawned {
            log::error!("[controller] failed to spawn resolver worker: {}", e);
            self.callback_manager.dispatch_event(CallbackEvent::SourceFailed {
                reference_id,
                error: MediaError::ThreadError(e.to_string()),
            });
        }
    }

    fn on_resolved(&mut self, generation: u64, reference: MediaReference, result: Result<ResolvedSource>) {
        // From here on the engine's source is what keeps a copy from a purge
        if let Ok(source) = &result {
            self.resolver.settle(source);
        }

        if generation != self.generation {
            log::info!(
                "[controller] dropping stale resolution of {} (generation {}, current {})",
                reference,
                generation,
                self.generation
            );
            return;
        }

        let source = match result {
            Ok(source) => source,
            Err(error) => {
                // Resolver errors are ordinary outcomes of a bad pick
                if error.is_resolver_error() {
                    log::warn!("[controller] failed to resolve {}: {}", reference, error);
                } else {
                    log::error!("[controller] failed to resolve {}: {}", reference, error);
                }
                self.callback_manager.dispatch_event(CallbackEvent::SourceFailed {
                    reference_id: reference.id(),
                    error,
                });
                return;
            }
        };

        self.callback_manager.dispatch_event(CallbackEvent::SourceResolved {
            reference_id: reference.id(),
            path: source.path().to_path_buf(),
            length: source.length(),
        });

        if let Err(error) = self.engine.prepare(source) {
            log::error!("[controller] failed to prepare {}: {}", reference, error);
            self.callback_manager.dispatch_event(CallbackEvent::SourceFailed {
                reference_id: reference.id(),
                error,
            });
            return;
        }

        self.replay_pending();
    }

    fn playback(&mut self) {
        if self.engine.state() == PlayerState::Released {
            self.reject("playback", MediaError::Released);
            return;
        }

        if self.ready_to_play() {
            self.pending_playback = false;
            if let Err(e) = self.engine.playback() {
                self.reject("playback", e);
            }
        } else {
            log::info!(
                "[controller] playback queued (source: {}, surface: {})",
                self.engine.state().has_source(),
                self.surface.is_some()
            );
            self.pending_playback = true;
        }
    }

    fn pause(&mut self) {
        self.pending_playback = false;
        if let Err(e) = self.engine.pause() {
            self.reject("pause", e);
        }
    }

    fn release(&mut self) {
        if self.pending_playback {
            log::info!("[controller] release drops queued playback");
        }
        self.pending_playback = false;
        // In-flight resolution results become stale
        self.generation += 1;
        self.engine.release();
    }

    /// Host became visible again
    fn start(&mut self) {
        log::info!("[controller] start");
        self.replay_pending();
    }

    /// Host went to the background: pause, remembering to resume
    fn stop(&mut self) {
        log::info!("[controller] stop");
        let was_playing =
            self.engine.state() == PlayerState::Playing || self.engine.resume_pending();
        if was_playing {
            self.pending_playback = true;
            if let Err(e) = self.engine.pause() {
                self.reject("stop", e);
            }
        }
    }

    fn on_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Created(handle) => {
                self.surface = Some(handle);
                self.surface_size = None;
                if self.engine.state() != PlayerState::Released {
                    if let Err(e) = self.engine.bind_surface(handle) {
                        self.report_error(format!("bind {} failed: {}", handle, e));
                    }
                }
                self.replay_pending();
            }
            SurfaceEvent::Changed(handle, size) => {
                if self.surface != Some(handle) {
                    log::debug!("[controller] ignoring resize of stale {}", handle);
                    return;
                }
                self.surface_size = Some(size);
                if self.engine.state() != PlayerState::Released {
                    if let Err(e) = self.engine.resize(handle, size) {
                        self.report_error(format!("resize {} failed: {}", handle, e));
                    }
                }
            }
            SurfaceEvent::Destroyed(handle) => {
                if self.surface == Some(handle) {
                    self.surface = None;
                    self.surface_size = None;
                }
                if self.engine.state() != PlayerState::Released {
                    if let Err(e) = self.engine.unbind_surface(handle) {
                        self.report_error(format!("unbind {} failed: {}", handle, e));
                    }
                }
            }
        }
    }

    fn purge_cache(&self) -> Result<usize> {
        let protected: Vec<&std::path::Path> =
            self.engine.source().map(|s| s.path()).into_iter().collect();
        let removed = self.resolver.sweep_scratch(&protected)?;
        log::info!("[controller] purged {} cached copies", removed);
        Ok(removed)
    }

    /// Release exactly once and stop accepting work
    pub(crate) fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        log::info!("[controller] teardown");
        self.release();
    }

    fn ready_to_play(&self) -> bool {
        self.engine.state().has_source() && self.surface.is_some() && self.engine.surface().is_some()
    }

    fn replay_pending(&mut self) {
        if !self.pending_playback || !self.ready_to_play() {
            return;
        }
        log::info!("[controller] replaying queued playback");
        self.pending_playback = false;
        if let Err(e) = self.engine.playback() {
            self.reject("playback", e);
        }
    }

    /// Fresh engine after release; adopts the live surface
    fn restart_session(&mut self) {
        log::info!("[controller] starting new playback session");
        self.engine = PlaybackEngine::new(
            self.factory.clone(),
            self.state_container.clone(),
            self.callback_manager.clone(),
        );
        if let Some(handle) = self.surface {
            if let Err(e) = self.engine.bind_surface(handle) {
                self.report_error(format!("rebind {} failed: {}", handle, e));
                return;
            }
            if let Some(size) = self.surface_size {
                if let Err(e) = self.engine.resize(handle, size) {
                    self.report_error(format!("resize {} failed: {}", handle, e));
                }
            }
        }
    }

    fn reject(&self, command: &'static str, reason: MediaError) {
        log::warn!("[controller] {} rejected: {}", command, reason);
        self.callback_manager
            .dispatch_event(CallbackEvent::CommandRejected { command, reason });
    }

    fn report_error(&self, message: String) {
        log::error!("[controller] {}", message);
        self.callback_manager
            .dispatch_event(CallbackEvent::Error { message });
    }

    #[cfg(test)]
    pub(crate) fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    #[cfg(test)]
    pub(crate) fn pending_playback(&self) -> bool {
        self.pending_playback
    }
}
