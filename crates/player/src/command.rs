// Messages carried by the controller's command stream

use crossbeam_channel::{bounded, Sender};
use glmedia_core::{MediaError, MediaReference, ResolvedSource, Result};
use glmedia_surface::{SurfaceEvent, SurfaceListener};

/// One entry on the command stream
pub(crate) enum Command {
    PickAndPrepare(MediaReference),
    /// Posted exactly once by the worker resolving `generation`
    Resolved {
        generation: u64,
        reference: MediaReference,
        result: Result<ResolvedSource>,
    },
    Playback,
    Pause,
    Release,
    Start,
    Stop,
    /// `ack` is answered once the event has been fully applied
    Surface {
        event: SurfaceEvent,
        ack: Option<Sender<()>>,
    },
    PurgeCache(Sender<Result<usize>>),
    Teardown,
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::PickAndPrepare(_) => "pick_and_prepare",
            Command::Resolved { .. } => "resolved",
            Command::Playback => "playback",
            Command::Pause => "pause",
            Command::Release => "release",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Surface { .. } => "surface",
            Command::PurgeCache(_) => "purge_cache",
            Command::Teardown => "teardown",
        }
    }
}

/// Cheap, cloneable entry point into a running controller.
///
/// Also the surface listener: surface events become commands, and
/// `Destroyed` blocks until the engine has let go of the surface.
#[derive(Clone)]
pub struct ControllerHandle {
    sender: Sender<Command>,
}

impl ControllerHandle {
    pub(crate) fn new(sender: Sender<Command>) -> Self {
        Self { sender }
    }

    pub fn pick_and_prepare(&self, reference: MediaReference) -> Result<()> {
        self.send(Command::PickAndPrepare(reference))
    }

    pub fn playback(&self) -> Result<()> {
        self.send(Command::Playback)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn release(&self) -> Result<()> {
        self.send(Command::Release)
    }

    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Delete scratch copies other than the prepared source; returns how many
    pub fn purge_cache(&self) -> Result<usize> {
        let (reply, response) = bounded(1);
        self.send(Command::PurgeCache(reply))?;
        response
            .recv()
            .map_err(|_| MediaError::ThreadError("command stream stopped".to_string()))?
    }

    pub(crate) fn teardown(&self) -> Result<()> {
        self.send(Command::Teardown)
    }

    fn send(&self, command: Command) -> Result<()> {
        let name = command.name();
        self.sender.send(command).map_err(|_| {
            MediaError::ThreadError(format!("command stream stopped, {} dropped", name))
        })
    }
}

impl SurfaceListener for ControllerHandle {
    fn on_surface_event(&self, event: SurfaceEvent) {
        let handle = event.handle();
        if let SurfaceEvent::Destroyed(_) = event {
            let (ack, done) = bounded(1);
            if self
                .send(Command::Surface {
                    event,
                    ack: Some(ack),
                })
                .is_err()
            {
                log::debug!("[controller] no command stream for destroy of {}", handle);
                return;
            }
            // Disconnect means the stream ended and no longer holds the surface
            let _ = done.recv();
        } else if let Err(e) = self.send(Command::Surface { event, ack: None }) {
            log::warn!("[controller] event for {} lost: {}", handle, e);
        }
    }
}
