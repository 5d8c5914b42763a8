// Playback engine state management

use crate::error::{MediaError, Result};
use crate::media::SurfaceSize;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    /// No surface, no source
    Idle,
    /// A surface is bound, no source yet
    SurfaceBound,
    /// Source validated, native pipeline loading
    SourceReady,
    /// Source loaded; renders as soon as a surface is bound
    Prepared,
    /// Frames are being decoded and presented
    Playing,
    /// Playback paused (by the user or by surface loss)
    Paused,
    /// Terminal; all native resources freed
    Released,
}

impl PlayerState {
    /// Whether a source is loaded in this state
    pub fn has_source(self) -> bool {
        matches!(
            self,
            PlayerState::Prepared | PlayerState::Playing | PlayerState::Paused
        )
    }

    /// Stable integer for the C/JNI boundary
    pub fn code(self) -> i32 {
        match self {
            PlayerState::Idle => 0,
            PlayerState::SurfaceBound => 1,
            PlayerState::SourceReady => 2,
            PlayerState::Prepared => 3,
            PlayerState::Playing => 4,
            PlayerState::Paused => 5,
            PlayerState::Released => 6,
        }
    }

    /// Validate a transition against the engine's state machine
    pub fn validate_transition(self, to: PlayerState) -> Result<()> {
        match (self, to) {
            // Anything but a released engine may be released
            (from, PlayerState::Released) if from != PlayerState::Released => Ok(()),

            // From Idle
            (PlayerState::Idle, PlayerState::SurfaceBound) => Ok(()),
            (PlayerState::Idle, PlayerState::SourceReady) => Ok(()),

            // From SurfaceBound
            (PlayerState::SurfaceBound, PlayerState::Idle) => Ok(()), // surface lost
            (PlayerState::SurfaceBound, PlayerState::SourceReady) => Ok(()),

            // From SourceReady
            (PlayerState::SourceReady, PlayerState::Prepared) => Ok(()),

            // From Prepared
            (PlayerState::Prepared, PlayerState::Playing) => Ok(()),
            (PlayerState::Prepared, PlayerState::SourceReady) => Ok(()), // re-prepare

            // From Playing
            (PlayerState::Playing, PlayerState::Paused) => Ok(()),
            (PlayerState::Playing, PlayerState::SourceReady) => Ok(()),

            // From Paused
            (PlayerState::Paused, PlayerState::Playing) => Ok(()),
            (PlayerState::Paused, PlayerState::SourceReady) => Ok(()),

            // Invalid transitions
            (from, to) => Err(MediaError::InvalidState(format!(
                "Invalid state transition from {:?} to {:?}",
                from, to
            ))),
        }
    }
}

/// Rendering status information
#[derive(Debug, Clone, Default)]
pub struct PlaybackStatus {
    /// Whether frames are currently allowed onto a live surface
    pub rendering: bool,
    /// Last known size of the bound surface
    pub surface_size: Option<SurfaceSize>,
    /// Path of the prepared source
    pub source_path: Option<PathBuf>,
    /// Length of the prepared source in bytes
    pub source_length: u64,
}

/// Thread-safe player state container.
///
/// The engine is the only writer; hosts read it without going through the
/// command stream.
#[derive(Clone)]
pub struct PlayerStateContainer {
    state: Arc<RwLock<PlayerState>>,
    status: Arc<RwLock<PlaybackStatus>>,
}

impl PlayerStateContainer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(PlayerState::Idle)),
            status: Arc::new(RwLock::new(PlaybackStatus::default())),
        }
    }

    pub fn get_state(&self) -> PlayerState {
        *self.state.read()
    }

    /// Move to `to`, returning the previous state. Same-state is a no-op.
    pub fn transition(&self, to: PlayerState) -> Result<PlayerState> {
        let mut state = self.state.write();
        let from = *state;
        if from == to {
            return Ok(from);
        }
        from.validate_transition(to)?;
        *state = to;
        log::debug!("Player state changed: {:?} -> {:?}", from, to);
        Ok(from)
    }

    /// Overwrite the state without validation (used when a fresh engine adopts the container)
    pub fn reset(&self, state: PlayerState) {
        *self.state.write() = state;
        *self.status.write() = PlaybackStatus::default();
    }

    pub fn get_status(&self) -> PlaybackStatus {
        self.status.read().clone()
    }

    pub fn update_status<F>(&self, f: F)
    where
        F: FnOnce(&mut PlaybackStatus),
    {
        let mut status = self.status.write();
        f(&mut status);
    }
}

impl Default for PlayerStateContainer {
    fn default() -> Self {
        Self::new()
    }
}
