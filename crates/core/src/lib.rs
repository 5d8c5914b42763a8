// Core types and traits for the GLMedia playback surface binding engine

pub mod callback;
pub mod error;
pub mod media;
pub mod state;

// Re-export commonly used types
pub use callback::{CallbackEvent, CallbackManager, PlayerCallback};
pub use error::{MediaError, Result};
pub use media::{MediaReference, ResolvedSource, SourceOrigin, SurfaceHandle, SurfaceSize};
pub use state::{PlaybackStatus, PlayerState, PlayerStateContainer};
