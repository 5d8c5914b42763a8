// Native render/decode collaborator abstraction

use glmedia_core::{Result, SurfaceHandle, SurfaceSize};
use std::path::Path;
use std::time::Duration;

/// Playback control primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackControl {
    Playback,
    Pause,
}

/// Native renderer trait
/// Platform-specific implementations (GL, software) implement this trait.
/// One instance is one decode + render resource bundle.
pub trait NativeRenderer: Send {
    /// Attach a render target. Any previous target must already be detached.
    fn attach(&mut self, surface: SurfaceHandle) -> Result<()>;

    /// Detach the current render target.
    /// Must not return until no further frame can reach the detached surface.
    fn detach(&mut self) -> Result<()>;

    /// Load the decode pipeline from a local file
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Start or pause frame delivery
    fn control(&mut self, control: PlaybackControl) -> Result<()>;

    /// Surface dimensions changed
    fn resize(&mut self, _size: SurfaceSize) -> Result<()> {
        Ok(())
    }

    /// Release all native resources. Must be safe to call more than once.
    fn release(&mut self);
}

/// Render specification for a renderer instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSpec {
    /// Time between presented frames
    pub frame_interval: Duration,
    /// Bytes of source consumed per frame
    pub frame_bytes: usize,
}

impl Default for RenderSpec {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33), // ~30fps
            frame_bytes: 64 * 1024,
        }
    }
}

/// Renderer factory trait
/// Allows creating platform-specific renderers
pub trait RendererFactory: Send + Sync {
    /// Create a new renderer with the given specification
    fn create_renderer(&self, spec: RenderSpec) -> Result<Box<dyn NativeRenderer>>;

    /// Get the preferred specification for this platform
    fn preferred_spec(&self) -> RenderSpec {
        RenderSpec::default()
    }
}
