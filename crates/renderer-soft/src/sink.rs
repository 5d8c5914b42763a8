// Frame sinks: where presented frames go

use glmedia_core::SurfaceHandle;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Stats reporting window
const STATS_INTERVAL: Duration = Duration::from_secs(3);

/// One presented frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Frame number since load
    pub index: u64,
    /// Byte offset of the frame in the source
    pub offset: u64,
    /// Bytes consumed by the frame
    pub len: usize,
}

/// Destination of presented frames.
/// Called on the render thread; must not block.
pub trait FrameSink: Send + Sync {
    fn present(&self, surface: SurfaceHandle, frame: &FrameInfo);
}

/// Sink that only reports render statistics
pub struct StatsSink {
    window: Mutex<(Instant, u32)>,
}

impl StatsSink {
    pub fn new() -> Self {
        Self {
            window: Mutex::new((Instant::now(), 0)),
        }
    }
}

impl Default for StatsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for StatsSink {
    fn present(&self, surface: SurfaceHandle, _frame: &FrameInfo) {
        let mut window = self.window.lock();
        window.1 += 1;
        let elapsed = window.0.elapsed();
        if elapsed >= STATS_INTERVAL {
            let secs = elapsed.as_secs_f32();
            log::info!(
                "[render] {}: {} frames / {:.1}s ({:.2} fps)",
                surface,
                window.1,
                secs,
                window.1 as f32 / secs
            );
            *window = (Instant::now(), 0);
        }
    }
}

/// Sink that keeps every presented frame in memory
pub struct FrameLog {
    frames: Mutex<Vec<(SurfaceHandle, FrameInfo)>>,
    presented: Condvar,
}

impl FrameLog {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            presented: Condvar::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn frames_for(&self, surface: SurfaceHandle) -> Vec<FrameInfo> {
        self.frames
            .lock()
            .iter()
            .filter(|(s, _)| *s == surface)
            .map(|(_, f)| *f)
            .collect()
    }

    /// Block until at least `count` frames in total were presented.
    /// Returns false on timeout.
    pub fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut frames = self.frames.lock();
        while frames.len() < count {
            if self.presented.wait_until(&mut frames, deadline).timed_out() {
                return frames.len() >= count;
            }
        }
        true
    }
}

impl Default for FrameLog {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for FrameLog {
    fn present(&self, surface: SurfaceHandle, frame: &FrameInfo) {
        self.frames.lock().push((surface, *frame));
        self.presented.notify_all();
    }
}
