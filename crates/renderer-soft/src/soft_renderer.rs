// Render thread driving frame delivery for one loaded source

use crate::sink::{FrameInfo, FrameSink};
use glmedia_core::{MediaError, Result, SurfaceHandle, SurfaceSize};
use glmedia_renderer_api::{NativeRenderer, PlaybackControl, RenderSpec, RendererFactory};
use parking_lot::{Condvar, Mutex};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;
use std::thread;

/// State shared with the render thread
#[derive(Debug, Default)]
struct RenderControl {
    surface: Option<SurfaceHandle>,
    size: Option<SurfaceSize>,
    playing: bool,
    finished: bool,
    exit: bool,
}

impl RenderControl {
    fn can_present(&self) -> bool {
        self.playing && self.surface.is_some() && !self.finished
    }
}

struct Shared {
    control: Mutex<RenderControl>,
    wake: Condvar,
}

/// Software renderer.
///
/// Frames are presented while the control lock is held, so once `detach()`
/// has taken the lock and cleared the surface no frame can reach it.
pub struct SoftRenderer {
    spec: RenderSpec,
    sink: Arc<dyn FrameSink>,
    shared: Arc<Shared>,
    render_thread: Option<thread::JoinHandle<()>>,
}

impl SoftRenderer {
    pub fn new(spec: RenderSpec, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            spec,
            sink,
            shared: Arc::new(Shared {
                control: Mutex::new(RenderControl::default()),
                wake: Condvar::new(),
            }),
            render_thread: None,
        }
    }

    /// Whether the loaded source has been fully presented
    pub fn is_finished(&self) -> bool {
        self.shared.control.lock().finished
    }

    fn stop_render_thread(&mut self) {
        if let Some(handle) = self.render_thread.take() {
            self.shared.control.lock().exit = true;
            self.shared.wake.notify_all();
            log::info!("[render] waiting for render thread to finish");
            if handle.join().is_err() {
                log::error!("[render] render thread panicked");
            }
        }
    }

    fn render_loop(file: File, spec: RenderSpec, shared: Arc<Shared>, sink: Arc<dyn FrameSink>) {
        log::info!("[render] render loop started");
        let mut file = file;
        let mut buffer = vec![0u8; spec.frame_bytes.max(1)];
        let mut pending: Option<FrameInfo> = None;
        let mut next_index = 0u64;
        let mut offset = 0u64;

        loop {
            {
                let mut control = shared.control.lock();
                while !control.exit && !control.can_present() {
                    shared.wake.wait(&mut control);
                }
                if control.exit {
                    break;
                }
            }

            // Decode the next frame outside the lock
            if pending.is_none() {
                match read_frame(&mut file, &mut buffer) {
                    Ok(0) => {
                        log::info!("[render] end of stream after {} frames", next_index);
                        let mut control = shared.control.lock();
                        control.finished = true;
                        control.playing = false;
                        continue;
                    }
                    Ok(len) => {
                        pending = Some(FrameInfo {
                            index: next_index,
                            offset,
                            len,
                        });
                        next_index += 1;
                        offset += len as u64;
                    }
                    Err(e) => {
                        log::error!("[render] decode failed at byte {}: {}", offset, e);
                        shared.control.lock().finished = true;
                        continue;
                    }
                }
            }

            let mut control = shared.control.lock();
            if control.exit {
                break;
            }
            // Surface or play state may have changed while decoding
            if let (true, Some(surface)) = (control.can_present(), control.surface) {
                if let Some(frame) = pending.take() {
                    sink.present(surface, &frame);
                }
                // ~frame_interval pacing; pause/detach/exit wake us early
                let _ = shared.wake.wait_for(&mut control, spec.frame_interval);
            }
        }

        log::info!("[render] render loop stopped");
    }
}

fn read_frame(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match file.read(buffer) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

impl NativeRenderer for SoftRenderer {
    fn attach(&mut self, surface: SurfaceHandle) -> Result<()> {
        let mut control = self.shared.control.lock();
        if let Some(current) = control.surface {
            return Err(MediaError::NativeFailure(format!(
                "attach {} while {} is still attached",
                surface, current
            )));
        }
        control.surface = Some(surface);
        drop(control);
        self.shared.wake.notify_all();
        log::info!("[render] attached {}", surface);
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        let previous = self.shared.control.lock().surface.take();
        self.shared.wake.notify_all();
        if let Some(surface) = previous {
            log::info!("[render] detached {}", surface);
        }
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.stop_render_thread();

        let file = File::open(path)
            .map_err(|e| MediaError::NativeFailure(format!("open {}: {}", path.display(), e)))?;

        {
            let mut control = self.shared.control.lock();
            control.exit = false;
            control.playing = false;
            control.finished = false;
        }

        let spec = self.spec;
        let shared = self.shared.clone();
        let sink = self.sink.clone();
        let handle = thread::Builder::new()
            .name("glmedia-render".to_string())
            .spawn(move || Self::render_loop(file, spec, shared, sink))
            .map_err(|e| MediaError::NativeFailure(format!("spawn render thread: {}", e)))?;
        self.render_thread = Some(handle);

        log::info!("[render] loaded {}", path.display());
        Ok(())
    }

    fn control(&mut self, control: PlaybackControl) -> Result<()> {
        if self.render_thread.is_none() {
            return Err(MediaError::NativeFailure("no source loaded".to_string()));
        }
        self.shared.control.lock().playing = control == PlaybackControl::Playback;
        self.shared.wake.notify_all();
        Ok(())
    }

    fn resize(&mut self, size: SurfaceSize) -> Result<()> {
        self.shared.control.lock().size = Some(size);
        log::debug!("[render] viewport {}x{}", size.width, size.height);
        Ok(())
    }

    fn release(&mut self) {
        self.stop_render_thread();
        let mut control = self.shared.control.lock();
        control.surface = None;
        control.playing = false;
    }
}

impl Drop for SoftRenderer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Factory producing `SoftRenderer`s that present into one sink
pub struct SoftRendererFactory {
    sink: Arc<dyn FrameSink>,
    spec: RenderSpec,
}

impl SoftRendererFactory {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            sink,
            spec: RenderSpec::default(),
        }
    }

    pub fn with_spec(sink: Arc<dyn FrameSink>, spec: RenderSpec) -> Self {
        Self { sink, spec }
    }
}

impl RendererFactory for SoftRendererFactory {
    fn create_renderer(&self, spec: RenderSpec) -> Result<Box<dyn NativeRenderer>> {
        Ok(Box::new(SoftRenderer::new(spec, self.sink.clone())))
    }

    fn preferred_spec(&self) -> RenderSpec {
        self.spec
    }
}
