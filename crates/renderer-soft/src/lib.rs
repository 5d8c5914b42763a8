// Software renderer: paces frames from the loaded file onto the attached surface

mod sink;
mod soft_renderer;

pub use sink::{FrameInfo, FrameLog, FrameSink, StatsSink};
pub use soft_renderer::{SoftRenderer, SoftRendererFactory};
