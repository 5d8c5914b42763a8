// Player: command-stream controller wiring resolver, surface lifecycle and
// playback engine together behind one host-facing service

mod command;
mod config;
mod controller;
mod service;

pub use command::ControllerHandle;
pub use config::PlayerConfig;
pub use service::PlayerService;
