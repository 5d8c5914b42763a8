// Player configuration

use glmedia_resolver::ResolverConfig;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub resolver: ResolverConfig,
    /// Resolver worker threads are named `<prefix>-<generation>`
    pub worker_name_prefix: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            worker_name_prefix: "glmedia-resolve".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Defaults with streamed copies going to `cache_dir`
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            resolver: ResolverConfig::with_scratch_dir(cache_dir),
            ..Self::default()
        }
    }
}
