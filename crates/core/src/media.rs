// Media references, resolved sources and surface handles

use crate::error::{MediaError, Result};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REFERENCE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for user-selected media, as produced by the picker.
///
/// Every reference gets a process-unique id at creation, so two picks of the
/// same URI are still distinct references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    id: u64,
    uri: String,
}

impl MediaReference {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            id: NEXT_REFERENCE_ID.fetch_add(1, Ordering::Relaxed),
            uri: uri.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Local path for `file://` URIs and absolute paths, `None` for provider URIs
    pub fn as_local_path(&self) -> Option<PathBuf> {
        if let Some(rest) = self.uri.strip_prefix("file://") {
            return Some(PathBuf::from(rest));
        }
        if self.uri.starts_with('/') {
            return Some(PathBuf::from(&self.uri));
        }
        None
    }

    /// Lowercased file extension of the last URI segment, if it looks like one
    pub fn extension(&self) -> Option<String> {
        let without_query = self.uri.split(['?', '#']).next().unwrap_or("");
        let segment = without_query.rsplit('/').next().unwrap_or("");
        let (stem, ext) = segment.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
            return None;
        }
        if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.uri)
    }
}

/// How a resolved source was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Path reported by the content provider, used verbatim
    Direct,
    /// Streaming copy into the scratch directory
    Copied,
}

/// Concrete, locally readable byte source derived from a `MediaReference`.
///
/// Only constructible through [`ResolvedSource::probe`], so every instance
/// existed, was readable and non-empty at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    path: PathBuf,
    length: u64,
    origin: SourceOrigin,
    reference_id: u64,
}

impl ResolvedSource {
    /// Check `path` and build a source from it
    pub fn probe(path: impl Into<PathBuf>, origin: SourceOrigin, reference_id: u64) -> Result<Self> {
        let path = path.into();
        let length = check_readable(&path).map_err(MediaError::SourceUnavailable)?;
        Ok(Self {
            path,
            length,
            origin,
            reference_id,
        })
    }

    /// Re-run the readability checks against the file as it is now
    pub fn revalidate(&self) -> Result<u64> {
        check_readable(&self.path).map_err(MediaError::InvalidSource)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn origin(&self) -> SourceOrigin {
        self.origin
    }

    /// Id of the `MediaReference` this source was resolved from
    pub fn reference_id(&self) -> u64 {
        self.reference_id
    }
}

fn check_readable(path: &Path) -> std::result::Result<u64, String> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| format!("{} does not exist: {}", path.display(), e))?;
    if !metadata.is_file() {
        return Err(format!("{} is not a regular file", path.display()));
    }
    if metadata.len() == 0 {
        return Err(format!("{} is empty", path.display()));
    }
    File::open(path).map_err(|e| format!("{} is not readable: {}", path.display(), e))?;
    Ok(metadata.len())
}

/// Opaque reference to one renderable surface instance.
///
/// `id` is assigned per `created` event and never reused; `token` is whatever
/// the platform uses to name the window (e.g. an `ANativeWindow` address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
    id: u64,
    token: u64,
}

impl SurfaceHandle {
    pub fn new(id: u64, token: u64) -> Self {
        Self { id, token }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> u64 {
        self.token
    }
}

impl fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "surface#{}({:#x})", self.id, self.token)
    }
}

/// Surface dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
