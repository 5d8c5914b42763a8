// Content provider and permission collaborators

use glmedia_core::MediaReference;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Access to the platform's content behind a `MediaReference`
pub trait ContentProvider: Send + Sync {
    /// Path recorded by the provider for this reference (the "DATA column"),
    /// if it has one. The path is not guaranteed to exist.
    fn query_data_path(&self, reference: &MediaReference) -> Option<PathBuf>;

    /// Open a readable byte stream over the referenced content
    fn open_stream(&self, reference: &MediaReference) -> io::Result<Box<dyn Read + Send>>;
}

/// Gate for legacy direct-path access (storage permission on Android)
pub trait PermissionGate: Send + Sync {
    fn legacy_path_access(&self) -> bool;
}

/// Permission grant toggled by the host once the user answers the prompt
#[derive(Debug, Default)]
pub struct PermissionFlag {
    granted: AtomicBool,
}

impl PermissionFlag {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        log::info!("[resolver] legacy path access {}", if granted { "granted" } else { "denied" });
        self.granted.store(granted, Ordering::SeqCst);
    }

    pub fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

impl PermissionGate for PermissionFlag {
    fn legacy_path_access(&self) -> bool {
        self.is_granted()
    }
}

/// Provider for references that name local files (`file://` URIs or absolute paths)
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemProvider;

impl ContentProvider for FileSystemProvider {
    fn query_data_path(&self, reference: &MediaReference) -> Option<PathBuf> {
        reference.as_local_path()
    }

    fn open_stream(&self, reference: &MediaReference) -> io::Result<Box<dyn Read + Send>> {
        let path = reference.as_local_path().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no local file behind {}", reference.uri()),
            )
        })?;
        Ok(Box::new(File::open(path)?))
    }
}
