// Content provider fed by the host: per-URI DATA path and/or an owned descriptor

use glmedia_core::MediaReference;
use glmedia_resolver::ContentProvider;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Debug, Default)]
struct HostContent {
    data_path: Option<PathBuf>,
    /// Detached descriptor owned by us once registered
    fd: Option<i32>,
}

/// What the host's content resolver told us about each picked URI
#[derive(Debug, Default)]
pub struct HostContentProvider {
    entries: Mutex<HashMap<String, HostContent>>,
}

impl HostContentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what the host knows about `uri`.
    ///
    /// `fd`, when given, must be a descriptor the host has detached and no
    /// longer closes itself; it is closed here once consumed or replaced.
    pub fn register(&self, uri: &str, data_path: Option<PathBuf>, fd: Option<i32>) {
        let previous = self.entries.lock().insert(
            uri.to_string(),
            HostContent { data_path, fd },
        );
        if let Some(stale) = previous.and_then(|p| p.fd) {
            close_fd(stale);
        }
    }

    fn take_fd(&self, uri: &str) -> Option<i32> {
        self.entries.lock().get_mut(uri).and_then(|entry| entry.fd.take())
    }
}

impl ContentProvider for HostContentProvider {
    fn query_data_path(&self, reference: &MediaReference) -> Option<PathBuf> {
        self.entries
            .lock()
            .get(reference.uri())
            .and_then(|entry| entry.data_path.clone())
            .or_else(|| reference.as_local_path())
    }

    fn open_stream(&self, reference: &MediaReference) -> io::Result<Box<dyn Read + Send>> {
        if let Some(fd) = self.take_fd(reference.uri()) {
            return Ok(Box::new(file_from_fd(fd)?));
        }
        let path = reference.as_local_path().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no descriptor or local file for {}", reference.uri()),
            )
        })?;
        Ok(Box::new(File::open(path)?))
    }
}

impl Drop for HostContentProvider {
    fn drop(&mut self) {
        for (_, entry) in self.entries.lock().drain() {
            if let Some(fd) = entry.fd {
                close_fd(fd);
            }
        }
    }
}

#[cfg(unix)]
fn file_from_fd(fd: i32) -> io::Result<File> {
    use std::os::unix::io::FromRawFd;
    if fd < 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid descriptor"));
    }
    // SAFETY: register() takes ownership of the detached descriptor and take_fd() hands it out once
    Ok(unsafe { File::from_raw_fd(fd) })
}

#[cfg(not(unix))]
fn file_from_fd(_fd: i32) -> io::Result<File> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "descriptors are not supported on this platform",
    ))
}

fn close_fd(fd: i32) {
    // Dropping the File closes it
    let _ = file_from_fd(fd);
}
