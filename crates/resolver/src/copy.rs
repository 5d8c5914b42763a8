// Streaming copy of provider content into the scratch directory

use glmedia_core::{MediaError, Result};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Copy buffer size (4 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

/// Attempts at finding a free destination name before giving up
const MAX_NAME_ATTEMPTS: u32 = 64;

/// Create a new, uniquely named file `<prefix><millis>[-n].<ext>` inside `dir`
pub fn create_destination(dir: &Path, prefix: &str, extension: &str) -> Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir).map_err(|e| {
        MediaError::DestinationUnwritable(format!("create {}: {}", dir.display(), e))
    })?;

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{}{}.{}", prefix, millis, extension)
        } else {
            format!("{}{}-{}.{}", prefix, millis, attempt, extension)
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(MediaError::DestinationUnwritable(format!(
                    "create {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }

    Err(MediaError::DestinationUnwritable(format!(
        "no free file name in {} after {} attempts",
        dir.display(),
        MAX_NAME_ATTEMPTS
    )))
}

/// Copy `reader` into `file` using `chunk_size` reads until end of stream.
///
/// On failure the partially written destination at `path` is removed.
pub fn copy_stream(
    reader: &mut dyn Read,
    file: File,
    path: &Path,
    chunk_size: usize,
) -> Result<u64> {
    match copy_chunks(reader, file, chunk_size) {
        Ok(total) => Ok(total),
        Err(err) => {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("[resolver] failed to discard partial copy {}: {}", path.display(), e);
            } else {
                log::info!("[resolver] discarded partial copy {}", path.display());
            }
            Err(err)
        }
    }
}

fn copy_chunks(reader: &mut dyn Read, mut file: File, chunk_size: usize) -> Result<u64> {
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total_copied = 0u64;
    let mut last_log_mb = 0u64;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break, // EOF
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(MediaError::CopyFailed(format!(
                    "read failed after {} bytes: {}",
                    total_copied, e
                )))
            }
        };

        file.write_all(&buffer[..bytes_read]).map_err(|e| {
            MediaError::CopyFailed(format!("write failed after {} bytes: {}", total_copied, e))
        })?;

        total_copied += bytes_read as u64;

        // Log progress every MB
        let current_mb = total_copied / (1024 * 1024);
        if current_mb > last_log_mb {
            log::info!("[resolver] copied: {} MB", current_mb);
            last_log_mb = current_mb;
        }
    }

    file.flush()
        .map_err(|e| MediaError::CopyFailed(format!("flush failed: {}", e)))?;
    file.sync_all()
        .map_err(|e| MediaError::CopyFailed(format!("sync failed: {}", e)))?;

    Ok(total_copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Reader that fails after yielding `fail_after` bytes
    struct FailingReader {
        remaining: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "provider went away"));
            }
            let n = buf.len().min(self.remaining);
            buf[..n].fill(0xAB);
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_destination_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _f1) = create_destination(dir.path(), "video_", "mp4").unwrap();
        let (second, _f2) = create_destination(dir.path(), "video_", "mp4").unwrap();

        assert_ne!(first, second);
        for path in [&first, &second] {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with("video_"), "{}", name);
            assert!(name.ends_with(".mp4"), "{}", name);
        }
    }

    #[test]
    fn test_destination_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("cache").join("media");
        let (path, _file) = create_destination(&nested, "video_", "mkv").unwrap();
        assert!(path.starts_with(&nested));
    }

    #[test]
    fn test_destination_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let result = create_destination(&blocker.join("cache"), "video_", "mp4");
        assert!(matches!(result, Err(MediaError::DestinationUnwritable(_))));
    }

    #[test]
    fn test_copy_stream_copies_everything() {
        let dir = tempfile::tempdir().unwrap();
        let (path, file) = create_destination(dir.path(), "video_", "mp4").unwrap();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let copied = copy_stream(&mut Cursor::new(data.clone()), file, &path, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[test]
    fn test_failed_copy_discards_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let (path, file) = create_destination(dir.path(), "video_", "mp4").unwrap();

        let mut reader = FailingReader { remaining: 3 * DEFAULT_CHUNK_SIZE + 17 };
        let result = copy_stream(&mut reader, file, &path, DEFAULT_CHUNK_SIZE);

        assert!(matches!(result, Err(MediaError::CopyFailed(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_write_discards_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let (path, file) = create_destination(dir.path(), "video_", "mp4").unwrap();
        drop(file);
        // Writes into a handle opened for reading fail like a full disk would
        let read_only = File::open(&path).unwrap();

        let data = vec![0x5Au8; 2 * DEFAULT_CHUNK_SIZE];
        let result = copy_stream(&mut Cursor::new(data), read_only, &path, DEFAULT_CHUNK_SIZE);

        match result {
            Err(MediaError::CopyFailed(msg)) => assert!(msg.starts_with("write failed"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!path.exists());
    }
}
