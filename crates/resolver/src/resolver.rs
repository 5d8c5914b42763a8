// Source resolver: direct provider path first, streaming copy as fallback

use crate::copy::{copy_stream, create_destination, DEFAULT_CHUNK_SIZE};
use crate::provider::{ContentProvider, PermissionGate};
use glmedia_core::{MediaError, MediaReference, ResolvedSource, Result, SourceOrigin};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Scratch/cache directory receiving streamed copies
    pub scratch_dir: PathBuf,
    /// Copy buffer size in bytes
    pub chunk_size: usize,
    /// File name prefix of streamed copies
    pub file_prefix: String,
    /// Extension used when the reference does not carry one
    pub default_extension: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("glmedia"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            file_prefix: "video_".to_string(),
            default_extension: "mp4".to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn with_scratch_dir(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            ..Self::default()
        }
    }
}

/// Turns a `MediaReference` into a `ResolvedSource`.
///
/// `resolve` performs blocking I/O and must run off the command stream.
/// Nothing here retries; retry policy belongs to the caller.
///
/// A streamed copy is claimed from the moment its file is created until the
/// caller hands it back through `settle`; `sweep_scratch` never removes a
/// claimed copy.
pub struct SourceResolver {
    provider: Arc<dyn ContentProvider>,
    permission: Arc<dyn PermissionGate>,
    config: ResolverConfig,
    claimed: Mutex<HashSet<PathBuf>>,
}

impl SourceResolver {
    pub fn new(
        provider: Arc<dyn ContentProvider>,
        permission: Arc<dyn PermissionGate>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            provider,
            permission,
            config,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Resolve `reference` into a source that exists, is readable and non-empty
    pub fn resolve(&self, reference: &MediaReference) -> Result<ResolvedSource> {
        log::info!("[resolver] resolving {}", reference);

        if let Some(source) = self.resolve_direct(reference) {
            log::info!(
                "[resolver] direct path {} ({} bytes)",
                source.path().display(),
                source.length()
            );
            return Ok(source);
        }

        self.resolve_by_copy(reference)
    }

    fn resolve_direct(&self, reference: &MediaReference) -> Option<ResolvedSource> {
        if !self.permission.legacy_path_access() {
            log::debug!("[resolver] legacy path access denied, skipping direct lookup");
            return None;
        }

        let path = self.provider.query_data_path(reference)?;
        match ResolvedSource::probe(&path, SourceOrigin::Direct, reference.id()) {
            Ok(source) => Some(source),
            Err(e) => {
                log::info!("[resolver] direct path unusable ({}), falling back to copy", e);
                None
            }
        }
    }

    fn resolve_by_copy(&self, reference: &MediaReference) -> Result<ResolvedSource> {
        let mut stream = self
            .provider
            .open_stream(reference)
            .map_err(|e| MediaError::SourceUnreadable(format!("{}: {}", reference.uri(), e)))?;

        let extension = reference
            .extension()
            .unwrap_or_else(|| self.config.default_extension.clone());
        let (path, file) = {
            // Sweeps hold this lock, so none sees the new file unclaimed
            let mut claimed = self.claimed.lock();
            let (path, file) = create_destination(
                &self.config.scratch_dir,
                &self.config.file_prefix,
                &extension,
            )?;
            claimed.insert(path.clone());
            (path, file)
        };

        log::info!("[resolver] copying {} to {}", reference.uri(), path.display());
        let result = copy_stream(stream.as_mut(), file, &path, self.config.chunk_size).and_then(
            |copied| {
                log::info!("[resolver] copy complete: {} bytes", copied);
                ResolvedSource::probe(&path, SourceOrigin::Copied, reference.id()).map_err(|e| {
                    // Nothing usable was produced; do not leave an empty copy behind
                    if let Err(remove) = std::fs::remove_file(&path) {
                        log::warn!(
                            "[resolver] failed to discard unusable copy {}: {}",
                            path.display(),
                            remove
                        );
                    }
                    e
                })
            },
        );

        if result.is_err() {
            self.claimed.lock().remove(&path);
        }
        result
    }

    /// Hand a resolved copy back; from now on only `protected` keeps it from a sweep
    pub fn settle(&self, source: &ResolvedSource) {
        if self.claimed.lock().remove(source.path()) {
            log::debug!("[resolver] settled {}", source.path().display());
        }
    }

    /// Delete streamed copies in the scratch directory except `protected` and
    /// claimed ones. Returns the number of files removed.
    pub fn sweep_scratch(&self, protected: &[&Path]) -> Result<usize> {
        // Held for the whole sweep so no copy gets created unclaimed meanwhile
        let claimed = self.claimed.lock();
        let entries = match std::fs::read_dir(&self.config.scratch_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(MediaError::DestinationUnwritable(format!(
                    "read {}: {}",
                    self.config.scratch_dir.display(),
                    e
                )))
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_copy = entry
                .file_name()
                .to_string_lossy()
                .starts_with(&self.config.file_prefix);
            if !is_copy || !path.is_file() || protected.iter().any(|p| *p == path) {
                continue;
            }
            if claimed.contains(&path) {
                log::debug!("[resolver] keeping in-flight copy {}", path.display());
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("[resolver] failed to remove {}: {}", path.display(), e),
            }
        }

        log::info!("[resolver] swept {} cached copies", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FileSystemProvider, PermissionFlag};
    use std::io::{self, Cursor, Read, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider with no data path whose stream serves `data`, recording the largest read
    struct StreamOnlyProvider {
        data: Vec<u8>,
        data_path: Option<PathBuf>,
        max_read: Arc<AtomicUsize>,
    }

    struct RecordingReader {
        inner: Cursor<Vec<u8>>,
        max_read: Arc<AtomicUsize>,
    }

    impl Read for RecordingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.max_read.fetch_max(buf.len(), Ordering::SeqCst);
            self.inner.read(buf)
        }
    }

    impl ContentProvider for StreamOnlyProvider {
        fn query_data_path(&self, _reference: &MediaReference) -> Option<PathBuf> {
            self.data_path.clone()
        }

        fn open_stream(&self, _reference: &MediaReference) -> io::Result<Box<dyn Read + Send>> {
            Ok(Box::new(RecordingReader {
                inner: Cursor::new(self.data.clone()),
                max_read: self.max_read.clone(),
            }))
        }
    }

    struct UnreadableProvider;

    impl ContentProvider for UnreadableProvider {
        fn query_data_path(&self, _reference: &MediaReference) -> Option<PathBuf> {
            None
        }

        fn open_stream(&self, _reference: &MediaReference) -> io::Result<Box<dyn Read + Send>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "revoked"))
        }
    }

    fn stream_provider(data: Vec<u8>, data_path: Option<PathBuf>) -> (Arc<StreamOnlyProvider>, Arc<AtomicUsize>) {
        let max_read = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(StreamOnlyProvider {
            data,
            data_path,
            max_read: max_read.clone(),
        });
        (provider, max_read)
    }

    #[test]
    fn test_direct_path_used_verbatim() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![1u8; 1_048_576]).unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let resolver = SourceResolver::new(
            Arc::new(FileSystemProvider),
            Arc::new(PermissionFlag::new(true)),
            ResolverConfig::with_scratch_dir(scratch.path()),
        );
        let reference = MediaReference::new(file.path().to_string_lossy().to_string());
        let source = resolver.resolve(&reference).unwrap();

        assert_eq!(source.path(), file.path());
        assert_eq!(source.length(), 1_048_576);
        assert_eq!(source.origin(), SourceOrigin::Direct);
        assert_eq!(source.reference_id(), reference.id());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_fallback_copy_streams_in_4k_chunks() {
        let scratch = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..10_485_760u32).map(|i| (i % 253) as u8).collect();
        let (provider, max_read) = stream_provider(data.clone(), None);

        let resolver = SourceResolver::new(
            provider,
            Arc::new(PermissionFlag::new(true)),
            ResolverConfig::with_scratch_dir(scratch.path()),
        );
        let reference = MediaReference::new("content://media/external/video/media/42");
        let source = resolver.resolve(&reference).unwrap();

        assert_eq!(source.origin(), SourceOrigin::Copied);
        assert_eq!(source.length(), 10_485_760);
        assert_eq!(std::fs::metadata(source.path()).unwrap().len(), 10_485_760);
        assert!(source.path().starts_with(scratch.path()));
        assert_eq!(max_read.load(Ordering::SeqCst), 4096);
        assert_eq!(std::fs::read(source.path()).unwrap(), data);
    }

    #[test]
    fn test_stale_data_path_falls_back_to_copy() {
        let scratch = tempfile::tempdir().unwrap();
        let missing = scratch.path().join("gone.mp4");
        let (provider, _) = stream_provider(vec![9u8; 8192], Some(missing));

        let resolver = SourceResolver::new(
            provider,
            Arc::new(PermissionFlag::new(true)),
            ResolverConfig::with_scratch_dir(scratch.path().join("cache")),
        );
        let source = resolver
            .resolve(&MediaReference::new("content://media/external/video/media/5"))
            .unwrap();
        assert_eq!(source.origin(), SourceOrigin::Copied);
        assert_eq!(source.length(), 8192);
    }

    #[test]
    fn test_permission_denied_still_resolves_by_copy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not empty").unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let resolver = SourceResolver::new(
            Arc::new(FileSystemProvider),
            Arc::new(PermissionFlag::new(false)),
            ResolverConfig::with_scratch_dir(scratch.path()),
        );
        let reference = MediaReference::new(format!("file://{}", file.path().display()));
        let source = resolver.resolve(&reference).unwrap();

        assert_eq!(source.origin(), SourceOrigin::Copied);
        assert_ne!(source.path(), file.path());
        assert_eq!(std::fs::read(source.path()).unwrap(), b"not empty");
        // The original is never touched
        assert!(file.path().exists());
    }

    #[test]
    fn test_copy_keeps_reference_extension() {
        let scratch = tempfile::tempdir().unwrap();
        let (provider, _) = stream_provider(vec![1u8; 100], None);
        let resolver = SourceResolver::new(
            provider,
            Arc::new(PermissionFlag::new(false)),
            ResolverConfig::with_scratch_dir(scratch.path()),
        );

        let source = resolver
            .resolve(&MediaReference::new("content://downloads/clip.webm"))
            .unwrap();
        assert_eq!(source.path().extension().unwrap(), "webm");
    }

    #[test]
    fn test_unreadable_reference() {
        let scratch = tempfile::tempdir().unwrap();
        let resolver = SourceResolver::new(
            Arc::new(UnreadableProvider),
            Arc::new(PermissionFlag::new(true)),
            ResolverConfig::with_scratch_dir(scratch.path()),
        );

        let result = resolver.resolve(&MediaReference::new("content://media/external/video/media/1"));
        assert!(matches!(result, Err(MediaError::SourceUnreadable(_))));
    }

    #[test]
    fn test_empty_stream_is_unavailable_and_leaves_nothing() {
        let scratch = tempfile::tempdir().unwrap();
        let (provider, _) = stream_provider(Vec::new(), None);
        let resolver = SourceResolver::new(
            provider,
            Arc::new(PermissionFlag::new(true)),
            ResolverConfig::with_scratch_dir(scratch.path()),
        );

        let result = resolver.resolve(&MediaReference::new("content://media/external/video/media/2"));
        assert!(matches!(result, Err(MediaError::SourceUnavailable(_))));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_sweep_scratch_keeps_protected_copies() {
        let scratch = tempfile::tempdir().unwrap();
        let (provider, _) = stream_provider(vec![3u8; 512], None);
        let resolver = SourceResolver::new(
            provider,
            Arc::new(PermissionFlag::new(false)),
            ResolverConfig::with_scratch_dir(scratch.path()),
        );

        let first = resolver.resolve(&MediaReference::new("content://a")).unwrap();
        let second = resolver.resolve(&MediaReference::new("content://b")).unwrap();
        let unrelated = scratch.path().join("thumbnail.png");
        std::fs::write(&unrelated, b"png").unwrap();
        resolver.settle(&first);
        resolver.settle(&second);

        let removed = resolver.sweep_scratch(&[second.path()]).unwrap();
        assert_eq!(removed, 1);
        assert!(!first.path().exists());
        assert!(second.path().exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_sweep_skips_copies_until_settled() {
        let scratch = tempfile::tempdir().unwrap();
        let (provider, _) = stream_provider(vec![5u8; 512], None);
        let resolver = SourceResolver::new(
            provider,
            Arc::new(PermissionFlag::new(false)),
            ResolverConfig::with_scratch_dir(scratch.path()),
        );

        let source = resolver.resolve(&MediaReference::new("content://c")).unwrap();
        assert_eq!(resolver.sweep_scratch(&[]).unwrap(), 0);
        assert!(source.path().exists());

        resolver.settle(&source);
        assert_eq!(resolver.sweep_scratch(&[]).unwrap(), 1);
        assert!(!source.path().exists());
    }

    #[test]
    fn test_failed_copy_releases_claim() {
        let scratch = tempfile::tempdir().unwrap();
        let (provider, _) = stream_provider(Vec::new(), None);
        let resolver = SourceResolver::new(
            provider,
            Arc::new(PermissionFlag::new(false)),
            ResolverConfig::with_scratch_dir(scratch.path()),
        );

        assert!(resolver.resolve(&MediaReference::new("content://empty")).is_err());
        assert!(resolver.claimed.lock().is_empty());
    }

    #[test]
    fn test_sweep_missing_directory() {
        let scratch = tempfile::tempdir().unwrap();
        let resolver = SourceResolver::new(
            Arc::new(FileSystemProvider),
            Arc::new(PermissionFlag::new(false)),
            ResolverConfig::with_scratch_dir(scratch.path().join("never-created")),
        );
        assert_eq!(resolver.sweep_scratch(&[]).unwrap(), 0);
    }
}
