// Error handling for source resolution and playback

use std::fmt;

/// Playback engine error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The media reference could not be opened for reading
    SourceUnreadable(String),

    /// Streaming copy failed mid-stream
    CopyFailed(String),

    /// Scratch/cache destination could not be created or written
    DestinationUnwritable(String),

    /// Resolved path does not exist, is unreadable or empty
    SourceUnavailable(String),

    /// Source failed validation when handed to the engine
    InvalidSource(String),

    /// Playback requested before a source was prepared
    NotPrepared,

    /// Engine has been released; only release() is accepted
    Released,

    /// Opaque failure reported by the native render/decode collaborator
    NativeFailure(String),

    /// Invalid state or handle
    InvalidState(String),

    /// Thread/command stream error
    ThreadError(String),

    /// Generic error
    Other(String),
}

impl MediaError {
    /// Stable status code for the C/JNI boundary. Success is 0.
    pub fn code(&self) -> i32 {
        match self {
            MediaError::SourceUnreadable(_) => -1,
            MediaError::CopyFailed(_) => -2,
            MediaError::DestinationUnwritable(_) => -3,
            MediaError::SourceUnavailable(_) => -4,
            MediaError::InvalidSource(_) => -5,
            MediaError::NotPrepared => -6,
            MediaError::Released => -7,
            MediaError::NativeFailure(_) => -8,
            MediaError::InvalidState(_) => -9,
            MediaError::ThreadError(_) => -10,
            MediaError::Other(_) => -99,
        }
    }

    /// Whether the error belongs to the resolver taxonomy
    pub fn is_resolver_error(&self) -> bool {
        matches!(
            self,
            MediaError::SourceUnreadable(_)
                | MediaError::CopyFailed(_)
                | MediaError::DestinationUnwritable(_)
                | MediaError::SourceUnavailable(_)
        )
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MediaError::SourceUnreadable(msg) => write!(f, "Source unreadable: {}", msg),
            MediaError::CopyFailed(msg) => write!(f, "Copy failed: {}", msg),
            MediaError::DestinationUnwritable(msg) => write!(f, "Destination unwritable: {}", msg),
            MediaError::SourceUnavailable(msg) => write!(f, "Source unavailable: {}", msg),
            MediaError::InvalidSource(msg) => write!(f, "Invalid source: {}", msg),
            MediaError::NotPrepared => write!(f, "Not prepared: no source has been prepared"),
            MediaError::Released => write!(f, "Engine released"),
            MediaError::NativeFailure(msg) => write!(f, "Native failure: {}", msg),
            MediaError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            MediaError::ThreadError(msg) => write!(f, "Thread error: {}", msg),
            MediaError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for MediaError {}

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            MediaError::SourceUnreadable(String::new()),
            MediaError::CopyFailed(String::new()),
            MediaError::DestinationUnwritable(String::new()),
            MediaError::SourceUnavailable(String::new()),
            MediaError::InvalidSource(String::new()),
            MediaError::NotPrepared,
            MediaError::Released,
            MediaError::NativeFailure(String::new()),
            MediaError::InvalidState(String::new()),
            MediaError::ThreadError(String::new()),
            MediaError::Other(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        assert!(codes.iter().all(|c| *c < 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_resolver_classification() {
        assert!(MediaError::CopyFailed("disk full".into()).is_resolver_error());
        assert!(MediaError::SourceUnavailable("empty".into()).is_resolver_error());
        assert!(!MediaError::InvalidSource("empty".into()).is_resolver_error());
        assert!(!MediaError::NotPrepared.is_resolver_error());
    }
}
