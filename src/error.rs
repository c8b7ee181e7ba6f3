//! Error types returned by the library.

use std::fmt;
use thiserror::Error;

/// Why a single entry could not be decoded with a given password.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("wrong password")]
    WrongPassword,

    #[error("unsupported compression method: {0}")]
    UnsupportedMethod(u16),

    #[error("unsupported encryption (AES or strong encryption)")]
    UnsupportedEncryption,

    #[error("malformed entry: {0}")]
    Malformed(String),

    #[error("inflate failed: {0}")]
    Inflate(#[source] std::io::Error),

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("CRC-32 mismatch: expected {expected:08x}, got {actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("entry exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
}

/// What went wrong during one step of the password loop.
#[derive(Debug)]
pub enum FailureKind {
    /// The archive's table of contents could not be parsed. Recorded once,
    /// before any password is tried.
    Structure(String),
    /// An entry failed to decode; the whole attempt was discarded.
    Entry { path: String, error: EntryError },
}

/// One failed step of the password loop.
#[derive(Debug)]
pub struct AttemptFailure {
    /// Position in the normalized candidate list (0 is the empty password);
    /// `None` for a structural failure.
    pub candidate: Option<usize>,
    pub kind: FailureKind,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.candidate, &self.kind) {
            (_, FailureKind::Structure(msg)) => write!(f, "archive structure: {msg}"),
            (Some(i), FailureKind::Entry { path, error }) => {
                write!(f, "candidate #{i}: {path}: {error}")
            }
            (None, FailureKind::Entry { path, error }) => write!(f, "{path}: {error}"),
        }
    }
}

/// Terminal failure of the archive extraction engine.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unsupported archive format: {0:?}")]
    UnsupportedFormat(String),

    /// Every candidate failed, or the archive could not be opened at all.
    #[error("incorrect password or corrupt file")]
    Exhausted { attempts: Vec<AttemptFailure> },
}

impl ArchiveError {
    /// Per-attempt detail behind an [`ArchiveError::Exhausted`].
    pub fn attempts(&self) -> &[AttemptFailure] {
        match self {
            ArchiveError::UnsupportedFormat(_) => &[],
            ArchiveError::Exhausted { attempts } => attempts.as_slice(),
        }
    }

    /// True when the archive opened fine and every attempt died on the
    /// password check, i.e. the credentials are wrong rather than the data.
    pub fn is_wrong_password(&self) -> bool {
        let attempts = self.attempts();
        !attempts.is_empty()
            && attempts.iter().all(|a| {
                matches!(
                    a.kind,
                    FailureKind::Entry {
                        error: EntryError::WrongPassword,
                        ..
                    }
                )
            })
    }

    /// True when the buffer is not a readable archive at all.
    pub fn is_structural(&self) -> bool {
        self.attempts()
            .iter()
            .any(|a| matches!(a.kind, FailureKind::Structure(_)))
    }
}

/// Failure to obtain the archive bytes.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request failed with status: {0}")]
    Status(reqwest::StatusCode),

    #[error("max retries exceeded after {0} attempts")]
    RetriesExceeded(u32),
}
