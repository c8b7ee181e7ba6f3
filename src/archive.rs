//! Archive extraction engine.
//!
//! Opens an archive once, then walks an ordered list of candidate
//! passwords. Each attempt decodes every file entry with one password and
//! is all-or-nothing: the first attempt where every entry decodes wins,
//! and nothing from a failed attempt survives into the next.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::{ArchiveError, AttemptFailure, EntryError, FailureKind};
use crate::zip::{ZipFileEntry, ZipIndex, read_entry};

/// Container formats the engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
}

impl ArchiveFormat {
    /// Interpret a caller-declared format: an extension (`zip`, `.zip`) or
    /// a MIME type, case-insensitive.
    pub fn from_declared(declared: &str) -> Result<Self, ArchiveError> {
        match declared.trim().to_ascii_lowercase().as_str() {
            "zip" | ".zip" | "application/zip" | "application/x-zip-compressed" => {
                Ok(ArchiveFormat::Zip)
            }
            _ => Err(ArchiveError::UnsupportedFormat(declared.to_string())),
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_declared(s)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::Zip => f.write_str("zip"),
        }
    }
}

/// Ordered, de-duplicated password candidates.
///
/// The empty password always comes first, whether or not the caller
/// supplied it; later duplicates are dropped keeping first-seen order.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordCandidates(Vec<String>);

impl PasswordCandidates {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = vec![String::new()];
        for candidate in candidates {
            let candidate = candidate.into();
            if !list.contains(&candidate) {
                list.push(candidate);
            }
        }
        Self(list)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for PasswordCandidates {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl<S: Into<String>> FromIterator<S> for PasswordCandidates {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

// Never print the passwords themselves
impl fmt::Debug for PasswordCandidates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCandidates")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Memory bounds for decoding untrusted archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    pub max_entry_size: u64,
    pub max_total_size: u64,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_entry_size: 256 * 1024 * 1024,
            max_total_size: 1024 * 1024 * 1024,
        }
    }
}

/// One decoded file from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    /// Path relative to the archive root
    pub path: String,
    pub data: Vec<u8>,
}

/// Decode every file entry with a single password.
///
/// Pure with respect to its inputs: a failure returns the first failing
/// entry's path and reason and drops whatever was decoded before it.
pub fn attempt_with_password(
    index: &ZipIndex<'_>,
    password: &str,
    limits: &ExtractLimits,
) -> Result<Vec<MemberEntry>, (String, EntryError)> {
    let mut members = Vec::new();
    let mut total = 0u64;

    for entry in index.entries().iter().filter(|e| !e.is_directory) {
        let data = read_entry(index, entry, password.as_bytes(), limits.max_entry_size)
            .map_err(|e| (entry.file_name.clone(), e))?;

        total += data.len() as u64;
        if total > limits.max_total_size {
            return Err((
                entry.file_name.clone(),
                EntryError::TooLarge {
                    limit: limits.max_total_size,
                },
            ));
        }

        members.push(MemberEntry {
            path: entry.file_name.clone(),
            data,
        });
    }

    Ok(members)
}

/// Extract all file entries from an archive.
///
/// # Errors
///
/// - [`ArchiveError::UnsupportedFormat`] when `declared_format` is not a
///   supported container, before anything is parsed.
/// - [`ArchiveError::Exhausted`] when the archive cannot be opened or no
///   candidate decodes every entry.
pub fn extract_archive(
    bytes: &[u8],
    declared_format: &str,
    candidates: &PasswordCandidates,
    limits: &ExtractLimits,
) -> Result<Vec<MemberEntry>, ArchiveError> {
    ArchiveFormat::from_declared(declared_format)?;

    let index = match ZipIndex::open(bytes) {
        Ok(index) => index,
        Err(e) => {
            debug!("archive structure unreadable: {e}");
            return Err(ArchiveError::Exhausted {
                attempts: vec![AttemptFailure {
                    candidate: None,
                    kind: FailureKind::Structure(e.to_string()),
                }],
            });
        }
    };

    let mut attempts = Vec::new();
    for (i, password) in candidates.iter().enumerate() {
        match attempt_with_password(&index, password, limits) {
            Ok(members) => {
                info!(
                    candidate = i,
                    members = members.len(),
                    "archive extracted"
                );
                return Ok(members);
            }
            Err((path, error)) => {
                debug!(candidate = i, %path, %error, "password attempt failed");
                attempts.push(AttemptFailure {
                    candidate: Some(i),
                    kind: FailureKind::Entry { path, error },
                });
            }
        }
    }

    Err(ArchiveError::Exhausted { attempts })
}

/// List entries without decoding any payload.
pub fn list_members(bytes: &[u8], declared_format: &str) -> Result<Vec<ZipFileEntry>, ArchiveError> {
    ArchiveFormat::from_declared(declared_format)?;
    ZipIndex::open(bytes)
        .map(|index| index.entries().to_vec())
        .map_err(|e| ArchiveError::Exhausted {
            attempts: vec![AttemptFailure {
                candidate: None,
                kind: FailureKind::Structure(e.to_string()),
            }],
        })
}
