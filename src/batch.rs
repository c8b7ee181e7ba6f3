//! Turns one uploaded archive into parsed LAB files.
//!
//! Password resolution is all-or-nothing for the archive, but members are
//! independent afterwards: a LAB file without any patient block is
//! reported and the rest of the batch still goes through.

use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::archive::{ExtractLimits, MemberEntry, PasswordCandidates, extract_archive};
use crate::error::ArchiveError;
use crate::lab::{LabParse, parse_lab};

/// Default member extension, matched case-insensitively.
pub const LAB_EXTENSION: &str = "lab";

/// A member that decoded and parsed.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedMember {
    pub path: String,
    /// Decoded file text, kept for downstream storage
    #[serde(skip)]
    pub text: String,
    #[serde(flatten)]
    pub parse: LabParse,
    /// Member-level warnings, e.g. a text encoding fallback
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// A member that matched the filter but could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberFailure {
    pub path: String,
    pub reason: String,
}

/// Result of processing one archive, members in archive order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: Vec<ProcessedMember>,
    /// Members without the expected extension
    pub ignored: Vec<String>,
    pub failed: Vec<MemberFailure>,
}

impl BatchReport {
    pub fn block_count(&self) -> usize {
        self.processed.iter().map(|m| m.parse.blocks.len()).sum()
    }
}

/// Whether `path` ends in `.{extension}`, ignoring case.
pub fn has_extension(path: &str, extension: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}

/// Decode member bytes as UTF-8, falling back to Latin-1.
///
/// Some vendors still write ISO-8859-1 (`Ñ` as a single 0xD1 byte). Every
/// byte is a valid Latin-1 code point, so the fallback never fails and
/// keeps names intact. Returns the text and, for the fallback, a note.
pub fn decode_member_text(data: Vec<u8>) -> (String, Option<String>) {
    match String::from_utf8(data) {
        Ok(text) => (text, None),
        Err(e) => {
            let note = format!("not valid UTF-8 ({}), decoded as Latin-1", e.utf8_error());
            let text = e.into_bytes().into_iter().map(char::from).collect();
            (text, Some(note))
        }
    }
}

/// Decode and parse already extracted members.
pub fn process_members(members: Vec<MemberEntry>, extension: &str) -> BatchReport {
    let mut report = BatchReport::default();

    for MemberEntry { path, data } in members {
        if !has_extension(&path, extension) {
            report.ignored.push(path);
            continue;
        }

        let (text, decode_note) = decode_member_text(data);
        if let Some(note) = &decode_note {
            warn!(%path, "{note}");
        }

        let parse = parse_lab(&text);
        if parse.blocks.is_empty() {
            warn!(%path, "no patient blocks found");
            report.failed.push(MemberFailure {
                path,
                reason: "no patient blocks found".to_string(),
            });
            continue;
        }

        report.processed.push(ProcessedMember {
            path,
            text,
            parse,
            notes: decode_note.into_iter().collect(),
        });
    }

    info!(
        processed = report.processed.len(),
        ignored = report.ignored.len(),
        failed = report.failed.len(),
        blocks = report.block_count(),
        "batch processed"
    );
    report
}

/// Extract an archive and parse every member with the given extension.
pub fn process_archive(
    bytes: &[u8],
    declared_format: &str,
    candidates: &PasswordCandidates,
    limits: &ExtractLimits,
    extension: &str,
) -> Result<BatchReport, ArchiveError> {
    let members = extract_archive(bytes, declared_format, candidates, limits)?;
    Ok(process_members(members, extension))
}
