//! # labzip
//!
//! Reads laboratory result submissions: password-protected ZIP archives
//! that carry one or more LAB files, each a backslash-delimited list of
//! patient blocks with their analytical results.
//!
//! Two pieces do the work:
//!
//! - [`archive`]: opens the archive once and tries candidate passwords in
//!   order (the empty password first) until every entry decodes.
//! - [`lab`]: turns the text of one LAB file into [`PatientBlock`]s plus a
//!   list of diagnostics for the lines it had to skip or flag.
//!
//! [`batch`] ties them together for a whole upload.
//!
//! ## Example
//!
//! ```no_run
//! use labzip::{ExtractLimits, PasswordCandidates, process_archive};
//!
//! fn main() -> anyhow::Result<()> {
//!     let bytes = std::fs::read("results.zip")?;
//!     let candidates = PasswordCandidates::new(["center-42", "legacy"]);
//!
//!     let report = process_archive(&bytes, "zip", &candidates, &ExtractLimits::default(), "lab")?;
//!     for member in &report.processed {
//!         for block in &member.parse.blocks {
//!             println!("{}: {} results", block.protocol(), block.results.len());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod batch;
pub mod cli;
pub mod error;
pub mod lab;
pub mod source;
pub mod zip;

pub use archive::{ArchiveFormat, ExtractLimits, MemberEntry, PasswordCandidates, extract_archive};
pub use batch::{BatchReport, process_archive};
pub use cli::Cli;
pub use error::{ArchiveError, EntryError, SourceError};
pub use lab::{LabParse, PatientBlock, parse_lab};
