//! ZIP archive parsing and entry decoding.
//!
//! This module reads ZIP archives held fully in memory, including
//! entries protected with traditional PKWARE encryption.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: One-shot structural parse of the archive's table of contents
//! - [`crypto`]: Traditional PKWARE stream cipher
//! - [`extractor`]: Decrypt, inflate and verify a single entry
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The Central Directory is never encrypted, so the entry list is
//! available before a password is known; only payloads need one.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED and DEFLATE compression methods
//! - Traditional PKWARE encryption
//!
//! ## Limitations
//!
//! - No AES or strong encryption
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

pub mod crypto;
mod extractor;
mod parser;
mod structures;
#[cfg(test)]
pub(crate) mod testing;

pub use extractor::read_entry;
pub use parser::ZipIndex;
pub use structures::*;
