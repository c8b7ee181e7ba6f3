use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;

use crate::error::EntryError;

use super::crypto;
use super::parser::ZipIndex;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Decode one entry fully into memory.
///
/// The password is only consulted for encrypted entries. The result is
/// checked against the declared size and CRC-32, so a payload that
/// survives the one-byte password check with the wrong key still fails.
pub fn read_entry(
    index: &ZipIndex<'_>,
    entry: &ZipFileEntry,
    password: &[u8],
    max_size: u64,
) -> Result<Vec<u8>, EntryError> {
    if entry.compression_method == CompressionMethod::Aes || entry.uses_strong_encryption() {
        return Err(EntryError::UnsupportedEncryption);
    }
    if !matches!(
        entry.compression_method,
        CompressionMethod::Stored | CompressionMethod::Deflate
    ) {
        return Err(EntryError::UnsupportedMethod(entry.compression_method.as_u16()));
    }
    if entry.uncompressed_size > max_size {
        return Err(EntryError::TooLarge { limit: max_size });
    }

    let raw = index
        .raw_payload(entry)
        .map_err(|e| EntryError::Malformed(e.to_string()))?;

    let decrypted;
    let stored: &[u8] = if entry.is_encrypted() {
        decrypted = crypto::decrypt(password, raw, entry.password_check_byte())
            .ok_or(EntryError::WrongPassword)?;
        &decrypted
    } else {
        raw
    };

    let data = match entry.compression_method {
        CompressionMethod::Deflate => inflate(stored, entry.uncompressed_size)?,
        _ => stored.to_vec(),
    };

    if data.len() as u64 != entry.uncompressed_size {
        return Err(EntryError::SizeMismatch {
            expected: entry.uncompressed_size,
            actual: data.len() as u64,
        });
    }

    let mut crc = Crc::new();
    crc.update(&data);
    if crc.sum() != entry.crc32 {
        return Err(EntryError::CrcMismatch {
            expected: entry.crc32,
            actual: crc.sum(),
        });
    }

    Ok(data)
}

/// Inflate a raw DEFLATE stream, reading at most one byte past `expected`
/// so an oversized stream is caught without materializing it.
fn inflate(stored: &[u8], expected: u64) -> Result<Vec<u8>, EntryError> {
    let mut out = Vec::with_capacity(expected.min(1 << 20) as usize);
    DeflateDecoder::new(stored)
        .take(expected.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(EntryError::Inflate)?;
    Ok(out)
}
