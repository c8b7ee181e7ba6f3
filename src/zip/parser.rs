//! Structural ZIP parser over an in-memory archive.
//!
//! This module reads the archive's table of contents exactly once and
//! never touches entry payloads, so it succeeds for password-protected
//! archives without knowing the password.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the buffer's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all entries
//! 4. For extraction, read each entry's Local File Header to locate its data

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use anyhow::{Context, Result, bail};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: usize = 65535;

/// Table of contents of an archive held in memory.
///
/// ## Example
///
/// ```ignore
/// let index = ZipIndex::open(&bytes)?;
/// for entry in index.entries() {
///     let payload = index.raw_payload(entry)?;
///     // decrypt / inflate payload...
/// }
/// ```
pub struct ZipIndex<'a> {
    /// The whole archive
    data: &'a [u8],
    /// Central directory entries in archive order
    entries: Vec<ZipFileEntry>,
}

impl<'a> ZipIndex<'a> {
    /// Parse the archive structure.
    ///
    /// # Errors
    ///
    /// Returns an error if no valid EOCD can be found, the archive spans
    /// several disks, or the central directory is truncated or malformed.
    pub fn open(data: &'a [u8]) -> Result<Self> {
        let (eocd, eocd_offset) = find_eocd(data)?;
        if eocd.is_multi_disk() {
            bail!("Multi-disk archives are not supported");
        }

        // Get Central Directory info, using ZIP64 if needed
        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = read_zip64_eocd(data, eocd_offset)?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        let cd_data = slice_at(data, cd_offset, cd_size).context("Central Directory out of bounds")?;

        // Every header is at least CDFH_MIN_SIZE bytes, which caps the count we trust
        if total_entries > (cd_data.len() / CDFH_MIN_SIZE) as u64 {
            bail!("Central Directory entry count exceeds its size");
        }

        let mut entries = Vec::with_capacity(total_entries as usize);
        let mut cursor = Cursor::new(cd_data);
        for _ in 0..total_entries {
            entries.push(parse_cdfh(&mut cursor)?);
        }

        Ok(Self { data, entries })
    }

    /// All entries, directories included, in central directory order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// The stored (possibly encrypted and compressed) bytes of an entry.
    ///
    /// The Local File Header has variable-length fields (filename, extra
    /// field) that may differ from the Central Directory entry, so it is
    /// read to find where the data begins.
    pub fn raw_payload(&self, entry: &ZipFileEntry) -> Result<&'a [u8]> {
        let lfh = slice_at(self.data, entry.lfh_offset, LFH_SIZE as u64)
            .context("Local File Header out of bounds")?;

        // Verify LFH signature (PK\x03\x04)
        if &lfh[0..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header");
        }

        let mut cursor = Cursor::new(lfh);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        // Data starts after: LFH (30 bytes) + filename + extra field
        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        slice_at(self.data, data_offset, entry.compressed_size)
            .with_context(|| format!("Data of {} is truncated", entry.file_name))
    }
}

/// Bounds-checked sub-slice.
fn slice_at(data: &[u8], offset: u64, len: u64) -> Result<&[u8]> {
    let start = usize::try_from(offset)?;
    let end = start
        .checked_add(usize::try_from(len)?)
        .filter(|end| *end <= data.len());
    match end {
        Some(end) => Ok(&data[start..end]),
        None => bail!("Unexpected end of archive"),
    }
}

/// Find and parse the End of Central Directory record.
///
/// Handles both the simple case (no comment) and archives with comments
/// by searching backwards for the signature.
fn find_eocd(data: &[u8]) -> Result<(EndOfCentralDirectory, u64)> {
    if data.len() < EndOfCentralDirectory::SIZE {
        bail!("Not a valid ZIP file");
    }

    // First try the simple case where there's no comment
    let offset = data.len() - EndOfCentralDirectory::SIZE;
    let tail = &data[offset..];
    if &tail[0..4] == EndOfCentralDirectory::SIGNATURE && &tail[20..22] == b"\x00\x00" {
        let eocd = EndOfCentralDirectory::from_bytes(tail)?;
        return Ok((eocd, offset as u64));
    }

    // The EOCD could be earlier if there's a ZIP comment
    let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE).min(data.len());
    let search_start = data.len() - search_size;
    let buf = &data[search_start..];

    // Search backwards for EOCD signature (PK\x05\x06)
    for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
        if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
            // The comment length field should match the remaining bytes
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, (search_start + i) as u64));
            }
        }
    }

    bail!("Not a valid ZIP file")
}

/// Read the ZIP64 End of Central Directory record.
///
/// The ZIP64 EOCD Locator sits immediately before the regular EOCD.
fn read_zip64_eocd(data: &[u8], eocd_offset: u64) -> Result<Zip64EOCD> {
    let locator_offset = eocd_offset
        .checked_sub(Zip64EOCDLocator::SIZE as u64)
        .context("Invalid ZIP64 format")?;
    let locator = Zip64EOCDLocator::from_bytes(slice_at(
        data,
        locator_offset,
        Zip64EOCDLocator::SIZE as u64,
    )?)?;

    Zip64EOCD::from_bytes(slice_at(
        data,
        locator.eocd64_offset,
        Zip64EOCD::MIN_SIZE as u64,
    )?)
}

/// Parse a Central Directory File Header from a cursor.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    // Read and verify the signature (PK\x01\x02)
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        bail!("Invalid Central Directory File Header");
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    // Lossy: lab vendors still ship CP437/Latin-1 names
    let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

    // Directory entries end with '/'
    let is_directory = file_name.ends_with('/');

    // ZIP64 uses extra field ID 0x0001
    let extra_field_end = cursor.position() + extra_field_length as u64;

    while cursor.position() + 4 <= extra_field_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()?;
        let field_end = cursor.position() + field_size as u64;

        if header_id == 0x0001 {
            // Fields are present only if corresponding header field is 0xFFFFFFFF
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                lfh_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end);
    }

    // Skip over the file comment too
    cursor.set_position(extra_field_end + file_comment_length as u64);
    if cursor.position() > cursor.get_ref().len() as u64 {
        bail!("Invalid Central Directory File Header");
    }

    Ok(ZipFileEntry {
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        flags,
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        last_mod_time,
        is_directory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::testing::ZipBuilder;

    #[test]
    fn test_open_lists_entries_in_order() {
        let bytes = ZipBuilder::new()
            .stored("first.lab", b"A1\\P1\\LAB")
            .directory("nested/")
            .deflated("nested/second.txt", b"hello hello hello")
            .finish();

        let index = ZipIndex::open(&bytes).expect("valid archive");
        let names: Vec<_> = index.entries().iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["first.lab", "nested/", "nested/second.txt"]);
        assert!(index.entries()[1].is_directory);
        assert_eq!(index.entries()[2].compression_method, CompressionMethod::Deflate);
    }

    #[test]
    fn test_open_finds_eocd_behind_comment() {
        let bytes = ZipBuilder::new()
            .stored("a.lab", b"data")
            .comment(b"exported by lab vendor")
            .finish();

        let index = ZipIndex::open(&bytes).expect("valid archive");
        assert_eq!(index.entries().len(), 1);
        assert_eq!(index.raw_payload(&index.entries()[0]).expect("payload"), b"data");
    }

    #[test]
    fn test_open_rejects_non_archive() {
        let err = ZipIndex::open(b"A1\\P001\\LAB01\r\nA2\\DOE\\JOHN").err();
        assert!(err.is_some_and(|e| e.to_string().contains("Not a valid ZIP file")));
    }

    #[test]
    fn test_open_rejects_empty_buffer() {
        assert!(ZipIndex::open(&[]).is_err());
    }

    #[test]
    fn test_open_reads_zip64_records() {
        let bytes = ZipBuilder::new()
            .zip64()
            .stored("a.lab", b"A1\\P1\\LAB")
            .deflated("b.lab", b"L1\\P1\\GLU\\Glucose\\\\\\\\95")
            .finish();

        // Classic EOCD only carries sentinels
        let tail = &bytes[bytes.len() - EndOfCentralDirectory::SIZE..];
        assert!(EndOfCentralDirectory::from_bytes(tail).expect("eocd").is_zip64());

        let index = ZipIndex::open(&bytes).expect("valid zip64 archive");
        let entries = index.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].uncompressed_size, 9);
        assert_eq!(entries[0].compressed_size, 9);
        assert_eq!(entries[0].lfh_offset, 0);
        assert!(entries[1].lfh_offset > 0);
        assert_eq!(entries[1].compression_method, CompressionMethod::Deflate);

        // The local header carries a ZIP64 extra field that has to be skipped
        assert_eq!(index.raw_payload(&entries[0]).expect("payload"), b"A1\\P1\\LAB");
    }

    #[test]
    fn test_open_rejects_multi_disk_archive() {
        let mut bytes = ZipBuilder::new().stored("a.lab", b"data").finish();
        let eocd_offset = bytes.len() - EndOfCentralDirectory::SIZE;
        bytes[eocd_offset + 4] = 1; // number of this disk

        let err = ZipIndex::open(&bytes).err().expect("split archive");
        assert!(err.to_string().contains("Multi-disk"));
    }

    #[test]
    fn test_raw_payload_rejects_truncated_data() {
        let mut bytes = ZipBuilder::new().stored("a.lab", b"0123456789").finish();
        let index = ZipIndex::open(&bytes).expect("valid archive");
        let mut entry = index.entries()[0].clone();
        entry.compressed_size = bytes.len() as u64;
        assert!(index.raw_payload(&entry).is_err());

        // Corrupting the local header signature is reported too
        bytes[0] = b'X';
        let index = ZipIndex::open(&bytes).expect("central directory still intact");
        let err = index.raw_payload(&index.entries()[0]).expect_err("bad local header");
        assert!(err.to_string().contains("Invalid Local File Header"));
    }
}
