//! In-memory archive writer for tests.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::Crc;
use flate2::write::DeflateEncoder;
use std::io::Write;

use super::crypto;
use super::structures::{
    CDFH_SIGNATURE, EndOfCentralDirectory, LFH_SIGNATURE, Zip64EOCD, Zip64EOCDLocator, flags,
};

const MOD_TIME: u16 = 0x6B2A;
const MOD_DATE: u16 = 0x5A73;

struct Pending {
    name: String,
    method: u16,
    flags: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    lfh_offset: u32,
}

/// Builds a ZIP archive entry by entry.
///
/// `password`, `data_descriptor` and `method` apply to every entry added
/// after them.
pub struct ZipBuilder {
    out: Vec<u8>,
    entries: Vec<Pending>,
    password: Option<Vec<u8>>,
    data_descriptor: bool,
    method_override: Option<u16>,
    zip64: bool,
    comment: Vec<u8>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            entries: Vec::new(),
            password: None,
            data_descriptor: false,
            method_override: None,
            zip64: false,
            comment: Vec::new(),
        }
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.as_bytes().to_vec());
        self
    }

    pub fn data_descriptor(mut self) -> Self {
        self.data_descriptor = true;
        self
    }

    /// Record `method` in the headers while storing the bytes as given.
    pub fn method(mut self, method: u16) -> Self {
        self.method_override = Some(method);
        self
    }

    /// Write ZIP64 records: 0xFFFF/0xFFFFFFFF sentinels in the classic
    /// fields, 0x0001 extra fields and a ZIP64 EOCD with its locator.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.add(name, data, 0, data.to_vec())
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).expect("in-memory write");
        let compressed = encoder.finish().expect("in-memory write");
        self.add(name, data, 8, compressed)
    }

    pub fn directory(mut self, name: &str) -> Self {
        let saved = self.password.take();
        self = self.add(name, b"", 0, Vec::new());
        self.password = saved;
        self
    }

    fn add(mut self, name: &str, plain: &[u8], method: u16, mut stored: Vec<u8>) -> Self {
        let mut crc = Crc::new();
        crc.update(plain);
        let crc32 = crc.sum();

        let mut entry_flags = 0;
        if self.data_descriptor {
            entry_flags |= flags::DATA_DESCRIPTOR;
        }
        if let Some(password) = &self.password {
            entry_flags |= flags::ENCRYPTED;
            let check = if self.data_descriptor {
                (MOD_TIME >> 8) as u8
            } else {
                (crc32 >> 24) as u8
            };
            stored = crypto::encrypt(password, &stored, check, [0x5A; crypto::HEADER_LEN - 1]);
        }

        let pending = Pending {
            name: name.to_string(),
            method: self.method_override.unwrap_or(method),
            flags: entry_flags,
            crc32,
            compressed_size: stored.len() as u32,
            uncompressed_size: plain.len() as u32,
            lfh_offset: self.out.len() as u32,
        };

        // Streaming writers leave CRC and sizes zero in the local header
        let (lfh_crc, lfh_csize, lfh_usize) = if self.data_descriptor {
            (0, 0, 0)
        } else if self.zip64 {
            (pending.crc32, 0xFFFF_FFFF, 0xFFFF_FFFF)
        } else {
            (pending.crc32, pending.compressed_size, pending.uncompressed_size)
        };
        // Local ZIP64 extra carries both sizes
        let lfh_extra_len: u16 = if self.zip64 { 4 + 16 } else { 0 };

        let out = &mut self.out;
        out.extend_from_slice(LFH_SIGNATURE);
        out.write_u16::<LittleEndian>(20).unwrap();
        out.write_u16::<LittleEndian>(pending.flags).unwrap();
        out.write_u16::<LittleEndian>(pending.method).unwrap();
        out.write_u16::<LittleEndian>(MOD_TIME).unwrap();
        out.write_u16::<LittleEndian>(MOD_DATE).unwrap();
        out.write_u32::<LittleEndian>(lfh_crc).unwrap();
        out.write_u32::<LittleEndian>(lfh_csize).unwrap();
        out.write_u32::<LittleEndian>(lfh_usize).unwrap();
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(lfh_extra_len).unwrap();
        out.extend_from_slice(name.as_bytes());
        if self.zip64 {
            out.write_u16::<LittleEndian>(0x0001).unwrap();
            out.write_u16::<LittleEndian>(16).unwrap();
            out.write_u64::<LittleEndian>(pending.uncompressed_size as u64).unwrap();
            out.write_u64::<LittleEndian>(pending.compressed_size as u64).unwrap();
        }
        out.extend_from_slice(&stored);

        if self.data_descriptor {
            out.extend_from_slice(b"PK\x07\x08");
            out.write_u32::<LittleEndian>(pending.crc32).unwrap();
            out.write_u32::<LittleEndian>(pending.compressed_size).unwrap();
            out.write_u32::<LittleEndian>(pending.uncompressed_size).unwrap();
        }

        self.entries.push(pending);
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        let cd_offset = self.out.len() as u32;
        let out = &mut self.out;

        let zip64 = self.zip64;
        let version = if zip64 { 45 } else { 20 };
        let wide = |v: u32| if zip64 { 0xFFFF_FFFF } else { v };

        for e in &self.entries {
            out.extend_from_slice(CDFH_SIGNATURE);
            out.write_u16::<LittleEndian>(version).unwrap();
            out.write_u16::<LittleEndian>(version).unwrap();
            out.write_u16::<LittleEndian>(e.flags).unwrap();
            out.write_u16::<LittleEndian>(e.method).unwrap();
            out.write_u16::<LittleEndian>(MOD_TIME).unwrap();
            out.write_u16::<LittleEndian>(MOD_DATE).unwrap();
            out.write_u32::<LittleEndian>(e.crc32).unwrap();
            out.write_u32::<LittleEndian>(wide(e.compressed_size)).unwrap();
            out.write_u32::<LittleEndian>(wide(e.uncompressed_size)).unwrap();
            out.write_u16::<LittleEndian>(e.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(if zip64 { 4 + 24 } else { 0 }).unwrap(); // extra
            out.write_u16::<LittleEndian>(0).unwrap(); // comment
            out.write_u16::<LittleEndian>(0).unwrap(); // disk
            out.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
            out.write_u32::<LittleEndian>(0).unwrap(); // external attrs
            out.write_u32::<LittleEndian>(wide(e.lfh_offset)).unwrap();
            out.extend_from_slice(e.name.as_bytes());
            if zip64 {
                // Order is fixed: uncompressed, compressed, local header offset
                out.write_u16::<LittleEndian>(0x0001).unwrap();
                out.write_u16::<LittleEndian>(24).unwrap();
                out.write_u64::<LittleEndian>(e.uncompressed_size as u64).unwrap();
                out.write_u64::<LittleEndian>(e.compressed_size as u64).unwrap();
                out.write_u64::<LittleEndian>(e.lfh_offset as u64).unwrap();
            }
        }

        let cd_size = out.len() as u32 - cd_offset;
        let count = self.entries.len() as u16;

        if zip64 {
            let eocd64_offset = out.len() as u64;
            out.extend_from_slice(Zip64EOCD::SIGNATURE);
            out.write_u64::<LittleEndian>(Zip64EOCD::MIN_SIZE as u64 - 12).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(count as u64).unwrap();
            out.write_u64::<LittleEndian>(count as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_size as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_offset as u64).unwrap();

            out.extend_from_slice(Zip64EOCDLocator::SIGNATURE);
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(eocd64_offset).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();
        }

        out.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(if zip64 { 0xFFFF } else { count }).unwrap();
        out.write_u16::<LittleEndian>(if zip64 { 0xFFFF } else { count }).unwrap();
        out.write_u32::<LittleEndian>(wide(cd_size)).unwrap();
        out.write_u32::<LittleEndian>(wide(cd_offset)).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.extend_from_slice(&self.comment);

        self.out
    }
}
