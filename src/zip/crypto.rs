//! Traditional PKWARE encryption ("ZipCrypto").
//!
//! A weak stream cipher driven by three 32-bit keys that are updated with
//! every plaintext byte. Each encrypted entry starts with a 12-byte header
//! whose last byte doubles as a one-byte password check.

/// Length of the encryption header prepended to each entry.
pub const HEADER_LEN: usize = 12;

const CRC32_TABLE: [u32; 256] = make_crc32_table();

const fn make_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

fn crc32_step(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

/// Cipher state for one entry.
#[derive(Debug, Clone)]
pub struct ZipCryptoKeys {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl ZipCryptoKeys {
    /// Initialise the keys from a password.
    pub fn new(password: &[u8]) -> Self {
        let mut keys = Self {
            k0: 0x1234_5678,
            k1: 0x2345_6789,
            k2: 0x3456_7890,
        };
        for &b in password {
            keys.update(b);
        }
        keys
    }

    fn update(&mut self, plain: u8) {
        self.k0 = crc32_step(self.k0, plain);
        self.k1 = self
            .k1
            .wrapping_add(self.k0 & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.k2 = crc32_step(self.k2, (self.k1 >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let t = (self.k2 | 2) & 0xFFFF;
        (t.wrapping_mul(t ^ 1) >> 8) as u8
    }

    pub fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.stream_byte();
        self.update(plain);
        plain
    }

    #[cfg(test)]
    pub fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.stream_byte();
        self.update(plain);
        cipher
    }

    pub fn decrypt_in_place(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = self.decrypt_byte(*b);
        }
    }

    #[cfg(test)]
    pub fn encrypt_in_place(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = self.encrypt_byte(*b);
        }
    }
}

/// Decrypt an entry payload (header included).
///
/// Returns `None` when the header's check byte does not match `check`,
/// which is what a wrong password looks like 255 times out of 256.
pub fn decrypt(password: &[u8], payload: &[u8], check: u8) -> Option<Vec<u8>> {
    if payload.len() < HEADER_LEN {
        return None;
    }

    let mut keys = ZipCryptoKeys::new(password);
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&payload[..HEADER_LEN]);
    keys.decrypt_in_place(&mut header);
    if header[HEADER_LEN - 1] != check {
        return None;
    }

    let mut body = payload[HEADER_LEN..].to_vec();
    keys.decrypt_in_place(&mut body);
    Some(body)
}

/// Encrypt a payload, producing header + ciphertext.
///
/// `seed` fills the first eleven header bytes; real writers use random
/// bytes, any value decrypts the same.
#[cfg(test)]
pub fn encrypt(password: &[u8], plain: &[u8], check: u8, seed: [u8; HEADER_LEN - 1]) -> Vec<u8> {
    let mut keys = ZipCryptoKeys::new(password);
    let mut out = Vec::with_capacity(HEADER_LEN + plain.len());
    out.extend_from_slice(&seed);
    out.push(check);
    out.extend_from_slice(plain);
    keys.encrypt_in_place(&mut out);
    out
}
