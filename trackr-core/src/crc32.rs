//! Streaming CRC32 used to fingerprint whole disk images.
//!
//! Standard reflected CRC-32 (polynomial `0xEDB88320`, initial state all
//! ones, final state inverted), computed a byte at a time. The checksum is
//! reported alongside the image size; the image format itself carries no
//! embedded integrity data.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::geometry::{DISK_SIZE, TRACK_SIZE};
use crate::write::file_size;

const POLYNOMIAL: u32 = 0xEDB8_8320;

/// Incremental CRC32 accumulator.
///
/// ```
/// use trackr_core::crc32::Crc32;
///
/// let mut crc = Crc32::new();
/// crc.update(b"123456789");
/// assert_eq!(crc.finalize(), 0xCBF4_3926);
/// ```
#[derive(Debug, Clone)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Creates a fresh accumulator.
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    /// Folds a byte slice into the running checksum.
    pub fn update(&mut self, bytes: &[u8]) {
        let mut c = self.state;
        for &byte in bytes {
            c ^= u32::from(byte);
            for _ in 0..8 {
                c = if c & 1 != 0 {
                    (c >> 1) ^ POLYNOMIAL
                } else {
                    c >> 1
                };
            }
        }
        self.state = c;
    }

    /// Consumes the accumulator and returns the final checksum.
    pub fn finalize(self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the CRC32 of an image file, streaming it track-sized chunks
/// at a time (the final chunk may be shorter).
///
/// A size other than [`DISK_SIZE`] is reported as a warning line, not an
/// error; the checksum is still computed. Progress is reported as
/// `(bytes_consumed, file_size)`.
pub fn checksum_file<P, L>(path: &Path, mut on_progress: P, mut on_log: L) -> Result<u32>
where
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    let mut file = File::open(path)?;
    let size = file_size(&mut file)?;

    on_log(&format!("Image size: {size} bytes"));
    if size != DISK_SIZE as u64 {
        on_log("Warning: size is not 901,120 bytes");
    }

    let mut crc = Crc32::new();
    let mut buf = vec![0u8; TRACK_SIZE];
    let mut consumed: u64 = 0;

    while consumed < size {
        let chunk = (size - consumed).min(TRACK_SIZE as u64) as usize;
        file.read_exact(&mut buf[..chunk])?;
        crc.update(&buf[..chunk]);
        consumed += chunk as u64;
        on_progress(consumed, size);
    }

    Ok(crc.finalize())
}
