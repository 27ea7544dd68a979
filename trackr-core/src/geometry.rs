//! The fixed geometry of an Amiga DD (880 KiB) floppy.
//!
//! Every transfer in this crate moves whole tracks at byte offset
//! `track * TRACK_SIZE`, in ascending track order. Track numbering is
//! linear: (cylinder 0, head 0), (cylinder 0, head 1), (cylinder 1,
//! head 0), and so on.

/// Number of cylinders on a DD floppy.
pub const CYLINDERS: usize = 80;

/// Number of heads (sides).
pub const HEADS: usize = 2;

/// Total linear tracks on the disk.
pub const TRACKS: usize = CYLINDERS * HEADS;

/// Sectors per track (Amiga trackdisk layout).
pub const SECTORS_PER_TRACK: usize = 11;

/// Bytes per sector.
pub const BYTES_PER_SECTOR: usize = 512;

/// Bytes per track — the unit of every device transfer.
pub const TRACK_SIZE: usize = SECTORS_PER_TRACK * BYTES_PER_SECTOR;

/// Total bytes on the disk, and the exact size of a valid ADF image.
pub const DISK_SIZE: usize = TRACKS * TRACK_SIZE;

/// Total sectors on the disk.
pub const TOTAL_SECTORS: usize = TRACKS * SECTORS_PER_TRACK;

/// Byte offset of a linear track index within the disk or an image.
pub fn track_offset(track: u32) -> u64 {
    u64::from(track) * TRACK_SIZE as u64
}
