use std::io;

use thiserror::Error;

use crate::device::DriveUnit;

/// Result type alias for floppy operations.
pub type Result<T> = std::result::Result<T, DiskError>;

/// Errors that can occur while imaging, copying or formatting a floppy.
///
/// A declined prompt is not an error; operations that can be declined
/// return [`crate::transfer::Outcome`] instead.
#[derive(Debug, Error)]
pub enum DiskError {
    /// The drive unit could not be opened. Fatal, raised before any I/O.
    #[error("drive {unit} unavailable: {source}")]
    DeviceUnavailable {
        /// The drive that failed to open.
        unit: DriveUnit,
        /// The underlying OS error.
        source: io::Error,
    },

    /// A single track read or write failed. Aborts the enclosing pass,
    /// except in the deep-format path where it is retried and tolerated.
    #[error("i/o fault at track {track}: {source}")]
    IoFault {
        /// Linear track index of the failing transfer.
        track: u32,
        /// The underlying OS error.
        source: io::Error,
    },

    /// Image file size does not match the disk. Fatal, no drive I/O is
    /// attempted.
    #[error("invalid image size: {actual} bytes (expected 901120)")]
    InvalidSize {
        /// The size the image actually has.
        actual: u64,
    },

    /// The whole-disk RAM buffer could not be allocated.
    #[error("out of memory for disk buffer")]
    NoMemory,

    /// The drive has no native low-level track format command.
    #[error("drive does not support low-level track formatting")]
    Unsupported,

    /// Host-side image file I/O failed (create/open/read/write).
    #[error("image file error: {0}")]
    Image(#[from] io::Error),

    /// The external filesystem-format utility failed.
    #[error("filesystem installer failed: {0}")]
    Installer(String),
}
