//! The core, UI-agnostic library for the `trackr` floppy toolkit.
//!
//! `trackr-core` is designed to be used as a library by any front-end,
//! whether it's a command-line interface (like `trackr`) or a graphical
//! user interface. It handles the track-granular mechanics of imaging,
//! copying, verifying and formatting Amiga DD floppies: 160 tracks of
//! 5632 bytes, always transferred whole and in ascending order.
//!
//! The library is structured into several key modules:
//! - [`geometry`]: The fixed DD disk geometry every operation assumes.
//! - [`device`]: The [`device::TrackDevice`] session contract, the real
//!   [`device::FloppyDevice`] and the RAM-backed
//!   [`device::MemoryDevice`] loopback.
//! - [`transfer`]: Whole-disk passes — write, verify, two-drive copy and
//!   the single-drive swap copy via a RAM image.
//! - [`mod@read`] / [`mod@write`]: The ADF image codec, moving tracks
//!   between a drive and a flat image file.
//! - [`crc32`]: The streaming checksum used to fingerprint images.
//! - [`format`]: The quick/full/deep format orchestrator.
//!
//! Every operation reports progress as `(done, total)` pairs and emits
//! human-readable lines through a log callback, so the calling
//! application can display both in any way it chooses.
//!
//! ## Example: copying a disk between two drives
//!
//! ```
//! use trackr_core::device::MemoryDevice;
//! use trackr_core::transfer;
//!
//! let mut src = MemoryDevice::filled(0xDB);
//! let mut dst = MemoryDevice::new();
//!
//! transfer::copy_two_drives(
//!     &mut src,
//!     &mut dst,
//!     |done, total| assert!(done <= total),
//!     |line| println!("{line}"),
//! )?;
//!
//! assert_eq!(src.data(), dst.data());
//! # Ok::<(), trackr_core::error::DiskError>(())
//! ```

pub mod crc32;
pub mod device;
pub mod error;
pub mod format;
pub mod geometry;
pub mod platform;
pub mod read;
pub mod transfer;
pub mod write;
