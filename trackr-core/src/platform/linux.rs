use std::io;
use std::os::unix::io::RawFd;
use std::path::PathBuf;

use crate::device::DriveUnit;
use crate::geometry::HEADS;

// Floppy driver ioctls from <linux/fd.h>.
nix::ioctl_none!(fd_fmt_beg, 0x02, 0x47);
nix::ioctl_write_ptr!(fd_fmt_trk, 0x02, 0x48, FormatDescr);
nix::ioctl_none!(fd_fmt_end, 0x02, 0x49);
nix::ioctl_none!(fd_flush, 0x02, 0x4b);

/// Mirror of the kernel's `struct format_descr`.
#[repr(C)]
pub struct FormatDescr {
    pub device: u32,
    pub head: u32,
    pub track: u32,
}

/// The block-device path for a drive unit (`/dev/fd0` .. `/dev/fd3`).
pub fn drive_path(unit: DriveUnit) -> PathBuf {
    PathBuf::from(format!("/dev/fd{}", unit.index()))
}

/// Scans for floppy drive nodes present on this system.
pub fn list_drives() -> Vec<DriveUnit> {
    DriveUnit::all()
        .filter(|unit| drive_path(*unit).exists())
        .collect()
}

/// Flushes the driver's buffers for an open drive. Used on session
/// release in place of an explicit motor-off command, which the kernel
/// driver does not expose.
pub fn flush(fd: RawFd) -> io::Result<()> {
    unsafe { fd_flush(fd) }.map(drop).map_err(io::Error::from)
}

/// Low-level formats one linear track via `FDFMTBEG`/`FDFMTTRK`/`FDFMTEND`.
///
/// Returns `ENOTTY` when the node is not a floppy driver device, which the
/// caller maps to an unsupported-command error.
pub fn format_track(fd: RawFd, track: u32) -> io::Result<()> {
    let descr = FormatDescr {
        device: 0,
        head: track % HEADS as u32,
        track: track / HEADS as u32,
    };

    unsafe { fd_fmt_beg(fd) }.map_err(io::Error::from)?;
    let formatted = unsafe { fd_fmt_trk(fd, &descr) };
    // End the format session even when the track itself failed.
    let ended = unsafe { fd_fmt_end(fd) };
    formatted.map_err(io::Error::from)?;
    ended.map_err(io::Error::from)?;
    Ok(())
}
