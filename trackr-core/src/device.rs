//! The device session: a scoped handle to one physical floppy drive.
//!
//! A [`FloppyDevice`] is opened when a whole-disk operation begins and
//! released (motor stopped, handle closed) when it ends, including on
//! failure paths. It is never kept across operations. All calls are
//! synchronous; the caller blocks until the drive responds or errors.
//!
//! [`MemoryDevice`] is a RAM-backed loopback implementation of the same
//! contract. It journals every command it receives, which makes it the
//! natural test double for the transfer engine and the format
//! orchestrator.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

use crate::error::{DiskError, Result};
use crate::geometry::{track_offset, DISK_SIZE, TRACK_SIZE, TRACKS};
use crate::platform;

/// A validated floppy drive index, `df0` through `df3`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DriveUnit(u8);

impl DriveUnit {
    /// Highest supported unit count (df0..df3).
    pub const COUNT: u8 = 4;

    /// Validates a raw index. Returns `None` for anything above 3.
    pub fn new(index: u8) -> Option<Self> {
        (index < Self::COUNT).then_some(Self(index))
    }

    /// The raw unit index.
    pub fn index(self) -> u8 {
        self.0
    }

    /// Iterates over every addressable unit.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self)
    }
}

impl fmt::Display for DriveUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "df{}", self.0)
    }
}

/// The commands a drive understands, tagged with their track address.
///
/// This is the wire-level shape of the session contract; the loopback
/// device journals these so tests can assert on exact command sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TdCommand {
    /// Spin the motor up or down.
    Motor(bool),
    /// Read one whole track.
    Read(u32),
    /// Write one whole track.
    Write(u32),
    /// Drive-native low-level format of one track.
    Format(u32),
}

/// One open session against a floppy drive.
///
/// Buffers passed to [`read_track`](TrackDevice::read_track) and
/// [`write_track`](TrackDevice::write_track) must be exactly one track
/// long; no partial-track I/O exists in this contract.
pub trait TrackDevice {
    /// Spins the drive motor on or off. Best-effort: a failed motor
    /// command never aborts the caller.
    fn set_motor(&mut self, on: bool);

    /// Reads the track at `track` into `buf`.
    fn read_track(&mut self, track: u32, buf: &mut [u8]) -> Result<()>;

    /// Writes `buf` to the track at `track`.
    fn write_track(&mut self, track: u32, buf: &[u8]) -> Result<()>;

    /// Issues the drive-native low-level format command for one track.
    /// Returns [`DiskError::Unsupported`] when the drive has no such
    /// command.
    fn format_track(&mut self, track: u32) -> Result<()>;
}

/// A session over a real drive, addressed through the OS block device.
pub struct FloppyDevice {
    file: File,
    unit: DriveUnit,
}

impl FloppyDevice {
    /// Opens the block device for `unit` exclusively, read+write.
    pub fn open(unit: DriveUnit) -> Result<Self> {
        let path = platform::drive_path(unit);
        let mut opts = OpenOptions::new();
        opts.read(true).write(true);
        // Refuse to race a mounted filesystem for the same spindle.
        #[cfg(unix)]
        opts.custom_flags(libc::O_EXCL);
        let file = opts
            .open(&path)
            .map_err(|source| DiskError::DeviceUnavailable { unit, source })?;
        Ok(Self { file, unit })
    }

    /// The unit this session is bound to.
    pub fn unit(&self) -> DriveUnit {
        self.unit
    }

    fn seek_track(&mut self, track: u32) -> Result<()> {
        debug_assert!((track as usize) < TRACKS);
        self.file
            .seek(SeekFrom::Start(track_offset(track)))
            .map(drop)
            .map_err(|source| DiskError::IoFault { track, source })
    }
}

impl TrackDevice for FloppyDevice {
    fn set_motor(&mut self, on: bool) {
        // The kernel driver spins the spindle up on first access and
        // handles spin-down itself; on release we can only flush the
        // request queue. Errors are swallowed per the motor contract.
        #[cfg(target_os = "linux")]
        if !on {
            let _ = platform::flush(self.file.as_raw_fd());
        }
        #[cfg(not(target_os = "linux"))]
        let _ = on;
    }

    fn read_track(&mut self, track: u32, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), TRACK_SIZE);
        self.seek_track(track)?;
        self.file
            .read_exact(buf)
            .map_err(|source| DiskError::IoFault { track, source })
    }

    fn write_track(&mut self, track: u32, buf: &[u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), TRACK_SIZE);
        self.seek_track(track)?;
        self.file
            .write_all(buf)
            .map_err(|source| DiskError::IoFault { track, source })
    }

    fn format_track(&mut self, track: u32) -> Result<()> {
        #[cfg(target_os = "linux")]
        {
            match platform::format_track(self.file.as_raw_fd(), track) {
                Ok(()) => Ok(()),
                Err(e) if e.raw_os_error() == Some(libc::ENOTTY) => Err(DiskError::Unsupported),
                Err(source) => Err(DiskError::IoFault { track, source }),
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            let _ = track;
            Err(DiskError::Unsupported)
        }
    }
}

/// A RAM-backed loopback drive holding exactly one disk's worth of data.
///
/// Every command issued against it is journalled in order, so a test can
/// assert not just on the resulting bytes but on the exact command
/// sequence the engine produced.
pub struct MemoryDevice {
    data: Vec<u8>,
    journal: Vec<TdCommand>,
    motor: bool,
}

impl MemoryDevice {
    /// A blank (zero-filled) disk.
    pub fn new() -> Self {
        Self::filled(0)
    }

    /// A disk with every byte set to `byte`.
    pub fn filled(byte: u8) -> Self {
        Self {
            data: vec![byte; DISK_SIZE],
            journal: Vec::new(),
            motor: false,
        }
    }

    /// Wraps an existing disk image. The buffer must be exactly one
    /// disk in size.
    pub fn from_data(data: Vec<u8>) -> Result<Self> {
        if data.len() != DISK_SIZE {
            return Err(DiskError::InvalidSize {
                actual: data.len() as u64,
            });
        }
        Ok(Self {
            data,
            journal: Vec::new(),
            motor: false,
        })
    }

    /// The current disk contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the device, returning the disk contents.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Every command issued so far, in order.
    pub fn journal(&self) -> &[TdCommand] {
        &self.journal
    }

    /// Whether the last motor command left the spindle running.
    pub fn motor_is_on(&self) -> bool {
        self.motor
    }

    fn track_range(track: u32) -> std::ops::Range<usize> {
        let start = track_offset(track) as usize;
        start..start + TRACK_SIZE
    }
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackDevice for MemoryDevice {
    fn set_motor(&mut self, on: bool) {
        self.journal.push(TdCommand::Motor(on));
        self.motor = on;
    }

    fn read_track(&mut self, track: u32, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), TRACK_SIZE);
        self.journal.push(TdCommand::Read(track));
        buf.copy_from_slice(&self.data[Self::track_range(track)]);
        Ok(())
    }

    fn write_track(&mut self, track: u32, buf: &[u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), TRACK_SIZE);
        self.journal.push(TdCommand::Write(track));
        self.data[Self::track_range(track)].copy_from_slice(buf);
        Ok(())
    }

    fn format_track(&mut self, track: u32) -> Result<()> {
        self.journal.push(TdCommand::Format(track));
        self.data[Self::track_range(track)].fill(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_unit_bounds() {
        assert!(DriveUnit::new(3).is_some());
        assert!(DriveUnit::new(4).is_none());
        assert_eq!(DriveUnit::new(0).unwrap().to_string(), "df0");
    }

    #[test]
    fn memory_device_round_trips_a_track() {
        let mut dev = MemoryDevice::new();
        let pattern = vec![0x5A; TRACK_SIZE];
        dev.write_track(7, &pattern).unwrap();

        let mut readback = vec![0u8; TRACK_SIZE];
        dev.read_track(7, &mut readback).unwrap();
        assert_eq!(readback, pattern);
        assert_eq!(dev.journal(), &[TdCommand::Write(7), TdCommand::Read(7)]);
    }

    #[test]
    fn memory_device_rejects_short_image() {
        assert!(matches!(
            MemoryDevice::from_data(vec![0; 1234]),
            Err(DiskError::InvalidSize { actual: 1234 })
        ));
    }

    #[test]
    fn format_track_zero_fills() {
        let mut dev = MemoryDevice::filled(0xFF);
        dev.format_track(0).unwrap();
        assert!(dev.data()[..TRACK_SIZE].iter().all(|&b| b == 0));
        assert!(dev.data()[TRACK_SIZE..].iter().all(|&b| b == 0xFF));
    }
}
