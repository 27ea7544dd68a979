use std::path::PathBuf;

use crate::device::DriveUnit;

/// The raw-device path for a drive unit (`\\.\A:`, `\\.\B:`, ...).
///
/// Windows only assigns the first two floppy letters; higher units map to
/// letters that will simply fail to open.
pub fn drive_path(unit: DriveUnit) -> PathBuf {
    let letter = (b'A' + unit.index()) as char;
    PathBuf::from(format!(r"\\.\{letter}:"))
}

/// Scans for floppy drives present on this system.
pub fn list_drives() -> Vec<DriveUnit> {
    // TODO: query the volume manager instead of probing device paths;
    // Path::exists on \\.\X: is unreliable for empty drives.
    DriveUnit::all()
        .filter(|unit| drive_path(*unit).exists())
        .collect()
}
