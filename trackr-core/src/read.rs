//! Contains the logic for reading a floppy into an ADF image file.
//!
//! The image is a flat binary: 160 consecutive tracks of 5632 bytes, no
//! header, no metadata. A pass that aborts mid-way leaves a truncated
//! file behind; that truncated file is the observable failure state and
//! is not rolled back.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::device::{DriveUnit, TrackDevice};
use crate::error::Result;
use crate::geometry::{DISK_SIZE, TRACKS, TRACK_SIZE};

const LOG_EVERY: u32 = 8;

/// Reads the entire disk in `dev` into a new image file at `image_path`.
///
/// Progress is reported as `(bytes_read, DISK_SIZE)` after every track.
/// On success the finished file is re-opened and its final size logged
/// for diagnostics.
pub fn run<D, P, L>(dev: &mut D, image_path: &Path, mut on_progress: P, mut on_log: L) -> Result<()>
where
    D: TrackDevice + ?Sized,
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    dev.set_motor(true);
    let result = dump(dev, image_path, &mut on_progress, &mut on_log);
    dev.set_motor(false);
    result?;

    if let Ok(meta) = fs::metadata(image_path) {
        on_log(&format!("Saved image size: {} bytes", meta.len()));
    }
    Ok(())
}

fn dump<D, P, L>(dev: &mut D, image_path: &Path, on_progress: &mut P, on_log: &mut L) -> Result<()>
where
    D: TrackDevice + ?Sized,
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    let mut file = File::create(image_path)?;
    let mut buf = vec![0u8; TRACK_SIZE];
    let mut done: u64 = 0;

    for track in 0..TRACKS as u32 {
        if let Err(e) = dev.read_track(track, &mut buf) {
            on_log(&format!("Read error at track {track}: {e}"));
            return Err(e);
        }
        file.write_all(&buf)?;
        done += TRACK_SIZE as u64;
        on_progress(done, DISK_SIZE as u64);
        if track % LOG_EVERY == 0 || track == TRACKS as u32 - 1 {
            on_log(&format!("Track {}/{}", track + 1, TRACKS));
        }
    }

    file.flush()?;
    Ok(())
}

/// Picks a fresh `df<unit>_<nnn>.adf` name under `dir` that does not
/// collide with an existing file. Returns `None` when a thousand names
/// are already taken.
pub fn unique_image_path(dir: &Path, unit: DriveUnit) -> Option<PathBuf> {
    (0..1000)
        .map(|n| dir.join(format!("{unit}_{n:03}.adf")))
        .find(|path| !path.exists())
}
