//! Contains the logic for writing an ADF image file to a floppy.
//!
//! This module handles the multi-stage process of writing:
//! 1.  Decompressing the image on-the-fly if it is gzip-compressed
//!     (`.adz`, `.gz`).
//! 2.  Gating on the exact expected image size — no partial-disk writes
//!     are ever attempted.
//! 3.  Writing the image to the drive track by track.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tempfile::{NamedTempFile, TempPath};

use crate::device::TrackDevice;
use crate::error::{DiskError, Result};
use crate::geometry::{DISK_SIZE, TRACKS, TRACK_SIZE};

const LOG_EVERY: u32 = 8;

/// Manages the lifetime of a decompressed image file.
/// If the image was decompressed to a temp file, this struct holds the
/// handle and will delete the file on drop.
struct DecompressedImage {
    path: PathBuf,
    _temp_handle: Option<TempPath>,
}

impl DecompressedImage {
    fn is_temp(&self) -> bool {
        self._temp_handle.is_some()
    }
}

impl AsRef<Path> for DecompressedImage {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Decompresses an image to a temporary file if necessary.
fn decompress_image(input_path: &Path) -> io::Result<DecompressedImage> {
    let ext = input_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut reader = match ext.as_str() {
        "adz" | "gz" | "gzip" => GzDecoder::new(BufReader::new(File::open(input_path)?)),
        // Not a compressed file, return a path to the original.
        _ => {
            return Ok(DecompressedImage {
                path: input_path.to_path_buf(),
                _temp_handle: None,
            });
        }
    };

    let mut temp_file = NamedTempFile::new()?;
    {
        let mut writer = BufWriter::new(&mut temp_file);
        io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
    }

    let temp_path = temp_file.into_temp_path();
    Ok(DecompressedImage {
        path: temp_path.to_path_buf(),
        _temp_handle: Some(temp_path),
    })
}

/// Determines a file's size from its metadata, falling back to an
/// end-of-file seek when the metadata is unavailable. The cursor is left
/// at the start of the file.
pub(crate) fn file_size(file: &mut File) -> Result<u64> {
    match file.metadata() {
        Ok(meta) => Ok(meta.len()),
        Err(_) => {
            let end = file.seek(SeekFrom::End(0))?;
            file.seek(SeekFrom::Start(0))?;
            Ok(end)
        }
    }
}

/// Writes the image at `image_path` to the disk in `dev`.
///
/// Rejects the operation with [`DiskError::InvalidSize`] before any
/// drive I/O when the (decompressed) image is not exactly one disk in
/// size. Progress is reported as `(bytes_written, DISK_SIZE)`.
pub fn run<D, P, L>(dev: &mut D, image_path: &Path, mut on_progress: P, mut on_log: L) -> Result<()>
where
    D: TrackDevice + ?Sized,
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    let image = decompress_image(image_path)?;
    if image.is_temp() {
        on_log("Decompressed image to a temporary file");
    }

    let mut file = File::open(&image)?;
    let size = file_size(&mut file)?;
    on_log(&format!("Detected image size: {size} bytes"));
    if size != DISK_SIZE as u64 {
        return Err(DiskError::InvalidSize { actual: size });
    }
    file.seek(SeekFrom::Start(0))?;

    dev.set_motor(true);
    let result = restore(dev, &mut file, &mut on_progress, &mut on_log);
    dev.set_motor(false);
    result
}

fn restore<D, P, L>(dev: &mut D, file: &mut File, on_progress: &mut P, on_log: &mut L) -> Result<()>
where
    D: TrackDevice + ?Sized,
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    let mut buf = vec![0u8; TRACK_SIZE];
    let mut done: u64 = 0;

    for track in 0..TRACKS as u32 {
        file.read_exact(&mut buf)?;
        if let Err(e) = dev.write_track(track, &buf) {
            on_log(&format!("Write error at track {track}: {e}"));
            return Err(e);
        }
        done += TRACK_SIZE as u64;
        on_progress(done, DISK_SIZE as u64);
        if track % LOG_EVERY == 0 || track == TRACKS as u32 - 1 {
            on_log(&format!("Track {}/{}", track + 1, TRACKS));
        }
    }

    Ok(())
}
