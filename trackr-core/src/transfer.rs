//! The track transfer engine: whole-disk passes over a device session.
//!
//! Every pass walks tracks 0..160 in ascending order, spins the motor up
//! on entry and stops it on every exit path, and reports progress after
//! each track. The simple passes here treat any track fault as fatal;
//! the fault-tolerant per-track retry policy lives in [`crate::format`],
//! which deliberately targets worn media.
//!
//! Progress is a `(done, total)` pair: bytes for write and copy passes,
//! sectors for the verify pass. Log lines are throttled to every few
//! tracks; that cadence is cosmetic, not a correctness requirement.

use crate::device::TrackDevice;
use crate::error::{DiskError, Result};
use crate::geometry::{
    track_offset, DISK_SIZE, SECTORS_PER_TRACK, TOTAL_SECTORS, TRACKS, TRACK_SIZE,
};

/// How often the write pass emits a summary log line, in tracks.
const WRITE_LOG_EVERY: u32 = 4;
/// Log cadence for every other pass.
const LOG_EVERY: u32 = 8;

/// How an operation that can be declined by the user ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The pass ran to completion.
    Completed,
    /// The user declined a prompt; nothing further was written.
    Cancelled,
}

fn last_track() -> u32 {
    TRACKS as u32 - 1
}

/// Writes a `fill`-byte pattern over every track.
///
/// Used by the destructive raw reformat in its simple form: a single
/// unrecoverable write failure logs the track and aborts the whole pass.
pub fn write_pass<D, P, L>(dev: &mut D, fill: u8, mut on_progress: P, mut on_log: L) -> Result<()>
where
    D: TrackDevice + ?Sized,
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    dev.set_motor(true);
    let result = (|| {
        let buf = vec![fill; TRACK_SIZE];
        let mut done: u64 = 0;
        for track in 0..TRACKS as u32 {
            if let Err(e) = dev.write_track(track, &buf) {
                on_log(&format!("Write error at track {track}: {e}"));
                return Err(e);
            }
            done += TRACK_SIZE as u64;
            on_progress(done, DISK_SIZE as u64);
            if track % WRITE_LOG_EVERY == 0 || track == last_track() {
                on_log(&format!("Wrote track {}/{}", track + 1, TRACKS));
            }
        }
        Ok(())
    })();
    dev.set_motor(false);
    result
}

/// Reads every track and discards the payload, proving the media is
/// readable end to end. Progress is reported in sectors.
pub fn verify_pass<D, P, L>(dev: &mut D, mut on_progress: P, mut on_log: L) -> Result<()>
where
    D: TrackDevice + ?Sized,
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    dev.set_motor(true);
    let result = (|| {
        let mut buf = vec![0u8; TRACK_SIZE];
        let mut done_sectors: u64 = 0;
        for track in 0..TRACKS as u32 {
            if let Err(e) = dev.read_track(track, &mut buf) {
                on_log(&format!("Read error at track {track}: {e}"));
                return Err(e);
            }
            done_sectors += SECTORS_PER_TRACK as u64;
            on_progress(done_sectors, TOTAL_SECTORS as u64);
            if track % LOG_EVERY == 0 || track == last_track() {
                on_log(&format!(
                    "Track {}/{}, sectors {}/{}",
                    track + 1,
                    TRACKS,
                    done_sectors,
                    TOTAL_SECTORS
                ));
            }
        }
        Ok(())
    })();
    dev.set_motor(false);
    result
}

/// Copies a disk between two distinct drives through a single shared
/// track buffer: read source, write destination, track by track. Either
/// failure aborts; both motors are stopped on exit regardless of outcome.
pub fn copy_two_drives<S, D, P, L>(
    src: &mut S,
    dst: &mut D,
    mut on_progress: P,
    mut on_log: L,
) -> Result<()>
where
    S: TrackDevice + ?Sized,
    D: TrackDevice + ?Sized,
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    src.set_motor(true);
    dst.set_motor(true);
    let result = (|| {
        let mut buf = vec![0u8; TRACK_SIZE];
        let mut done: u64 = 0;
        for track in 0..TRACKS as u32 {
            if let Err(e) = src.read_track(track, &mut buf) {
                on_log(&format!("Read error at track {track}: {e}"));
                return Err(e);
            }
            if let Err(e) = dst.write_track(track, &buf) {
                on_log(&format!("Write error at track {track}: {e}"));
                return Err(e);
            }
            done += TRACK_SIZE as u64;
            on_progress(done, DISK_SIZE as u64);
            if track % LOG_EVERY == 0 || track == last_track() {
                on_log(&format!("Track {}/{}", track + 1, TRACKS));
            }
        }
        Ok(())
    })();
    src.set_motor(false);
    dst.set_motor(false);
    result
}

/// Copies a disk using a single drive and a whole-disk RAM image.
///
/// Phase one reads all 160 tracks into RAM; `confirm_swap` is then asked
/// exactly once whether the destination medium has been physically
/// swapped in. A decline cancels the copy with zero writes issued. Phase
/// two writes the RAM image back to the same drive. Progress restarts
/// from zero for each phase.
pub fn copy_same_drive<D, C, P, L>(
    dev: &mut D,
    confirm_swap: C,
    mut on_progress: P,
    mut on_log: L,
) -> Result<Outcome>
where
    D: TrackDevice + ?Sized,
    C: FnOnce() -> bool,
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    let mut image = Vec::new();
    image
        .try_reserve_exact(DISK_SIZE)
        .map_err(|_| DiskError::NoMemory)?;
    image.resize(DISK_SIZE, 0);

    on_log("Reading source to RAM (swap later)...");
    dev.set_motor(true);
    let read_result = (|| {
        let mut done: u64 = 0;
        for track in 0..TRACKS as u32 {
            let start = track_offset(track) as usize;
            if let Err(e) = dev.read_track(track, &mut image[start..start + TRACK_SIZE]) {
                on_log(&format!("Read error at track {track}: {e}"));
                return Err(e);
            }
            done += TRACK_SIZE as u64;
            on_progress(done, DISK_SIZE as u64);
            if track % LOG_EVERY == 0 || track == last_track() {
                on_log(&format!("Track {}/{}", track + 1, TRACKS));
            }
        }
        Ok(())
    })();
    dev.set_motor(false);
    read_result?;

    if !confirm_swap() {
        on_log("Copy cancelled before writing.");
        return Ok(Outcome::Cancelled);
    }

    on_log("Writing RAM image to destination...");
    dev.set_motor(true);
    let write_result = (|| {
        let mut done: u64 = 0;
        for track in 0..TRACKS as u32 {
            let start = track_offset(track) as usize;
            if let Err(e) = dev.write_track(track, &image[start..start + TRACK_SIZE]) {
                on_log(&format!("Write error at track {track}: {e}"));
                return Err(e);
            }
            done += TRACK_SIZE as u64;
            on_progress(done, DISK_SIZE as u64);
            if track % LOG_EVERY == 0 || track == last_track() {
                on_log(&format!("Track {}/{}", track + 1, TRACKS));
            }
        }
        Ok(())
    })();
    dev.set_motor(false);
    write_result?;

    Ok(Outcome::Completed)
}
