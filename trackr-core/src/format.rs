//! The format orchestrator: quick, full and deep format strategies.
//!
//! Quick and full delegate entirely to the external filesystem-format
//! utility. Deep is the hard path for worn media: a destructive raw
//! rewrite of every track with per-track retry and read-back
//! verification, followed by a quick filesystem install on top of the
//! fresh surface. Unlike the simple passes in [`crate::transfer`], the
//! deep pass tolerates individual bad tracks and keeps going.

use std::path::PathBuf;
use std::process::Command;

use crate::device::{DriveUnit, TrackDevice};
use crate::error::{DiskError, Result};
use crate::geometry::{DISK_SIZE, TRACKS, TRACK_SIZE};
use crate::platform;

/// Non-zero pattern of the first track-0 scrub write.
pub const SCRUB_PATTERN: u8 = 0xA5;
/// The fill every deep-formatted track is verified against.
pub const DEEP_FILL: u8 = 0x00;

/// Retry budget for track 0, which carries the boot blocks.
const TRACK0_ATTEMPTS: u32 = 5;
/// Retry budget for every other track.
const TRACK_ATTEMPTS: u32 = 2;

const LOG_EVERY: u32 = 4;

/// The three mutually exclusive format strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatMode {
    /// Delegate to the OS utility with the quick flag; no raw pass.
    Quick,
    /// Delegate to the OS utility for a full structural format.
    Full,
    /// Destructive raw scrub-and-reformat with per-track retry, then a
    /// quick filesystem install.
    Deep,
}

/// The external collaborator that lays a filesystem onto a drive.
pub trait FilesystemInstaller {
    /// Formats `unit` with volume name `volume`; `quick` skips the
    /// structural pass.
    fn install(&mut self, unit: DriveUnit, volume: &str, quick: bool) -> Result<()>;
}

/// Shells out to an external format program (`adformat` by default),
/// passing the drive path, the volume label and an optional quick flag.
pub struct CommandInstaller {
    program: PathBuf,
}

impl CommandInstaller {
    /// Uses `program` as the format utility.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CommandInstaller {
    fn default() -> Self {
        Self::new("adformat")
    }
}

impl FilesystemInstaller for CommandInstaller {
    fn install(&mut self, unit: DriveUnit, volume: &str, quick: bool) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(platform::drive_path(unit))
            .arg("--label")
            .arg(volume);
        if quick {
            cmd.arg("--quick");
        }

        let status = cmd
            .status()
            .map_err(|e| DiskError::Installer(format!("{}: {e}", self.program.display())))?;
        if !status.success() {
            return Err(DiskError::Installer(format!(
                "{} exited with {status}",
                self.program.display()
            )));
        }
        Ok(())
    }
}

/// The result of a deep format's raw pass.
#[derive(Debug, Default)]
pub struct FormatReport {
    /// Tracks that exhausted their retry budget without a clean
    /// read-back. The filesystem install still ran.
    pub failed_tracks: Vec<u32>,
}

/// Runs one format strategy against an open session.
///
/// The drive motor is stopped unconditionally on exit, success or
/// failure, for every mode. Progress (deep mode only) is reported in
/// bytes of [`DISK_SIZE`].
pub fn run<D, I, P, L>(
    dev: &mut D,
    installer: &mut I,
    unit: DriveUnit,
    volume: &str,
    mode: FormatMode,
    mut on_progress: P,
    mut on_log: L,
) -> Result<FormatReport>
where
    D: TrackDevice + ?Sized,
    I: FilesystemInstaller + ?Sized,
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    let outcome = match mode {
        FormatMode::Quick => {
            on_log("Running quick filesystem format");
            installer
                .install(unit, volume, true)
                .map(|()| FormatReport::default())
        }
        FormatMode::Full => {
            on_log("Running full filesystem format");
            installer
                .install(unit, volume, false)
                .map(|()| FormatReport::default())
        }
        FormatMode::Deep => {
            dev.set_motor(true);
            let report = deep_pass(dev, &mut on_progress, &mut on_log);
            dev.set_motor(false);
            if report.failed_tracks.is_empty() {
                on_log("Raw pass complete");
            } else {
                on_log(&format!(
                    "Raw pass complete, {} bad track(s)",
                    report.failed_tracks.len()
                ));
            }
            installer.install(unit, volume, true).map(|()| report)
        }
    };
    dev.set_motor(false);
    outcome
}

/// The destructive raw pass: scrub track 0, then format-or-rewrite every
/// track with read-back verification and a bounded retry budget.
///
/// Per-track failures never abort the pass; they are logged, recorded in
/// the report and the pass moves on to the next track.
fn deep_pass<D, P, L>(dev: &mut D, on_progress: &mut P, on_log: &mut L) -> FormatReport
where
    D: TrackDevice + ?Sized,
    P: FnMut(u64, u64),
    L: FnMut(&str),
{
    let scrub = vec![SCRUB_PATTERN; TRACK_SIZE];
    let fill = vec![DEEP_FILL; TRACK_SIZE];
    let mut readback = vec![0u8; TRACK_SIZE];

    // Two unconditional preconditioning writes over the boot track, a
    // non-zero pattern then zeros. Their outcomes are ignored.
    let _ = dev.write_track(0, &scrub);
    let _ = dev.write_track(0, &fill);

    let mut report = FormatReport::default();
    let mut done: u64 = 0;

    for track in 0..TRACKS as u32 {
        let attempts = if track == 0 {
            TRACK0_ATTEMPTS
        } else {
            TRACK_ATTEMPTS
        };

        let mut good = false;
        for _ in 0..attempts {
            // Drive-native format first, verified by read-back.
            if dev.format_track(track).is_ok()
                && dev.read_track(track, &mut readback).is_ok()
                && readback == fill
            {
                good = true;
                break;
            }
            // Fall back to an explicit pattern write, same verification.
            if dev.write_track(track, &fill).is_ok()
                && dev.read_track(track, &mut readback).is_ok()
                && readback == fill
            {
                good = true;
                break;
            }
        }

        if !good {
            on_log(&format!("Track {track} failed after {attempts} attempts"));
            report.failed_tracks.push(track);
        }

        done += TRACK_SIZE as u64;
        on_progress(done, DISK_SIZE as u64);
        if track % LOG_EVERY == 0 || track == TRACKS as u32 - 1 {
            on_log(&format!("Formatted track {}/{}", track + 1, TRACKS));
        }
    }

    report
}
