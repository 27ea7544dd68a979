//! Integration tests driving the engine, codec and orchestrator against
//! loopback devices.

use std::collections::HashSet;
use std::io;

use trackr_core::device::{DriveUnit, MemoryDevice, TdCommand, TrackDevice};
use trackr_core::error::{DiskError, Result};
use trackr_core::format::{self, FilesystemInstaller, FormatMode, DEEP_FILL, SCRUB_PATTERN};
use trackr_core::geometry::{DISK_SIZE, TOTAL_SECTORS, TRACKS, TRACK_SIZE};
use trackr_core::transfer::{self, Outcome};
use trackr_core::{crc32, read, write};

/// A loopback device with injectable per-track faults and a full record
/// of every write payload's first byte.
struct FaultyDevice {
    inner: MemoryDevice,
    bad_tracks: HashSet<u32>,
    write_patterns: Vec<(u32, u8)>,
}

impl FaultyDevice {
    fn new(bad_tracks: impl IntoIterator<Item = u32>) -> Self {
        Self {
            inner: MemoryDevice::new(),
            bad_tracks: bad_tracks.into_iter().collect(),
            write_patterns: Vec::new(),
        }
    }

    fn fault(&self, track: u32) -> Option<DiskError> {
        self.bad_tracks.contains(&track).then(|| DiskError::IoFault {
            track,
            source: io::Error::from(io::ErrorKind::InvalidData),
        })
    }
}

impl TrackDevice for FaultyDevice {
    fn set_motor(&mut self, on: bool) {
        self.inner.set_motor(on);
    }

    fn read_track(&mut self, track: u32, buf: &mut [u8]) -> Result<()> {
        if let Some(err) = self.fault(track) {
            return Err(err);
        }
        self.inner.read_track(track, buf)
    }

    fn write_track(&mut self, track: u32, buf: &[u8]) -> Result<()> {
        self.write_patterns.push((track, buf[0]));
        if let Some(err) = self.fault(track) {
            return Err(err);
        }
        self.inner.write_track(track, buf)
    }

    fn format_track(&mut self, track: u32) -> Result<()> {
        if let Some(err) = self.fault(track) {
            return Err(err);
        }
        self.inner.format_track(track)
    }
}

/// Records installer invocations instead of running anything.
#[derive(Default)]
struct RecordingInstaller {
    calls: Vec<(String, bool)>,
}

impl FilesystemInstaller for RecordingInstaller {
    fn install(&mut self, unit: DriveUnit, volume: &str, quick: bool) -> Result<()> {
        self.calls.push((format!("{unit}:{volume}"), quick));
        Ok(())
    }
}

fn patterned_disk() -> Vec<u8> {
    (0..DISK_SIZE).map(|i| (i / TRACK_SIZE) as u8).collect()
}

fn track_writes(journal: &[TdCommand]) -> Vec<u32> {
    journal
        .iter()
        .filter_map(|cmd| match cmd {
            TdCommand::Write(track) => Some(*track),
            _ => None,
        })
        .collect()
}

#[test]
fn image_round_trip_through_loopback_drive() {
    let source = patterned_disk();
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("dump.adf");

    let mut drive = MemoryDevice::from_data(source.clone()).unwrap();
    read::run(&mut drive, &image_path, |_, _| {}, |_| {}).unwrap();
    assert_eq!(
        std::fs::metadata(&image_path).unwrap().len(),
        DISK_SIZE as u64
    );

    let mut restored = MemoryDevice::new();
    write::run(&mut restored, &image_path, |_, _| {}, |_| {}).unwrap();
    assert_eq!(restored.data(), source.as_slice());
}

#[test]
fn write_rejects_wrong_size_without_touching_drive() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("short.adf");
    std::fs::write(&image_path, vec![0u8; DISK_SIZE - 1]).unwrap();

    let mut drive = MemoryDevice::new();
    let err = write::run(&mut drive, &image_path, |_, _| {}, |_| {}).unwrap_err();
    assert!(matches!(err, DiskError::InvalidSize { actual } if actual == DISK_SIZE as u64 - 1));
    assert!(drive.journal().is_empty());
}

#[test]
fn two_drive_copy_is_byte_exact_and_ascending() {
    let mut src = MemoryDevice::from_data(patterned_disk()).unwrap();
    let mut dst = MemoryDevice::new();

    transfer::copy_two_drives(&mut src, &mut dst, |_, _| {}, |_| {}).unwrap();

    assert_eq!(src.data(), dst.data());
    let writes = track_writes(dst.journal());
    assert_eq!(writes.len(), TRACKS);
    assert!(writes.windows(2).all(|w| w[0] + 1 == w[1]));
    assert!(!dst.motor_is_on());
    assert!(!src.motor_is_on());
}

#[test]
fn two_drive_copy_aborts_on_write_fault() {
    let mut src = MemoryDevice::new();
    let mut dst = FaultyDevice::new([12]);

    let err = transfer::copy_two_drives(&mut src, &mut dst, |_, _| {}, |_| {}).unwrap_err();
    assert!(matches!(err, DiskError::IoFault { track: 12, .. }));
    // Nothing past the failing track was attempted.
    assert_eq!(dst.write_patterns.last().unwrap().0, 12);
    assert!(!src.motor_is_on());
}

#[test]
fn same_drive_copy_declined_swap_writes_nothing() {
    let mut drive = MemoryDevice::from_data(patterned_disk()).unwrap();

    let outcome = transfer::copy_same_drive(&mut drive, || false, |_, _| {}, |_| {}).unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
    assert!(track_writes(drive.journal()).is_empty());
    // Phase (a) still read the whole disk.
    let reads = drive
        .journal()
        .iter()
        .filter(|cmd| matches!(cmd, TdCommand::Read(_)))
        .count();
    assert_eq!(reads, TRACKS);
}

#[test]
fn same_drive_copy_writes_ram_image_back() {
    let source = patterned_disk();
    let mut drive = MemoryDevice::from_data(source.clone()).unwrap();

    let outcome = transfer::copy_same_drive(&mut drive, || true, |_, _| {}, |_| {}).unwrap();

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(track_writes(drive.journal()).len(), TRACKS);
    assert_eq!(drive.into_data(), source);
}

#[test]
fn verify_pass_reports_sector_progress() {
    let mut drive = MemoryDevice::new();
    let mut reports = Vec::new();

    transfer::verify_pass(&mut drive, |done, total| reports.push((done, total)), |_| {}).unwrap();

    assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(reports.last().unwrap(), &(TOTAL_SECTORS as u64, TOTAL_SECTORS as u64));
}

#[test]
fn write_pass_progress_is_monotonic_and_complete() {
    let mut drive = MemoryDevice::new();
    let mut reports = Vec::new();

    transfer::write_pass(&mut drive, 0xE5, |done, total| reports.push((done, total)), |_| {})
        .unwrap();

    assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(reports.last().unwrap(), &(DISK_SIZE as u64, DISK_SIZE as u64));
    assert!(drive.data().iter().all(|&b| b == 0xE5));
}

#[test]
fn write_pass_aborts_on_first_fault() {
    let mut drive = FaultyDevice::new([3]);
    let mut logged = Vec::new();

    let err = transfer::write_pass(&mut drive, 0, |_, _| {}, |line: &str| {
        logged.push(line.to_string())
    })
    .unwrap_err();

    assert!(matches!(err, DiskError::IoFault { track: 3, .. }));
    assert!(logged.iter().any(|l| l.contains("track 3")));
    assert_eq!(drive.write_patterns.last().unwrap().0, 3);
}

#[test]
fn deep_format_scrubs_track_zero_twice_before_retries() {
    let mut drive = FaultyDevice::new([]);
    let mut installer = RecordingInstaller::default();
    let unit = DriveUnit::new(0).unwrap();

    format::run(
        &mut drive,
        &mut installer,
        unit,
        "Work",
        FormatMode::Deep,
        |_, _| {},
        |_| {},
    )
    .unwrap();

    // The first two writes are the unconditional track-0 scrub passes.
    assert_eq!(drive.write_patterns[0], (0, SCRUB_PATTERN));
    assert_eq!(drive.write_patterns[1], (0, DEEP_FILL));
    assert_eq!(installer.calls, vec![("df0:Work".to_string(), true)]);
}

#[test]
fn deep_format_tolerates_a_permanently_bad_track() {
    let mut drive = FaultyDevice::new([47]);
    let mut installer = RecordingInstaller::default();
    let unit = DriveUnit::new(1).unwrap();

    let report = format::run(
        &mut drive,
        &mut installer,
        unit,
        "Scratch",
        FormatMode::Deep,
        |_, _| {},
        |_| {},
    )
    .unwrap();

    assert_eq!(report.failed_tracks, vec![47]);
    // Tracks past the bad one were still formatted.
    assert!(drive
        .inner
        .journal()
        .iter()
        .any(|cmd| matches!(cmd, TdCommand::Format(159))));
    // The filesystem install still ran, in quick mode.
    assert_eq!(installer.calls, vec![("df1:Scratch".to_string(), true)]);
}

#[test]
fn quick_and_full_modes_never_touch_the_engine() {
    for (mode, quick) in [(FormatMode::Quick, true), (FormatMode::Full, false)] {
        let mut drive = MemoryDevice::new();
        let mut installer = RecordingInstaller::default();
        let unit = DriveUnit::new(2).unwrap();

        format::run(&mut drive, &mut installer, unit, "Empty", mode, |_, _| {}, |_| {}).unwrap();

        assert_eq!(installer.calls, vec![("df2:Empty".to_string(), quick)]);
        assert!(track_writes(drive.journal()).is_empty());
        assert!(!drive.motor_is_on());
    }
}

#[test]
fn checksum_streams_whole_image_with_progress() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("fingerprint.adf");
    std::fs::write(&image_path, patterned_disk()).unwrap();

    let mut reports = Vec::new();
    let crc = crc32::checksum_file(
        &image_path,
        |done, total| reports.push((done, total)),
        |_| {},
    )
    .unwrap();

    let mut expected = crc32::Crc32::new();
    expected.update(&patterned_disk());
    assert_eq!(crc, expected.finalize());
    assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(reports.last().unwrap(), &(DISK_SIZE as u64, DISK_SIZE as u64));
}

#[test]
fn checksum_warns_but_succeeds_on_odd_size() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("odd.adf");
    std::fs::write(&image_path, vec![0xAAu8; 4000]).unwrap();

    let mut warned = false;
    let crc = crc32::checksum_file(&image_path, |_, _| {}, |line: &str| {
        warned |= line.contains("Warning");
    })
    .unwrap();

    assert!(warned);
    let mut expected = crc32::Crc32::new();
    expected.update(&[0xAAu8; 4000]);
    assert_eq!(crc, expected.finalize());
}

#[test]
fn gzip_compressed_image_is_accepted() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write as _;

    let source = patterned_disk();
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("disk.adz");

    let file = std::fs::File::create(&image_path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(&source).unwrap();
    encoder.finish().unwrap();

    let mut drive = MemoryDevice::new();
    write::run(&mut drive, &image_path, |_, _| {}, |_| {}).unwrap();
    assert_eq!(drive.data(), source.as_slice());
}

#[test]
fn unique_image_path_skips_existing_names() {
    let dir = tempfile::tempdir().unwrap();
    let unit = DriveUnit::new(0).unwrap();

    let first = read::unique_image_path(dir.path(), unit).unwrap();
    assert_eq!(first.file_name().unwrap(), "df0_000.adf");

    std::fs::write(&first, b"taken").unwrap();
    let second = read::unique_image_path(dir.path(), unit).unwrap();
    assert_eq!(second.file_name().unwrap(), "df0_001.adf");
}
