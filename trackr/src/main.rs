use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use indicatif::{ProgressBar, ProgressStyle};
use trackr_core::device::{DriveUnit, FloppyDevice};
use trackr_core::format::{self, CommandInstaller, FormatMode};
use trackr_core::geometry::{DISK_SIZE, TOTAL_SECTORS};
use trackr_core::transfer::{self, Outcome};
use trackr_core::{crc32, platform, read, write};

#[derive(Parser)]
#[command(name = "trackr")]
#[command(about = "A safe, interactive Amiga floppy imaging tool", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a floppy track by track, drive to drive or via RAM on one drive
    Copy {
        /// Source drive unit (0-3)
        #[arg(long)]
        from: Option<u8>,

        /// Destination drive unit (0-3); same as source for a swap copy
        #[arg(long)]
        to: Option<u8>,
    },
    /// Read every track of a floppy to prove the media is readable
    Verify {
        /// Drive unit (0-3)
        #[arg(long)]
        unit: Option<u8>,
    },
    /// Format a floppy
    Format {
        /// Format strategy
        #[arg(long, value_enum, default_value = "quick")]
        mode: ModeArg,

        /// Volume name for the new filesystem
        #[arg(long, default_value = "Untitled")]
        volume: String,

        /// Drive unit (0-3)
        #[arg(long)]
        unit: Option<u8>,

        /// External filesystem-format utility to invoke
        #[arg(long, default_value = "adformat")]
        installer: PathBuf,
    },
    /// Read a floppy into an ADF image file
    Read {
        /// Output image file; auto-named df<unit>_<nnn>.adf when omitted
        image: Option<PathBuf>,

        /// Drive unit (0-3)
        #[arg(long)]
        unit: Option<u8>,
    },
    /// Write an ADF image (optionally gzip-compressed) to a floppy
    Write {
        /// Image file to write
        #[arg(required = true)]
        image: PathBuf,

        /// Drive unit (0-3)
        #[arg(long)]
        unit: Option<u8>,
    },
    /// Compute the CRC32 fingerprint of an ADF image file
    Check {
        /// Image file to fingerprint
        #[arg(required = true)]
        image: PathBuf,
    },
    /// List floppy drives present on this system
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Filesystem-only format via the OS utility
    Quick,
    /// Full structural format via the OS utility
    Full,
    /// Destructive raw rewrite of every track, then a quick format
    Deep,
}

impl From<ModeArg> for FormatMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Quick => FormatMode::Quick,
            ModeArg::Full => FormatMode::Full,
            ModeArg::Deep => FormatMode::Deep,
        }
    }
}

/// Resolves a drive unit from the command line, or asks interactively.
fn select_unit(explicit: Option<u8>, prompt: &str) -> Result<DriveUnit> {
    if let Some(index) = explicit {
        return DriveUnit::new(index).ok_or_else(|| anyhow!("drive unit must be 0-3"));
    }

    let items: Vec<String> = DriveUnit::all().map(|u| u.to_string()).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()?;

    DriveUnit::new(selection as u8).ok_or_else(|| anyhow!("drive unit must be 0-3"))
}

/// Presents a final "Yes/No" confirmation to the user.
fn confirm_operation(prompt: &str) -> Result<bool> {
    let confirmation = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    Ok(confirmation)
}

/// A byte-denominated progress bar in the house style.
fn byte_bar(total: u64, prefix: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_prefix(prefix);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{prefix:12} [{elapsed_precise}] [{bar:40.green/black}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            )
            .unwrap()
            .progress_chars("■ "),
    );
    pb
}

/// A sector-denominated progress bar for the verify pass.
fn sector_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_prefix("Verifying");
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{prefix:12} [{elapsed_precise}] [{bar:40.magenta/black}] {pos}/{len} sectors ({eta})",
            )
            .unwrap()
            .progress_chars("■ "),
    );
    pb
}

/// Progress and log closures wired to a bar. The log lines go through
/// `println` so they scroll above the live bar.
fn sinks(pb: &ProgressBar) -> (impl FnMut(u64, u64) + '_, impl FnMut(&str) + '_) {
    let progress = {
        let pb = pb.clone();
        move |done: u64, total: u64| {
            pb.set_length(total);
            pb.set_position(done);
        }
    };
    let log = {
        let pb = pb.clone();
        move |line: &str| pb.println(line)
    };
    (progress, log)
}

fn finish(pb: &ProgressBar, status: &str, ok: bool) {
    pb.finish_and_clear();
    if ok {
        println!("{}", style(status).green());
    } else {
        println!("{}", style(status).red().bold());
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Copy { from, to } => {
            let src_unit = select_unit(from, "Select the SOURCE drive")?;
            let dst_unit = select_unit(to, "Select the DESTINATION drive")?;

            println!(
                "{} This will erase all data on {}.",
                style("WARNING:").red().bold(),
                style(dst_unit).cyan()
            );
            if !confirm_operation("Are you sure you want to proceed?")? {
                println!("Copy cancelled.");
                return Ok(());
            }
            println!();

            let pb = byte_bar(DISK_SIZE as u64, "Copying");

            let result = if src_unit == dst_unit {
                let mut drive = FloppyDevice::open(src_unit)?;
                let confirm_swap = || {
                    pb.suspend(|| {
                        confirm_operation("Insert the DESTINATION disk and confirm to continue")
                            .unwrap_or(false)
                    })
                };
                let (progress, log) = sinks(&pb);
                transfer::copy_same_drive(&mut drive, confirm_swap, progress, log)
            } else {
                let mut src = FloppyDevice::open(src_unit)?;
                let mut dst = FloppyDevice::open(dst_unit)?;
                let (progress, log) = sinks(&pb);
                transfer::copy_two_drives(&mut src, &mut dst, progress, log)
                    .map(|()| Outcome::Completed)
            };

            match result {
                Ok(Outcome::Completed) => finish(&pb, "Copy completed.", true),
                Ok(Outcome::Cancelled) => finish(&pb, "Copy cancelled.", true),
                Err(e) => {
                    finish(&pb, "Copy failed.", false);
                    return Err(e.into());
                }
            }
        }
        Commands::Verify { unit } => {
            let unit = select_unit(unit, "Select the drive to VERIFY")?;
            let mut drive = FloppyDevice::open(unit)?;

            let pb = sector_bar(TOTAL_SECTORS as u64);
            let (progress, log) = sinks(&pb);
            match transfer::verify_pass(&mut drive, progress, log) {
                Ok(()) => finish(&pb, "Verify OK.", true),
                Err(e) => {
                    finish(&pb, "Verify FAILED (read error).", false);
                    return Err(e.into());
                }
            }
        }
        Commands::Format {
            mode,
            volume,
            unit,
            installer,
        } => {
            let unit = select_unit(unit, "Select the drive to FORMAT")?;

            println!(
                "{} This will erase all data on {}.",
                style("WARNING:").red().bold(),
                style(unit).cyan()
            );
            if !confirm_operation("Are you sure you want to proceed?")? {
                println!("Format cancelled.");
                return Ok(());
            }
            println!();

            let mode = FormatMode::from(mode);
            let mut drive = FloppyDevice::open(unit)?;
            let mut installer = CommandInstaller::new(installer);

            // Quick and full never report track progress, so the bar
            // only appears for the raw deep pass.
            let pb = if mode == FormatMode::Deep {
                byte_bar(DISK_SIZE as u64, "Formatting")
            } else {
                ProgressBar::hidden()
            };

            let (progress, log) = sinks(&pb);
            match format::run(&mut drive, &mut installer, unit, &volume, mode, progress, log) {
                Ok(report) => {
                    finish(&pb, "Format completed.", true);
                    if !report.failed_tracks.is_empty() {
                        println!(
                            "{} {} track(s) could not be verified: {:?}",
                            style("Note:").yellow(),
                            report.failed_tracks.len(),
                            report.failed_tracks
                        );
                    }
                }
                Err(e) => {
                    finish(&pb, "Format failed.", false);
                    return Err(e.into());
                }
            }
        }
        Commands::Read { image, unit } => {
            let unit = select_unit(unit, "Select the SOURCE drive")?;
            let image = match image {
                Some(path) => path,
                None => read::unique_image_path(&env::current_dir()?, unit)
                    .ok_or_else(|| anyhow!("cannot build an output path in this directory"))?,
            };
            println!("Saving to {}", style(image.display()).cyan());

            let mut drive = FloppyDevice::open(unit)?;
            let pb = byte_bar(DISK_SIZE as u64, "Reading");
            let (progress, log) = sinks(&pb);
            match read::run(&mut drive, &image, progress, log) {
                Ok(()) => finish(&pb, "ADF saved.", true),
                Err(e) => {
                    finish(&pb, "ADF read failed.", false);
                    return Err(e.into());
                }
            }
        }
        Commands::Write { image, unit } => {
            let unit = select_unit(unit, "Select the DESTINATION drive")?;

            println!(
                "{} This will erase all data on {}.",
                style("WARNING:").red().bold(),
                style(unit).cyan()
            );
            println!("  Image: {}", style(image.display()).cyan());
            if !confirm_operation("Are you sure you want to proceed?")? {
                println!("Write cancelled.");
                return Ok(());
            }
            println!();

            let mut drive = FloppyDevice::open(unit)?;
            let pb = byte_bar(DISK_SIZE as u64, "Writing");
            let (progress, log) = sinks(&pb);
            match write::run(&mut drive, &image, progress, log) {
                Ok(()) => finish(&pb, "ADF written to disk.", true),
                Err(e) => {
                    finish(&pb, "ADF write failed.", false);
                    return Err(e.into());
                }
            }
        }
        Commands::Check { image } => {
            let pb = byte_bar(0, "Checking");
            let (progress, log) = sinks(&pb);
            match crc32::checksum_file(&image, progress, log) {
                Ok(crc) => {
                    pb.finish_and_clear();
                    println!("CRC32: {crc:08x}");
                    let len = std::fs::metadata(&image)?.len();
                    if len == DISK_SIZE as u64 {
                        println!("{}", style("Image looks OK (size+CRC computed).").green());
                    } else {
                        println!("{}", style("Image checked (non-standard size).").yellow());
                    }
                }
                Err(e) => {
                    finish(&pb, "Image check failed.", false);
                    return Err(e.into());
                }
            }
        }
        Commands::List => {
            let drives = platform::list_drives();
            if drives.is_empty() {
                println!("No floppy drives found.");
                return Ok(());
            }

            println!("Found {} floppy drive(s):", drives.len());
            println!("\n  {:<6} {}", "UNIT", "DEVICE");
            println!("  {:-<6} {:-<20}", "", "");
            for unit in drives {
                println!("  {:<6} {}", unit.to_string(), platform::drive_path(unit).display());
            }
        }
    }

    Ok(())
}
