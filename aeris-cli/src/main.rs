//! CLI for inspecting aeris station data directories.
//!
//! Provides commands for summarizing a station's logs and image archive
//! and for validating bracketed structured logs.

use std::fs;
use std::path::{Path, PathBuf};

use aeris::StationLayout;
use clap::{Parser, Subcommand};

/// aeris — environmental station data directory CLI.
#[derive(Parser)]
#[command(name = "aeris", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Summarize a station data directory: current logs, archives, images.
    Info {
        /// Path to the station data directory.
        data_dir: PathBuf,
    },

    /// List dated log archives (plain and averaged).
    Archives {
        /// Path to the station data directory.
        data_dir: PathBuf,
    },

    /// Validate a bracketed structured log file.
    CheckJson {
        /// Path to a `.JSO` log file (current or archived).
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { data_dir } => cmd_info(&data_dir),
        Commands::Archives { data_dir } => cmd_archives(&data_dir),
        Commands::CheckJson { file } => cmd_check_json(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `aeris info <data_dir>`.
fn cmd_info(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let layout = open_existing(data_dir)?;

    println!("Station: {}", layout.root().display());
    println!();

    for (label, dir) in [("Logs", layout.logs_dir()), ("Averaged logs", layout.avg_logs_dir())] {
        println!("{label}: {}", dir.display());
        let mut archives = 0;
        for name in dir_file_names(dir)? {
            if name.starts_with("CURRENT.") {
                let meta = fs::metadata(dir.join(&name))?;
                let modified: chrono::DateTime<chrono::Local> = meta.modified()?.into();
                println!(
                    "  {name}  ({} bytes, modified {})",
                    meta.len(),
                    modified.format("%Y-%m-%d %H:%M:%S")
                );
            } else if !name.starts_with('.') {
                archives += 1;
            }
        }
        println!("  {archives} dated archive(s)");
        println!();
    }

    let (days, images) = count_images(layout.images_dir())?;
    println!("Images: {}", layout.images_dir().display());
    println!("  {images} image(s) across {days} day(s)");

    Ok(())
}

/// Implements `aeris archives <data_dir>`.
fn cmd_archives(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let layout = open_existing(data_dir)?;

    for (label, dir) in [("Logs", layout.logs_dir()), ("Averaged logs", layout.avg_logs_dir())] {
        let mut archives: Vec<String> = dir_file_names(dir)?
            .into_iter()
            .filter(|name| !name.starts_with("CURRENT.") && !name.starts_with('.'))
            .collect();
        archives.sort();

        println!("{label} ({}):", dir.display());
        if archives.is_empty() {
            println!("  (none)");
        }
        for name in archives {
            let size = fs::metadata(dir.join(&name))?.len();
            println!("  {name}  {size} bytes");
        }
        println!();
    }

    Ok(())
}

/// Implements `aeris check-json <file>`.
///
/// A still-current file has no closing bracket yet; its trailing record
/// separator is replaced the same way rotation would before parsing.
fn cmd_check_json(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(file)?;

    let closed = if raw.ends_with(']') {
        raw
    } else if let Some(stripped) = raw.strip_suffix(",\n") {
        format!("{stripped}]")
    } else if raw == "[" {
        "[]".to_string()
    } else {
        format!("{raw}]")
    };

    let value: serde_json::Value = serde_json::from_str(&closed)?;
    let records = value
        .as_array()
        .ok_or("log does not contain a JSON array")?;

    println!("{}: valid, {} record(s)", file.display(), records.len());
    Ok(())
}

/// Opens a layout only if a station already exists there.
fn open_existing(data_dir: &Path) -> Result<StationLayout, Box<dyn std::error::Error>> {
    if !data_dir.join("meta.json").exists() {
        return Err(format!("No station data found at '{}'", data_dir.display()).into());
    }
    Ok(StationLayout::open(data_dir)?)
}

/// File names (not directories) directly inside `dir`.
fn dir_file_names(dir: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Counts day directories and image files in the dated archive.
fn count_images(images_dir: &Path) -> Result<(usize, usize), Box<dyn std::error::Error>> {
    let mut days = 0;
    let mut images = 0;

    // root/YYYY/MM/DD/NNN.jpg
    for year in read_subdirs(images_dir)? {
        for month in read_subdirs(&year)? {
            for day in read_subdirs(&month)? {
                days += 1;
                images += fs::read_dir(&day)?.count();
            }
        }
    }
    Ok((days, images))
}

fn read_subdirs(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut subdirs = Vec::new();
    if !dir.exists() {
        return Ok(subdirs);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            subdirs.push(entry.path());
        }
    }
    Ok(subdirs)
}
