//! Error types for the aeris station core.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all aeris operations.
///
/// This enum covers the error conditions that propagate out of the station
/// core: log rotation, artifact naming, data-directory management, and
/// configuration. Clock source failures ([`ClockError`]) stay inside the
/// reconciler, which treats an unreadable source as implausible data for
/// the cycle rather than an error. Nothing in this crate escalates to a
/// process abort: every failure here is reported to the caller, which
/// typically logs it and retries on the next cycle.
#[derive(Error, Debug)]
pub enum AerisError {
    /// Error during log file lifecycle operations (begin, append, rotate).
    #[error("log file error: {0}")]
    Log(#[from] LogError),

    /// Error building a dated sequence path for an artifact file.
    #[error("sequence naming error: {0}")]
    Namer(#[from] NamerError),

    /// Error opening or probing the station data directory.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// Error loading or validating station configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur when reading or writing a clock source.
#[derive(Error, Debug)]
pub enum ClockError {
    /// The clock source could not produce a reading this cycle.
    ///
    /// Reconciliation treats an unavailable source as implausible for the
    /// cycle and defers correction to the next cycle or to network time.
    #[error("clock source '{source_name}' is unavailable: {source}")]
    Unavailable {
        /// Name of the clock source that failed.
        source_name: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing a new time value to the clock source failed.
    #[error("failed to write clock source '{source_name}': {source}")]
    WriteFailed {
        /// Name of the clock source that failed.
        source_name: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A reading held calendar components that do not form a valid date.
    #[error("clock source '{source_name}' produced an invalid reading")]
    InvalidReading {
        /// Name of the clock source that produced the reading.
        source_name: &'static str,
    },
}

/// Errors that can occur during rotating log file operations.
#[derive(Error, Debug)]
pub enum LogError {
    /// Creating a fresh current file (with its begin marker) failed.
    #[error("failed to create log file '{}': {source}", path.display())]
    Create {
        /// The file path that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Appending a record to the current file failed.
    ///
    /// Transient: the caller skips this cycle and retries on the next one.
    #[error("failed to append to log file '{}': {source}", path.display())]
    Append {
        /// The file path that could not be appended to.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the format's end marker failed.
    #[error("failed to finish log file '{}': {source}", path.display())]
    Finish {
        /// The file path that could not be finished.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading file metadata (for the resume-on-boot check) failed.
    #[error("failed to stat log file '{}': {source}", path.display())]
    Stat {
        /// The file path that could not be stat'ed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Renaming the current file to its dated archive name failed.
    #[error("failed to rename '{}' to '{}': {source}", from.display(), to.display())]
    Rename {
        /// The source path of the rename.
        from: PathBuf,
        /// The destination path of the rename.
        to: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Every candidate archive name for the date, including all
    /// disambiguating suffixes, already exists.
    #[error("all archive names for '{}' are taken", path.display())]
    ArchiveNamesExhausted {
        /// The base archive path whose variants were all taken.
        path: PathBuf,
    },
}

/// Errors that can occur while building a dated sequence path.
#[derive(Error, Debug)]
pub enum NamerError {
    /// The year/month/day directory chain could not be created or accessed.
    #[error("failed to access day directory '{}': {source}", path.display())]
    NoDirectory {
        /// The directory path that could not be created or accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Listing the day directory to find the newest sequence number failed.
    #[error("failed to scan day directory '{}': {source}", path.display())]
    Scan {
        /// The directory path that could not be listed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The per-day sequence space (001..=999) is used up.
    #[error("sequence numbers exhausted in '{}'", path.display())]
    SequenceExhausted {
        /// The day directory whose sequence space is full.
        path: PathBuf,
    },
}

/// Errors that can occur when opening or probing the station data directory.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// A directory could not be created or accessed.
    #[error("failed to access data directory '{}': {source}", path.display())]
    DirectoryAccess {
        /// The path that could not be accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The metadata file (meta.json) is corrupted or invalid.
    #[error("corrupted layout metadata: {reason}")]
    CorruptedMetadata {
        /// Description of what was invalid about the metadata.
        reason: String,
    },

    /// The metadata file declares an unsupported layout version.
    #[error("unsupported layout version: expected {expected}, found {found}")]
    VersionMismatch {
        /// The version this build understands.
        expected: u32,
        /// The version found on disk.
        found: u32,
    },

    /// Failed to serialize or deserialize layout metadata.
    #[error("failed to serialize layout metadata: {0}")]
    MetadataSerialize(#[from] serde_json::Error),

    /// The storage-health probe could not write to the data directory.
    #[error("storage probe failed at '{}': {source}", path.display())]
    ProbeFailed {
        /// The probe file path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when loading or validating station configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed as JSON.
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue {
        /// The offending field name.
        field: &'static str,
        /// Why the value is invalid.
        reason: String,
    },
}

/// Type alias for `Result<T, AerisError>`.
pub type Result<T> = std::result::Result<T, AerisError>;
