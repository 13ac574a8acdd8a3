//! Bundle archive creation.
//!
//! Zips a directory into unsigned bundle content. This is the producer side
//! of the signing pipeline: the signer treats its output as opaque bytes and
//! never looks inside the archive.
//!
//! Entries are written in file-name order so the same tree always yields
//! the same entry sequence.
//!
//! # Examples
//!
//! ```no_run
//! use mcpb_sign::archive::{pack_directory, CompressionLevel};
//!
//! let summary = pack_directory("my-server", "my-server.mcpb", CompressionLevel::DEFAULT)?;
//! println!("{} files", summary.files);
//! # Ok::<(), mcpb_sign::Error>(())
//! ```

use crate::io::write_atomic;
use crate::{Error, Result};
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// ZIP compression level for bundle creation.
///
/// # Examples
///
/// ```
/// use mcpb_sign::archive::CompressionLevel;
///
/// let custom = CompressionLevel::new(3);
/// assert_eq!(custom.level(), 3);
/// assert_eq!(CompressionLevel::new(42).level(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// No compression (level 0).
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Default compression (level 6).
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum compression (level 9).
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9.
    ///
    /// Values greater than 9 are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// Returns the compression level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }

    fn file_options(self) -> SimpleFileOptions {
        if self.0 == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(self.0)))
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// What [`pack_directory`] put into the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackSummary {
    /// Regular files and symlinks.
    pub files: usize,
    /// Directory entries.
    pub directories: usize,
    /// Size of the finished archive.
    pub archive_len: u64,
}

/// Zip the contents of `source_dir` into `output_path`.
///
/// Paths inside the archive are relative to `source_dir` and use `/`
/// separators. Symlinks are stored as links, Unix permissions are kept, and
/// `output_path` itself is skipped when it lies inside `source_dir`. The
/// archive is assembled in memory and written in one step.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if `source_dir` does not exist,
/// [`Error::Io`] if it is not a directory or a file cannot be read, and
/// [`Error::Zip`] if the archive cannot be written.
pub fn pack_directory(
    source_dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    compression_level: CompressionLevel,
) -> Result<PackSummary> {
    let source_dir = source_dir.as_ref();
    let output_path = output_path.as_ref();

    if !source_dir.exists() {
        return Err(Error::not_found("source directory", source_dir));
    }
    if !source_dir.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Not a directory: {}", source_dir.display()),
        )));
    }

    let skip = output_path.canonicalize().ok();
    let options = compression_level.file_options();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut summary = PackSummary::default();

    for entry in WalkDir::new(source_dir)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
    {
        let entry = entry
            .map_err(|e| Error::Io(io::Error::other(format!("Failed to walk directory: {e}"))))?;
        let path = entry.path();

        if skip.is_some() && path.canonicalize().ok() == skip {
            debug!(path = %path.display(), "skipping output file inside source directory");
            continue;
        }

        let relative = path.strip_prefix(source_dir).map_err(|_| {
            Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Failed to compute relative path",
            ))
        })?;
        let archive_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let metadata = fs::symlink_metadata(path)?;

        if metadata.is_dir() {
            zip.add_directory(format!("{archive_path}/"), options)?;
            summary.directories += 1;
        } else if metadata.file_type().is_symlink() {
            let target = fs::read_link(path)?;
            zip.add_symlink(archive_path, target.to_string_lossy(), options)?;
            summary.files += 1;
        } else {
            #[cfg(unix)]
            let options = {
                use std::os::unix::fs::PermissionsExt;
                options.unix_permissions(metadata.permissions().mode())
            };

            zip.start_file(archive_path, options)?;
            zip.write_all(&fs::read(path)?)?;
            summary.files += 1;
        }
    }

    let bytes = zip.finish()?.into_inner();
    summary.archive_len = bytes.len() as u64;
    write_atomic(output_path, &bytes)?;

    info!(
        source = %source_dir.display(),
        output = %output_path.display(),
        files = summary.files,
        bytes = summary.archive_len,
        "packed bundle"
    );
    Ok(summary)
}
