//! Whole-file bundle I/O.
//!
//! Bundles are read fully into memory and written back in a single step:
//! the new bytes go to a temporary file in the destination directory which
//! is then renamed over the target. A failed write leaves the original file
//! untouched.
//!
//! Nothing here locks the file. Concurrent operations on the same bundle
//! race at the filesystem level; callers must serialize them.

use crate::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Read a bundle, mapping a missing file to [`Error::NotFound`].
pub fn read_bundle(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is a directory, not a bundle", path.display()),
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found("bundle", path))
        }
        _ => {}
    }
    Ok(fs::read(path)?)
}

/// Replace the contents of `path` with `bytes` atomically.
///
/// Permissions of an existing file are carried over to the replacement.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }

    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    debug!(path = %path.display(), len = bytes.len(), "wrote bundle");
    Ok(())
}
