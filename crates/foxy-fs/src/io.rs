//! File operations used for manifests, locks and staging directories.
//!
//! Writes go through a sibling temp file that is locked, synced and renamed
//! over the target, so readers never observe a half-written manifest.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, NormalizedPath, Result};

/// `.<name>.<pid>.tmp` next to `target`.
fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Replace the content of `path`, creating parent directories as needed.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let target = path.to_native();
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let temp = temp_sibling(&target);
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp)
        .map_err(|e| Error::io(&temp, e))?;

    let lock_failed = |_| Error::LockFailed {
        path: target.clone(),
    };
    file.lock_exclusive().map_err(lock_failed)?;
    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|e| Error::io(&temp, e))?;
    file.unlock().map_err(lock_failed)?;

    fs::rename(&temp, &target).map_err(|e| Error::io(&target, e))
}

/// Read a UTF-8 file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let file = path.to_native();
    fs::read_to_string(&file).map_err(|e| Error::io(&file, e))
}

/// Read raw bytes, returning `None` when the file does not exist.
pub fn read_optional(path: &NormalizedPath) -> Result<Option<Vec<u8>>> {
    let native_path = path.to_native();
    if !native_path.is_file() {
        return Ok(None);
    }
    match fs::read(&native_path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(&native_path, e)),
    }
}

/// [`write_atomic`] for text.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Remove a file or a directory tree. Missing paths are not an error.
pub fn remove_path(path: &NormalizedPath) -> Result<()> {
    let native_path = path.to_native();
    let metadata = match fs::symlink_metadata(&native_path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(&native_path, e)),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(&native_path)
    } else {
        fs::remove_file(&native_path)
    };

    match result {
        Ok(()) => {
            tracing::debug!(path = %path, "Removed path");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(&native_path, e)),
    }
}

/// Copy a file, creating the destination's parent directories.
pub fn copy_file(from: &NormalizedPath, to: &NormalizedPath) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent.to_native()).map_err(|e| Error::io(parent.to_native(), e))?;
    }
    fs::copy(from.to_native(), to.to_native()).map_err(|e| Error::io(from.to_native(), e))?;
    Ok(())
}

/// Canonicalize a path without the `\\?\` prefix on Windows.
pub fn canonicalize(path: &NormalizedPath) -> Result<NormalizedPath> {
    let native_path = path.to_native();
    dunce::canonicalize(&native_path)
        .map(NormalizedPath::from)
        .map_err(|e| Error::io(&native_path, e))
}
