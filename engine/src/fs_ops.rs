//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Listing the regular files of a directory (no recursion)
//! - Copying files with modification time preservation
//! - Moving files, across filesystems if needed
//! - Creating directories idempotently

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::model::{FileEntry, NO_EXTENSION};

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;

/// List the regular files directly inside `dir`, sorted by name.
///
/// A missing or unreadable directory yields an empty list; the caller decides
/// how to surface that. Entries whose metadata cannot be read are skipped.
pub fn list_files(dir: &Path) -> Vec<FileEntry> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list directory");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };

        // fs::metadata follows symlinks, so a link to a file counts as a file
        let metadata = match fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "skipping entry");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        files.push(FileEntry {
            extension: extension_label(&name),
            modified_at: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size_bytes: metadata.len(),
            name,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
}

/// Uppercased suffix after the last '.', or `NONE`.
///
/// Dotfiles such as `.env` and names ending in '.' have no extension.
pub fn extension_label(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_uppercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| NO_EXTENSION.to_string())
}

/// Format a byte count for display: GB at or above 2^30 bytes, MB below.
pub fn format_size(bytes: u64) -> String {
    if bytes >= GIB {
        format!("{:.2} GB", bytes as f64 / GIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}

/// Create `path` and its parents if missing.
///
/// Succeeds when the directory already exists, including when another process
/// created it concurrently. Fails if `path` exists but is not a directory.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a directory", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(path),
        Err(e) => Err(e),
    }
}

/// Copy a file from `src` to `dst`, preserving its modification time.
///
/// The destination is overwritten if it is a file, unless it is the source
/// itself. Returns the number of bytes copied.
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> io::Result<u64> {
    if is_same_file(src, dst)? {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is the source file itself", dst.display()),
        ));
    }

    let mut src_file = fs::File::open(src)?;
    let src_mtime = src_file.metadata()?.modified().ok();

    let mut dst_file = fs::File::create(dst)?;
    let bytes_copied = io::copy(&mut src_file, &mut dst_file)?;
    dst_file.sync_all()?;
    drop(dst_file);

    if let Some(mtime) = src_mtime {
        if let Err(e) = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime)) {
            debug!(path = %dst.display(), error = %e, "could not preserve modification time");
        }
    }

    Ok(bytes_copied)
}

/// Returns true if `a` and `b` both exist and resolve to the same file.
pub fn is_same_file(a: &Path, b: &Path) -> io::Result<bool> {
    let b = match fs::canonicalize(b) {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    Ok(fs::canonicalize(a)? == b)
}

/// Move `src` to `dst`.
///
/// Tries a rename first; if that fails (for example across filesystems) the
/// file is copied and the source removed. The source is only removed after
/// the copy has completed.
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(
                src = %src.display(),
                dst = %dst.display(),
                error = %rename_err,
                "rename failed, falling back to copy and delete"
            );
            copy_file_with_metadata(src, dst)?;
            if let Err(e) = fs::remove_file(src) {
                // Leave the original where it was rather than keep two copies
                let _ = fs::remove_file(dst);
                return Err(e);
            }
            Ok(())
        }
    }
}
