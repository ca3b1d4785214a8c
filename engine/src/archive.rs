//! Archive detection and extraction.
//!
//! Supported kinds are picked by literal, case-sensitive file name suffix:
//! `.zip`, `.tar` and `.gz`. A `.gz` stream is decompressed to a single file;
//! when that file turns out to be a tar archive it is unpacked as well.
//!
//! Every entry path is checked before anything is written. Absolute paths and
//! `..` components are rejected with `ExtractError::UnsafePath`.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::debug;
use zip::ZipArchive;

use crate::error::ExtractError;
use crate::fs_ops;

const TAR_BLOCK_SIZE: usize = 512;

/// Archive formats the pipeline knows how to unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    Gzip,
}

impl ArchiveKind {
    /// Detect the kind from the file name suffix. No content sniffing.
    pub fn from_name(name: &str) -> Option<Self> {
        [ArchiveKind::Zip, ArchiveKind::Tar, ArchiveKind::Gzip]
            .into_iter()
            .find(|kind| name.ends_with(kind.suffix()))
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => ".zip",
            ArchiveKind::Tar => ".tar",
            ArchiveKind::Gzip => ".gz",
        }
    }

    /// Name of the extraction subfolder: the archive name minus its suffix.
    ///
    /// `bundle.tar.gz` extracts into `bundle.tar/`. Returns None unless the
    /// stem is a single normal path component, so `...zip` (stem `..`) and
    /// `..tar` (stem `.`) have no extraction folder.
    pub fn stem<'a>(&self, name: &'a str) -> Option<&'a str> {
        let stem = name.strip_suffix(self.suffix())?;
        let mut components = Path::new(stem).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(segment)), None) if segment == stem => Some(stem),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveKind::Zip => write!(f, "zip"),
            ArchiveKind::Tar => write!(f, "tar"),
            ArchiveKind::Gzip => write!(f, "gzip"),
        }
    }
}

/// Extract `archive` (named `name`) into a subfolder of `parent_dir`.
///
/// Returns the extraction subfolder.
pub fn extract_into(
    archive: &Path,
    name: &str,
    kind: ArchiveKind,
    parent_dir: &Path,
) -> Result<PathBuf, ExtractError> {
    let stem = kind.stem(name).ok_or_else(|| ExtractError::InvalidName {
        name: name.to_string(),
    })?;
    let target = parent_dir.join(stem);
    fs_ops::ensure_dir(&target)?;

    debug!(archive = %archive.display(), target = %target.display(), %kind, "extracting");
    match kind {
        ArchiveKind::Zip => extract_zip(archive, &target)?,
        ArchiveKind::Tar => extract_tar(archive, &target)?,
        ArchiveKind::Gzip => {
            extract_gzip(archive, stem, &target)?;
        }
    }
    Ok(target)
}

/// Unpack every entry of a zip archive into `target`, keeping relative paths.
pub fn extract_zip(archive: &Path, target: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;

    let mut planned = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let entry = zip.by_index(index)?;
        let relative = sanitize_entry_path(Path::new(entry.name()))?;
        planned.push((relative, entry.is_dir()));
    }

    for (index, (relative, is_dir)) in planned.into_iter().enumerate() {
        if relative.as_os_str().is_empty() {
            continue;
        }
        let destination = target.join(&relative);

        if is_dir {
            fs_ops::ensure_dir(&destination)?;
            continue;
        }
        if let Some(parent) = destination.parent() {
            fs_ops::ensure_dir(parent)?;
        }

        let mut entry = zip.by_index(index)?;
        let mut output = File::create(&destination)?;
        io::copy(&mut entry, &mut output).map_err(classify_read_error)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            // keep the owner able to overwrite on a later run
            let perms = fs::Permissions::from_mode((mode & 0o777) | 0o600);
            fs::set_permissions(&destination, perms)?;
        }
    }

    Ok(())
}

/// Unpack every entry of a tar archive into `target`, keeping relative paths.
pub fn extract_tar(archive: &Path, target: &Path) -> Result<(), ExtractError> {
    // First pass only reads headers so nothing is written if any entry is unsafe
    let mut tar = tar::Archive::new(BufReader::new(File::open(archive)?));
    for entry in tar.entries().map_err(ExtractError::corrupt)? {
        let entry = entry.map_err(ExtractError::corrupt)?;
        let path = entry.path().map_err(ExtractError::corrupt)?;
        sanitize_entry_path(&path)?;

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            if let Some(link) = entry.link_name().map_err(ExtractError::corrupt)? {
                sanitize_entry_path(&link)?;
            }
        }
    }

    let mut tar = tar::Archive::new(BufReader::new(File::open(archive)?));
    tar.set_preserve_mtime(true);
    for entry in tar.entries().map_err(ExtractError::corrupt)? {
        let mut entry = entry.map_err(ExtractError::corrupt)?;
        if !entry.unpack_in(target)? {
            let entry_name = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return Err(ExtractError::UnsafePath { entry: entry_name });
        }
    }

    Ok(())
}

/// Decompress a gzip file into `target/<stem basename>`, then unpack the
/// result too if it is a tar archive. The decompressed file is kept.
pub fn extract_gzip(archive: &Path, stem: &str, target: &Path) -> Result<PathBuf, ExtractError> {
    let inner_name = Path::new(stem)
        .file_name()
        .ok_or_else(|| ExtractError::InvalidName {
            name: stem.to_string(),
        })?;
    let inner = target.join(inner_name);

    let mut decoder = MultiGzDecoder::new(BufReader::new(File::open(archive)?));
    let mut output = File::create(&inner)?;
    if let Err(e) = io::copy(&mut decoder, &mut output) {
        drop(output);
        let _ = fs::remove_file(&inner);
        return Err(classify_read_error(e));
    }
    drop(output);

    if looks_like_tar(&inner)? {
        debug!(path = %inner.display(), "decompressed stream is a tar archive");
        extract_tar(&inner, target)?;
    }
    Ok(inner)
}

/// Check whether `path` starts with a tar header block with a valid checksum.
pub fn looks_like_tar(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut block = [0u8; TAR_BLOCK_SIZE];
    match file.read_exact(&mut block) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
        Err(e) => return Err(e),
    }
    if block.iter().all(|b| *b == 0) {
        return Ok(false);
    }

    let header = tar::Header::from_byte_slice(&block);
    let recorded = match header.cksum() {
        Ok(sum) => sum,
        Err(_) => return Ok(false),
    };
    let mut expected = header.clone();
    expected.set_cksum();
    Ok(expected.cksum().ok() == Some(recorded))
}

/// Turn an archive entry path into a relative path that stays inside the
/// extraction folder.
pub fn sanitize_entry_path(entry: &Path) -> Result<PathBuf, ExtractError> {
    let unsafe_path = || ExtractError::UnsafePath {
        entry: entry.display().to_string(),
    };
    if entry.is_absolute() {
        return Err(unsafe_path());
    }

    let mut sanitized = PathBuf::new();
    for component in entry.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path());
            }
        }
    }
    Ok(sanitized)
}

/// Decoder failures surface as InvalidData/InvalidInput; treat those as a
/// corrupt archive rather than a filesystem problem.
fn classify_read_error(err: io::Error) -> ExtractError {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            ExtractError::corrupt(err)
        }
        _ => ExtractError::Io { source: err },
    }
}
