//! Output stream factory: directory checks and append-mode opening

use logmend_core::{Error, Result};
use std::fs::{self, File, Metadata, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk identity of an open log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    pub fn of(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    #[cfg(not(unix))]
    pub fn of(_meta: &Metadata) -> Self {
        Self {}
    }
}

/// A freshly opened append-mode file
#[derive(Debug)]
pub struct OpenedFile {
    pub file: File,
    pub identity: FileIdentity,
}

/// Create (if asked) and validate the directory that will hold `path`.
///
/// Returns the directory on success.
pub fn prepare_directory(path: &Path, create_directory: bool) -> Result<PathBuf> {
    if path.file_name().is_none() {
        return Err(Error::InvalidPath(path.to_path_buf()));
    }
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => return Err(Error::InvalidPath(path.to_path_buf())),
    };

    if create_directory {
        if let Err(e) = fs::create_dir_all(dir) {
            debug!("Failed to create log directory {}: {}", dir.display(), e);
            return Err(Error::DirectoryNotWritable(dir.to_path_buf()));
        }
    }

    ensure_writable(dir)?;
    Ok(dir.to_path_buf())
}

/// Fail with `DirectoryNotWritable` unless `dir` is an existing, writable directory
pub fn ensure_writable(dir: &Path) -> Result<()> {
    let not_writable = || Error::DirectoryNotWritable(dir.to_path_buf());

    let meta = fs::metadata(dir).map_err(|_| not_writable())?;
    if !meta.is_dir() {
        return Err(not_writable());
    }

    #[cfg(unix)]
    nix::unistd::access(dir, nix::unistd::AccessFlags::W_OK).map_err(|_| not_writable())?;

    #[cfg(not(unix))]
    if meta.permissions().readonly() {
        return Err(not_writable());
    }

    Ok(())
}

/// Open `path` for appending after validating its directory
pub fn open_append(path: &Path, create_directory: bool) -> Result<OpenedFile> {
    prepare_directory(path, create_directory)?;

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let identity = FileIdentity::of(&file.metadata()?);

    debug!("Opened log file: {}", path.display());
    Ok(OpenedFile { file, identity })
}

/// Whether `path` no longer refers to the file identified by `identity`
pub fn is_disrupted(path: &Path, identity: FileIdentity) -> bool {
    match fs::metadata(path) {
        Ok(meta) => FileIdentity::of(&meta) != identity,
        Err(_) => true,
    }
}
