//! Copy transform support (C9), grounded on `generic/copy.go`'s
//! `doCopyFile` and rebase handling.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, BuildErrorKind, Result};

/// Strip `rebase_from` as a path prefix of `path` if it matches; otherwise
/// fall back to the path's basename. The original's
/// `ForceToRelativeAndRebase` was not present in the retrieved source, so
/// this fallback is a documented assumption (see DESIGN.md): any source
/// path outside the rebase prefix still lands in the destination
/// directory under its own basename rather than failing the build.
pub fn rebase_tail(path: &Path, rebase_from: &str) -> PathBuf {
    if rebase_from.is_empty() {
        return path.to_path_buf();
    }
    match path.strip_prefix(rebase_from) {
        Ok(tail) => tail.to_path_buf(),
        Err(_) => path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.to_path_buf()),
    }
}

/// Copy a single file, preserving the source's permission bits, mirroring
/// `doCopyFile`'s `info.Mode() & 0777` carry-over.
pub fn copy_file(source: &Path, destination: &Path, destination_is_dir: bool) -> Result<()> {
    let dest_path = if destination_is_dir {
        let name = source.file_name().ok_or_else(|| {
            BuildError::new(BuildErrorKind::FileCopyIO {
                source: source.to_path_buf(),
                destination: destination.to_path_buf(),
                reason: "source path has no file name".to_string(),
            })
        })?;
        destination.join(name)
    } else {
        destination.to_path_buf()
    };

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BuildError::new(BuildErrorKind::CannotCreateDirectory { path: parent.to_path_buf(), source: e })
        })?;
    }

    let metadata = fs::metadata(source).map_err(|e| {
        BuildError::new(BuildErrorKind::FileCopyIO {
            source: source.to_path_buf(),
            destination: dest_path.clone(),
            reason: e.to_string(),
        })
    })?;

    if let Err(e) = fs::copy(source, &dest_path) {
        let _ = fs::remove_file(&dest_path);
        return Err(BuildError::new(BuildErrorKind::FileCopyIO {
            source: source.to_path_buf(),
            destination: dest_path.clone(),
            reason: e.to_string(),
        }));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode() & 0o777;
        let _ = fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode));
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
    }

    Ok(())
}
