//! Crash-safe on-disk replacement of the running executable.
//!
//! The live binary `P`, the staged replacement `.P.new`, and the displaced
//! prior version `.P.old` all live in the same directory so every rename
//! stays within one filesystem. At every quiescent moment either `P` or
//! `.P.old` holds a runnable executable.

use crate::error::UpdateError;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Staged replacement path: `.{binary}.new` next to the live binary.
pub(crate) fn staged_path(exec_path: &Path) -> PathBuf {
    dotted(exec_path, "new")
}

/// Displaced prior version: `.{binary}.old`.
pub(crate) fn displaced_path(exec_path: &Path) -> PathBuf {
    dotted(exec_path, "old")
}

fn dotted(exec_path: &Path, suffix: &str) -> PathBuf {
    let dir = exec_path.parent().unwrap_or_else(|| Path::new("."));
    let name = exec_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!(".{name}.{suffix}"))
}

/// Write verified bytes to the stage file with the executable bit set.
///
/// The handle is closed before returning; Windows refuses to rename a file
/// that is still open. A stale stage from an earlier crashed run is
/// truncated over.
pub(crate) fn stage(exec_path: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
    let staged = staged_path(exec_path);
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o755);
    }
    let mut file = options.open(&staged)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    Ok(staged)
}

/// The three-rename critical section.
///
/// 1. unlink any leftover `.{binary}.old`
/// 2. `{binary}` → `.{binary}.old`
/// 3. `.{binary}.new` → `{binary}`
///
/// A failure in step 2 leaves the live binary untouched. A failure in step 3
/// restores the displaced binary; if that restore also fails the error is
/// unrecoverable and the caller must stop.
pub(crate) fn swap(exec_path: &Path) -> Result<(), UpdateError> {
    swap_with(exec_path, |from, to| fs::rename(from, to))
}

fn swap_with<R>(exec_path: &Path, rename: R) -> Result<(), UpdateError>
where
    R: Fn(&Path, &Path) -> io::Result<()>,
{
    let staged = staged_path(exec_path);
    let displaced = displaced_path(exec_path);

    // Windows cannot delete the old image while the process still runs and
    // refuses to rename onto an existing file, so clear any leftover first.
    let _ = fs::remove_file(&displaced);

    if let Err(source) = rename(exec_path, &displaced) {
        return Err(UpdateError::SwapRecovered { source });
    }

    if let Err(source) = rename(&staged, exec_path) {
        return match rename(&displaced, exec_path) {
            Ok(()) => Err(UpdateError::SwapRecovered { source }),
            Err(recover) => Err(UpdateError::SwapUnrecoverable { source, recover }),
        };
    }

    if let Err(err) = fs::remove_file(&displaced) {
        // The prior image may still back the running process; hide it
        // instead of failing the update.
        warn!(
            path = %displaced.display(),
            error = %err,
            "could not remove displaced binary, hiding it"
        );
        if let Err(err) = hide(&displaced) {
            warn!(path = %displaced.display(), error = %err, "could not hide displaced binary");
        }
    }

    Ok(())
}

#[cfg(unix)]
fn hide(_path: &Path) -> io::Result<()> {
    // The displaced name is already dot-prefixed.
    Ok(())
}

#[cfg(windows)]
fn hide(path: &Path) -> io::Result<()> {
    use std::iter::once;
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{SetFileAttributesW, FILE_ATTRIBUTE_HIDDEN};

    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(once(0)).collect();
    // SAFETY: `wide` is a NUL-terminated UTF-16 path that outlives the call.
    let ok = unsafe { SetFileAttributesW(wide.as_ptr(), FILE_ATTRIBUTE_HIDDEN) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
