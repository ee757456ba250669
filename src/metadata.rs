//! Metadata propagation from the file being edited to its replacement.
//!
//! Permission bits and timestamps are always copied. Ownership is copied on a
//! best-effort basis: an unprivileged process usually cannot give a file away,
//! so the owner falls back to staying put, then the group does too.

use filetime::FileTime;
use std::fs;
use std::io;
use std::path::Path;

/// Copy permissions, timestamps and (where possible) ownership from `from` to `to`.
///
/// Both paths must exist.
pub fn copy_metadata(from: &Path, to: &Path) -> io::Result<()> {
    let source = fs::metadata(from)?;

    let atime = FileTime::from_last_access_time(&source);
    let mtime = FileTime::from_last_modification_time(&source);
    filetime::set_file_times(to, atime, mtime)?;

    fs::set_permissions(to, source.permissions())?;

    copy_ownership(&source, to)
}

/// Ownership failures that mean "not allowed here" rather than "broken".
#[cfg_attr(not(unix), allow(dead_code))]
fn is_expected_ownership_failure(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::Unsupported
    )
}

#[cfg(unix)]
fn copy_ownership(source: &fs::Metadata, to: &Path) -> io::Result<()> {
    use std::os::unix::fs::{chown, MetadataExt};

    let (uid, gid) = (source.uid(), source.gid());

    match chown(to, Some(uid), Some(gid)) {
        Ok(()) => return Ok(()),
        Err(e) if is_expected_ownership_failure(&e) => {
            tracing::debug!(
                "Cannot set owner {}:{} on {}, retrying group only: {}",
                uid,
                gid,
                to.display(),
                e
            );
        }
        Err(e) => return Err(e),
    }

    match chown(to, None, Some(gid)) {
        Ok(()) => Ok(()),
        Err(e) if is_expected_ownership_failure(&e) => {
            tracing::debug!(
                "Cannot set group {} on {}, leaving ownership as is: {}",
                gid,
                to.display(),
                e
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn copy_ownership(_source: &fs::Metadata, _to: &Path) -> io::Result<()> {
    Ok(())
}
