use std::fs;
use std::io;
use std::path::Path;

/// Delete the file at `path`, treating a missing file as success.
///
/// Any other error is returned to the caller.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
