use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::mem;
use std::path::{Path, PathBuf};

use crate::error::{InPlaceError, Result};
use crate::handle::{Reader, Writer};
use crate::metadata::copy_metadata;
use crate::options::{EditOptions, Mode};
use crate::unlink::remove_if_exists;

/// Name prefix of the temporary file, so leftovers from a crash are easy to spot.
pub const TEMP_PREFIX: &str = "._in_place-";

/// A file opened for in-place editing.
///
/// Data read from the session comes from the original file; data written to
/// it goes to a temporary file next to the original. [`commit`](Self::commit)
/// atomically renames the temporary file over the original (optionally
/// moving the original to a backup path first); [`rollback`](Self::rollback)
/// deletes the temporary file and leaves the original alone.
///
/// A session that is dropped while still open is rolled back.
#[must_use = "an InPlace session is rolled back unless commit() is called"]
pub struct InPlace {
    display_path: PathBuf,
    target_path: PathBuf,
    backup_path: Option<PathBuf>,
    mode: Mode,
    state: State,
}

enum State {
    Open(OpenFiles),
    Closed,
}

struct OpenFiles {
    temp_path: PathBuf,
    reader: Reader,
    writer: Writer,
}

impl OpenFiles {
    /// Create the temp file beside `target` and open both handles.
    ///
    /// On failure nothing is left behind.
    fn create(target: &Path, options: &EditOptions) -> io::Result<Self> {
        let dir = target.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Path has no parent directory")
        })?;

        let (file, temp_path) = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)?
            .keep()
            .map_err(|e| e.error)?;

        let writer = Writer::new(file, options.mode, &options.handle);

        let opened = copy_metadata(target, &temp_path)
            .and_then(|()| Reader::open(target, options.mode, &options.handle));

        match opened {
            Ok(reader) => Ok(Self {
                temp_path,
                reader,
                writer,
            }),
            Err(e) => {
                writer.discard();
                if let Err(cleanup) = remove_if_exists(&temp_path) {
                    tracing::warn!(
                        "Failed to remove temp file {}: {}",
                        temp_path.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// Release both handles and delete the temp file.
    fn discard(self) -> io::Result<()> {
        let OpenFiles {
            temp_path,
            reader,
            writer,
        } = self;
        drop(reader);
        writer.discard();
        remove_if_exists(&temp_path)
    }
}

impl InPlace {
    /// Open `path` for in-place editing.
    ///
    /// Options are validated before anything on disk is touched. If creating
    /// the temp file, copying metadata, or opening either handle fails, any
    /// partial state is cleaned up and the original error is returned.
    pub fn open(path: impl AsRef<Path>, options: &EditOptions) -> Result<Self> {
        options.validate()?;

        let display_path = path.as_ref().to_path_buf();
        let target_path = fs::canonicalize(&display_path)?;
        let backup_path = options.backup_path_for(&target_path)?;

        let files = OpenFiles::create(&target_path, options)?;

        tracing::debug!(
            "Opened {} for in-place editing (temp: {})",
            target_path.display(),
            files.temp_path.display()
        );

        Ok(Self {
            display_path,
            target_path,
            backup_path,
            mode: options.mode,
            state: State::Open(files),
        })
    }

    /// Open `path`, run `f` on the session, then commit if `f` succeeded or
    /// roll back if it failed (or panicked).
    ///
    /// The error from `f` is returned as is; a failure to roll back after it
    /// is only logged.
    pub fn edit<P, T, E, F>(path: P, options: &EditOptions, f: F) -> Result<T, E>
    where
        P: AsRef<Path>,
        E: From<InPlaceError>,
        F: FnOnce(&mut InPlace) -> Result<T, E>,
    {
        let mut session = InPlace::open(path, options)?;
        match f(&mut session) {
            Ok(value) => {
                session.commit()?;
                Ok(value)
            }
            Err(e) => {
                if !session.is_closed() {
                    if let Err(rollback_err) = session.rollback() {
                        tracing::warn!(
                            "Failed to roll back in-place edit of {}: {}",
                            session.target_path.display(),
                            rollback_err
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// The path as given to [`open`](Self::open).
    pub fn display_path(&self) -> &Path {
        &self.display_path
    }

    /// Absolute, symlink-resolved path of the file being edited.
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn backup_path(&self) -> Option<&Path> {
        self.backup_path.as_deref()
    }

    /// Path of the temporary file; `None` once the session is closed.
    pub fn temp_path(&self) -> Option<&Path> {
        match &self.state {
            State::Open(files) => Some(&files.temp_path),
            State::Closed => None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    fn files(&mut self) -> Result<&mut OpenFiles> {
        match &mut self.state {
            State::Open(files) => Ok(files),
            State::Closed => Err(InPlaceError::Closed),
        }
    }

    /// Read the rest of the original file, appending to `buf`.
    pub fn read_to_end(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        Ok(self.files()?.reader.read_to_end(buf)?)
    }

    pub fn read_to_string(&mut self, buf: &mut String) -> Result<usize> {
        Ok(self.files()?.reader.read_to_string(buf)?)
    }

    /// Read one line, terminator included. Returns 0 at end of file.
    pub fn read_line(&mut self, buf: &mut String) -> Result<usize> {
        Ok(self.files()?.reader.read_line(buf)?)
    }

    pub fn read_line_bytes(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        Ok(self.files()?.reader.read_line_bytes(buf)?)
    }

    pub fn read_lines(&mut self) -> Result<Vec<String>> {
        self.lines()?.collect()
    }

    /// Read raw bytes into `buf`, returning how many were read.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.files()?.reader.read_into(buf)?)
    }

    /// Lazily iterate over the remaining lines of the original file.
    ///
    /// Lines keep their terminator. The iterator shares the session's read
    /// position, so it is single-pass.
    pub fn lines(&mut self) -> Result<Lines<'_>> {
        let files = self.files()?;
        Ok(Lines {
            reader: &mut files.reader,
        })
    }

    /// Write `data` to the replacement file.
    ///
    /// In text mode a character may be split across calls, as `io::copy`
    /// does; the commit fails if the output still ends mid-character.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        Ok(self.files()?.writer.write_all(data.as_ref())?)
    }

    /// Write each item in turn. No separators are added.
    pub fn write_lines<I>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let files = self.files()?;
        for line in lines {
            files.writer.write_all(line.as_ref())?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.files()?.writer.flush()?)
    }

    /// Replace the original file with everything written so far.
    ///
    /// Calling this on a closed session does nothing. The temp file is
    /// removed even if a rename fails; the session is closed either way.
    pub fn commit(&mut self) -> Result<()> {
        let files = match mem::replace(&mut self.state, State::Closed) {
            State::Open(files) => files,
            State::Closed => return Ok(()),
        };

        let OpenFiles {
            temp_path,
            reader,
            writer,
        } = files;

        drop(reader);
        let swapped = writer
            .finish()
            .and_then(|()| self.swap_into_place(&temp_path));
        let cleanup = remove_if_exists(&temp_path);

        swapped?;
        cleanup?;

        tracing::debug!("Committed in-place edit of {}", self.target_path.display());
        Ok(())
    }

    fn swap_into_place(&self, temp_path: &Path) -> io::Result<()> {
        if let Some(backup) = &self.backup_path {
            fs::rename(&self.target_path, backup)?;
            tracing::debug!(
                "Moved original {} to {}",
                self.target_path.display(),
                backup.display()
            );
        }
        fs::rename(temp_path, &self.target_path)
    }

    /// Discard everything written and leave the original file untouched.
    ///
    /// Fails with [`InPlaceError::Closed`] if the session was already
    /// committed or rolled back.
    pub fn rollback(&mut self) -> Result<()> {
        match mem::replace(&mut self.state, State::Closed) {
            State::Open(files) => {
                files.discard()?;
                tracing::debug!("Rolled back in-place edit of {}", self.target_path.display());
                Ok(())
            }
            State::Closed => Err(InPlaceError::Closed),
        }
    }
}

impl Drop for InPlace {
    fn drop(&mut self) {
        if let State::Open(files) = mem::replace(&mut self.state, State::Closed) {
            if std::thread::panicking() {
                tracing::debug!(
                    "Rolling back in-place edit of {} during unwind",
                    self.target_path.display()
                );
            } else {
                tracing::debug!(
                    "In-place edit of {} dropped without commit, rolling back",
                    self.target_path.display()
                );
            }
            if let Err(e) = files.discard() {
                tracing::warn!(
                    "Failed to roll back in-place edit of {}: {}",
                    self.target_path.display(),
                    e
                );
            }
        }
    }
}

impl fmt::Debug for InPlace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InPlace")
            .field("display_path", &self.display_path)
            .field("target_path", &self.target_path)
            .field("backup_path", &self.backup_path)
            .field("mode", &self.mode)
            .field("temp_path", &self.temp_path())
            .finish()
    }
}

/// Lazy line iterator returned by [`InPlace::lines`].
pub struct Lines<'a> {
    reader: &'a mut Reader,
}

impl Iterator for Lines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(Ok(line)),
            Err(e) => Some(Err(e.into())),
        }
    }
}

// The std traits move raw bytes on the read side; a closed session shows up
// as an io::Error wrapping InPlaceError::Closed.

impl Read for InPlace {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.files()?.reader.read_into(buf)?)
    }
}

impl Write for InPlace {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.files()?.writer.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.files()?.writer.flush()?)
    }
}
