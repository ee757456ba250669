//! Construction options for an in-place editing session.
//!
//! Options are collected through a small builder and validated once, before
//! the session touches the filesystem.

use std::env;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("backup and backup_ext are mutually exclusive")]
    ConflictingBackup,

    #[error("backup_ext cannot be empty")]
    EmptyBackupExt,

    #[error("{0:?}: invalid mode")]
    InvalidMode(String),

    #[error("binary mode doesn't take a newline option")]
    NewlineInBinaryMode,

    #[error("can't have unbuffered text I/O")]
    UnbufferedText,
}

/// Whether the file is edited as raw bytes or as UTF-8 text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Text,
    Binary,
}

impl Mode {
    pub fn is_text(self) -> bool {
        self == Mode::Text
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Text => "t",
            Mode::Binary => "b",
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    /// `"b"` selects binary mode; `"t"` or the empty string select text mode.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "t" => Ok(Mode::Text),
            "b" => Ok(Mode::Binary),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line ending emitted for `\n` when writing in text mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Newline {
    Lf,
    CrLf,
}

impl Newline {
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }
}

/// Options relayed to the read and write handles.
///
/// | option | effect |
/// |---|---|
/// | `buffer_capacity` | capacity of the buffered reader and writer |
/// | `newline` | text mode only: reads fold `\r\n` into `\n`, writes expand `\n` |
///
/// With `newline: None` line endings pass through verbatim in both
/// directions. This is not the universal-newlines default of Python's
/// `open`: a lone `\r` is never a line break and `\r\n` is folded only
/// when a `newline` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleOptions {
    pub buffer_capacity: Option<usize>,
    pub newline: Option<Newline>,
}

impl HandleOptions {
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    pub fn newline(mut self, newline: Newline) -> Self {
        self.newline = Some(newline);
        self
    }

    fn validate(&self, mode: Mode) -> Result<(), ConfigError> {
        match mode {
            Mode::Binary if self.newline.is_some() => Err(ConfigError::NewlineInBinaryMode),
            Mode::Text if self.buffer_capacity == Some(0) => Err(ConfigError::UnbufferedText),
            _ => Ok(()),
        }
    }
}

/// Everything an [`InPlace`](crate::InPlace) session needs besides the path.
///
/// At most one of `backup` and `backup_ext` may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOptions {
    pub mode: Mode,
    /// Where to move the original file on commit, resolved against the
    /// current directory when the session is opened.
    pub backup: Option<PathBuf>,
    /// Suffix appended to the resolved target path to form the backup path.
    pub backup_ext: Option<OsString>,
    pub handle: HandleOptions,
}

impl EditOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn binary(self) -> Self {
        self.mode(Mode::Binary)
    }

    pub fn backup(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup = Some(path.into());
        self
    }

    pub fn backup_ext(mut self, ext: impl Into<OsString>) -> Self {
        self.backup_ext = Some(ext.into());
        self
    }

    pub fn handle(mut self, handle: HandleOptions) -> Self {
        self.handle = handle;
        self
    }

    /// Check the options for contradictions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.backup, &self.backup_ext) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingBackup),
            (None, Some(ext)) if ext.is_empty() => return Err(ConfigError::EmptyBackupExt),
            _ => {}
        }
        self.handle.validate(self.mode)
    }

    /// Compute the absolute backup path for an already-resolved target.
    pub(crate) fn backup_path_for(&self, target: &Path) -> io::Result<Option<PathBuf>> {
        if let Some(backup) = &self.backup {
            return absolute(backup).map(Some);
        }
        Ok(self
            .backup_ext
            .as_deref()
            .map(|ext| append_suffix(target, ext)))
    }
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

fn append_suffix(path: &Path, suffix: &OsStr) -> PathBuf {
    let mut joined = path.as_os_str().to_owned();
    joined.push(suffix);
    PathBuf::from(joined)
}
